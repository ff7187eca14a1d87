use crate::config::{Config, load_config};
use crate::dump::write_render_dump;
use crate::engine::CommandEngine;
use crate::fallback::{Orchestrator, Rendered};
use crate::fence::extract_mermaid_blocks;
use crate::render::{render_result_svg, write_output_svg};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "mmfb",
    version,
    about = "Render Mermaid diagrams, repairing and falling back instead of failing"
)]
pub struct Args {
    /// Input file (.mmd or .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON/JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Primary engine command, overriding the config file
    #[arg(long = "engine")]
    pub engine: Option<String>,

    /// Skip the primary engine and use the fallback renderers only
    #[arg(long = "no-engine", conflicts_with = "engine")]
    pub no_engine: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
        }
    }
}

pub fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;
    if let Some(command) = &args.engine {
        config.engine.command = command.clone();
        config.engine.args.clear();
    }

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_mermaid_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No Mermaid diagrams found in input"));
    }

    let outputs: Vec<Option<PathBuf>> = if diagrams.len() == 1 {
        vec![args.output.clone()]
    } else {
        resolve_multi_outputs(args.output.as_deref(), args.output_format, diagrams.len())?
            .into_iter()
            .map(Some)
            .collect()
    };

    let engine = if args.no_engine {
        None
    } else {
        Some(CommandEngine::from_config(&config.engine))
    };
    debug!(engine:? = engine, diagrams = diagrams.len(); "Prepared render");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    for (idx, (diagram, output)) in diagrams.iter().zip(&outputs).enumerate() {
        let orchestrator = Orchestrator::with_config(&engine, &config);
        let rendered = runtime
            .block_on(orchestrator.render(diagram))
            .ok_or_else(|| anyhow::anyhow!("Render of diagram {} was superseded", idx + 1))?;
        info!(
            diagram = idx + 1,
            kind:? = rendered.kind(),
            repairs = rendered.repairs.len();
            "Rendered diagram"
        );
        write_rendered(&rendered, args.output_format, output.as_deref(), &config)?;
    }

    Ok(())
}

fn write_rendered(
    rendered: &Rendered,
    format: OutputFormat,
    output: Option<&Path>,
    config: &Config,
) -> Result<()> {
    match format {
        OutputFormat::Svg => {
            let svg = render_result_svg(&rendered.result, &config.theme, &config.layout);
            write_output_svg(&svg, output)
        }
        OutputFormat::Json => write_render_dump(output, rendered),
        OutputFormat::Png => {
            let output = ensure_output(output, format.extension())?;
            write_png(rendered, &output, config)
        }
    }
}

#[cfg(feature = "png")]
fn write_png(rendered: &Rendered, output: &Path, config: &Config) -> Result<()> {
    let svg = render_result_svg(&rendered.result, &config.theme, &config.layout);
    crate::render::write_output_png(&svg, output, &config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(_rendered: &Rendered, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn ensure_output(output: Option<&Path>, ext: &str) -> Result<PathBuf> {
    output
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}

fn resolve_multi_outputs(
    output: Option<&Path>,
    format: OutputFormat,
    count: usize,
) -> Result<Vec<PathBuf>> {
    let ext = format.extension();
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required for markdown input"))?;
    if base.is_dir() {
        return Ok((0..count)
            .map(|idx| base.join(format!("diagram-{}.{}", idx + 1, ext)))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("diagram");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok((0..count)
        .map(|idx| parent.join(format!("{}-{}.{}", stem, idx + 1, ext)))
        .collect())
}
