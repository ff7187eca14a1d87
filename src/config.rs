use crate::theme::Theme;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Placement constants for the generic graph view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub origin_x: f32,
    pub origin_y: f32,
    pub row_height: f32,
    pub node_width: f32,
    pub node_height: f32,
    /// Smallest vertical gap kept between two node boxes.
    pub min_row_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 250.0,
            origin_y: 50.0,
            row_height: 120.0,
            node_width: 220.0,
            node_height: 56.0,
            min_row_gap: 24.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Characters of diagram text shown by the text fallback.
    pub text_budget: usize,
    pub empty_message: String,
    /// `None` waits on the engine without a deadline and needs no tokio time driver.
    pub engine_timeout_ms: Option<u64>,
}

impl FallbackConfig {
    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            text_budget: 300,
            empty_message: "No diagram provided".to_string(),
            engine_timeout_ms: Some(10_000),
        }
    }
}

/// External renderer used as the primary engine by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "mmdr".to_string(),
            args: Vec::new(),
        }
    }
}

/// Canvas size used when rasterizing to PNG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub fallback: FallbackConfig,
    pub engine: EngineConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::mermaid_default(),
            layout: LayoutConfig::default(),
            fallback: FallbackConfig::default(),
            engine: EngineConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariablesFile>,
    layout: Option<LayoutConfigFile>,
    fallback: Option<FallbackConfigFile>,
    engine: Option<EngineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariablesFile {
    font_family: Option<String>,
    font_size: Option<f32>,
    primary_color: Option<String>,
    primary_text_color: Option<String>,
    primary_border_color: Option<String>,
    line_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    origin_x: Option<f32>,
    origin_y: Option<f32>,
    row_height: Option<f32>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    min_row_gap: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FallbackConfigFile {
    text_budget: Option<usize>,
    empty_message: Option<String>,
    engine_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EngineConfigFile {
    command: Option<String>,
    args: Option<Vec<String>>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    info!(path = path.display().to_string(); "Loading configuration");
    let contents = std::fs::read_to_string(path)?;
    config_from_str(&contents)
}

/// Builds a config from JSON, falling back to JSON5 for hand-written files.
pub fn config_from_str(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(json_err) => json5::from_str(contents).map_err(|_| json_err)?,
    };

    let mut config = Config::default();

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "modern" {
            config.theme = Theme::modern();
        } else if theme_name == "base" || theme_name == "default" || theme_name == "mermaid" {
            config.theme = Theme::mermaid_default();
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.primary_color {
            config.theme.node_fill = v;
        }
        if let Some(v) = vars.primary_text_color {
            config.theme.node_text_color = v;
        }
        if let Some(v) = vars.primary_border_color {
            config.theme.node_border = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.origin_x {
            config.layout.origin_x = v;
        }
        if let Some(v) = layout.origin_y {
            config.layout.origin_y = v;
        }
        if let Some(v) = layout.row_height {
            config.layout.row_height = v;
        }
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.min_row_gap {
            config.layout.min_row_gap = v;
        }
    }

    if let Some(fallback) = parsed.fallback {
        if let Some(v) = fallback.text_budget {
            config.fallback.text_budget = v;
        }
        if let Some(v) = fallback.empty_message {
            config.fallback.empty_message = v;
        }
        // 0 disables the deadline.
        if let Some(v) = fallback.engine_timeout_ms {
            config.fallback.engine_timeout_ms = (v > 0).then_some(v);
        }
    }

    if let Some(engine) = parsed.engine {
        if let Some(v) = engine.command {
            config.engine.command = v;
        }
        if let Some(v) = engine.args {
            config.engine.args = v;
        }
    }

    Ok(config)
}
