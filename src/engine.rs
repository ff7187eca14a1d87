//! Boundary to the primary diagram engine.
//!
//! The engine is a black box: it gets a unique render id and the sanitized diagram text and
//! either returns an SVG document or refuses. Anything it does wrong is reported through
//! [`EngineError`] and handled by the fallback tiers, never surfaced to the caller.

use crate::config::EngineConfig;
use log::debug;
use std::future::Future;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variable carrying the render id to an external engine process.
pub const DIAGRAM_ID_ENV: &str = "MMFB_DIAGRAM_ID";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine rejected the diagram: {0}")]
    Rejected(String),

    #[error("engine output does not contain an <svg> element")]
    InvalidOutput,

    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("no primary engine configured")]
    Unavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait PrimaryEngine {
    /// Renders `diagram_text` to an SVG document.
    ///
    /// `unique_id` is fresh for every attempt so concurrent renders never share element ids.
    fn render(
        &self,
        unique_id: &str,
        diagram_text: &str,
    ) -> impl Future<Output = Result<String, EngineError>>;
}

/// `None` is the disabled engine: every attempt goes straight to the fallback tiers.
impl<E: PrimaryEngine> PrimaryEngine for Option<E> {
    async fn render(&self, unique_id: &str, diagram_text: &str) -> Result<String, EngineError> {
        match self {
            Some(engine) => engine.render(unique_id, diagram_text).await,
            None => Err(EngineError::Unavailable),
        }
    }
}

impl<E: PrimaryEngine> PrimaryEngine for &E {
    async fn render(&self, unique_id: &str, diagram_text: &str) -> Result<String, EngineError> {
        (**self).render(unique_id, diagram_text).await
    }
}

/// Runs an external renderer that reads the diagram on stdin and writes SVG to stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.command.clone()).with_args(config.args.iter().cloned())
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl PrimaryEngine for CommandEngine {
    async fn render(&self, unique_id: &str, diagram_text: &str) -> Result<String, EngineError> {
        debug!(command = self.command.as_str(), id = unique_id; "spawning engine");
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .env(DIAGRAM_ID_ENV, unique_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(diagram_text.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (written, output) = tokio::join!(write_input, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("{} exited with {}", self.command, output.status)
            } else {
                stderr
            };
            return Err(EngineError::Rejected(reason));
        }
        // A renderer may exit before draining stdin; only its exit status matters then.
        if let Err(err) = written {
            if err.kind() != ErrorKind::BrokenPipe {
                return Err(err.into());
            }
        }

        let svg = String::from_utf8_lossy(&output.stdout).into_owned();
        if !svg.contains("<svg") {
            return Err(EngineError::InvalidOutput);
        }
        Ok(svg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl PrimaryEngine for Echo {
        async fn render(&self, unique_id: &str, _diagram_text: &str) -> Result<String, EngineError> {
            Ok(format!("<svg id=\"{unique_id}\"/>"))
        }
    }

    #[tokio::test]
    async fn disabled_engine_is_unavailable() {
        let engine: Option<Echo> = None;
        let err = engine.render("diagram-0-1", "graph TD").await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable));
    }

    #[tokio::test]
    async fn enabled_option_delegates() {
        let svg = Some(Echo).render("diagram-0-1", "graph TD").await.unwrap();
        assert_eq!(svg, "<svg id=\"diagram-0-1\"/>");
    }

    #[tokio::test]
    async fn missing_command_is_io_error() {
        let engine = CommandEngine::new("mmfb-engine-that-does-not-exist");
        let err = engine.render("diagram-0-1", "graph TD").await.unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_engine_reads_stdout() {
        let engine = CommandEngine::new("cat");
        let svg = engine
            .render("diagram-0-1", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>")
            .await
            .unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_engine_passes_render_id() {
        let engine =
            CommandEngine::new("sh").with_args(["-c", "cat >/dev/null; echo \"<svg id='$MMFB_DIAGRAM_ID'/>\""]);
        let svg = engine.render("diagram-7-3", "graph TD").await.unwrap();
        assert!(svg.contains("diagram-7-3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_rejection() {
        let engine = CommandEngine::new("sh").with_args(["-c", "echo 'Parse error on line 2' >&2; exit 1"]);
        match engine.render("diagram-0-1", "graph TD\nA[").await {
            Err(EngineError::Rejected(reason)) => assert_eq!(reason, "Parse error on line 2"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_without_svg_is_invalid() {
        let engine = CommandEngine::new("sh").with_args(["-c", "cat >/dev/null; echo done"]);
        let err = engine.render("diagram-0-1", "graph TD").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidOutput));
    }
}
