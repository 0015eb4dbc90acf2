//! Tracing subscriber setup.
//!
//! Filter directives come from `KONYX_LOG` (same syntax as `RUST_LOG`),
//! defaulting to `warn`. Output goes to stderr so it never mixes with
//! command output, or to a file when `log_file` is configured.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const LOG_ENV_VAR: &str = "KONYX_LOG";

/// Keeps the file writer alive; dropping it flushes pending lines.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy()
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(log_file: Option<&Path>) -> Result<LogGuard> {
    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))
            .context("install stderr log subscriber")?;
        return Ok(LogGuard { _file: None });
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map_or_else(|| "konyx.log".into(), |n| n.to_os_string());
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("install log subscriber for {}", path.display()))?;
    Ok(LogGuard {
        _file: Some(file_guard),
    })
}

/// Masks a bearer token for display and logs.
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let head: String = token.chars().take(4).collect();
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("konyx.log");

        let _guard = init(Some(&path)).unwrap();
        let err = init(None).err().expect("second init must fail");
        assert!(format!("{err:#}").contains("install stderr log subscriber"));
    }

    #[test]
    fn test_mask_token_hides_middle() {
        assert_eq!(mask_token("abcdefghijkl"), "abcd...ijkl");
        assert_eq!(mask_token("abc123"), "******");
        assert_eq!(mask_token(""), "");
    }
}
