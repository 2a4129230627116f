//! `logtap logdir` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use logtap_core::config::LogtapConfig;

use crate::cli::LogdirArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

pub async fn execute(
    args: LogdirArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogtapConfig::load(config_path).await?;
    let path = config.forwarder.resolved_log_directory();

    let opened = if args.open {
        tokio::fs::create_dir_all(&path).await?;
        open_in_file_manager(&path).await?;
        true
    } else {
        false
    };

    let report = LogdirReport {
        exists: tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false),
        path,
        opened,
    };
    writer.render(&report)
}

fn file_manager() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    }
}

/// Launches the platform file manager without waiting for it to exit.
async fn open_in_file_manager(path: &Path) -> Result<(), CliError> {
    let program = file_manager();
    debug!(program, path = %path.display(), "launching file manager");

    tokio::process::Command::new(program)
        .arg(path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| CliError::Command(format!("failed to launch {program}: {e}")))?;

    info!(path = %path.display(), "opened log directory");
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct LogdirReport {
    pub path: PathBuf,
    pub exists: bool,
    pub opened: bool,
}

impl Render for LogdirReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.exists {
            writeln!(w, "{}", self.path.display())
        } else {
            writeln!(w, "{} {}", self.path.display(), "(not created yet)".dimmed())
        }
    }
}
