//! `logtap enable` / `logtap disable` command handlers

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logtap_core::config::LogtapConfig;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Persists `forwarder.enabled` and reports the new state.
///
/// A running `logtap pipe` or `logtap run` picks the change up on its next
/// reload (`SIGHUP`).
pub async fn execute(enabled: bool, config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    let report = toggle(enabled, config_path).await?;
    writer.render(&report)
}

pub async fn toggle(enabled: bool, config_path: &Path) -> Result<ToggleReport, CliError> {
    let config = LogtapConfig::set_enabled(config_path, enabled).await?;
    info!(path = %config_path.display(), enabled, "forwarding toggled");

    Ok(ToggleReport {
        source: config_path.display().to_string(),
        enabled: config.forwarder.enabled,
    })
}

#[derive(Debug, Serialize)]
pub struct ToggleReport {
    pub source: String,
    pub enabled: bool,
}

impl Render for ToggleReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let state = if self.enabled {
            "enabled".green().bold()
        } else {
            "disabled".yellow().bold()
        };
        writeln!(w, "Forwarding {state} in {}", self.source)
    }
}
