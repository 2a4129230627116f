//! `logtap config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logtap_core::config::LogtapConfig;
use logtap_forwarder::ForwarderSettings;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate { strict } => execute_validate(config_path, strict, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Loads the file and reports every value that would be replaced by a
/// default at start.
///
/// Fallbacks are warnings and do not make the file invalid unless `strict`
/// is set, in which case the `[general]` values and the numeric bounds must
/// also pass [`LogtapConfig::validate`].
///
/// # Errors
///
/// Returns `CliError::Config` if the file cannot be loaded or is invalid.
async fn execute_validate(
    config_path: &Path,
    strict: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), strict, "validating configuration");

    let report = validate(config_path, strict).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

pub async fn validate(config_path: &Path, strict: bool) -> ConfigValidationReport {
    let source = config_path.display().to_string();
    let mut config = match LogtapConfig::load_raw(config_path).await {
        Ok(config) => config,
        Err(e) => {
            return ConfigValidationReport {
                source,
                valid: false,
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            };
        }
    };

    let errors = match config.validate() {
        Err(e) if strict => vec![e.to_string()],
        _ => Vec::new(),
    };
    let mut warnings: Vec<String> = config
        .apply_general_fallbacks()
        .iter()
        .map(ToString::to_string)
        .collect();
    let (_, resolved) = ForwarderSettings::resolve(&config.forwarder);
    warnings.extend(resolved.iter().map(ToString::to_string));

    ConfigValidationReport {
        source,
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = LogtapConfig::load(config_path).await?;
    let report = show(&config, &config_path.display().to_string(), section)?;
    writer.render(&report)
}

/// Serializes the whole configuration or one section of it.
pub fn show(
    config: &LogtapConfig,
    source: &str,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let rendered = match section.as_deref() {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("forwarder") => toml::to_string_pretty(&config.forwarder),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: general, forwarder)"
            )));
        }
    };
    let config_toml =
        rendered.map_err(|e| CliError::Command(format!("failed to serialize config: {e}")))?;

    Ok(ConfigReport {
        source: source.to_owned(),
        section,
        config: toml_to_json(&config_toml),
        config_toml,
    })
}

/// JSON view of the rendered section, so `--output json` carries the values too.
fn toml_to_json(rendered: &str) -> serde_json::Value {
    toml::from_str::<toml::Value>(rendered)
        .ok()
        .and_then(|value| serde_json::to_value(value).ok())
        .unwrap_or(serde_json::Value::Null)
}

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
    /// Values the forwarder replaces with defaults at start.
    pub warnings: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }
        for err in &self.errors {
            writeln!(w, "  Error: {}", err.red())?;
        }
        for warning in &self.warnings {
            writeln!(w, "  Warning: {}", warning.yellow())?;
        }
        Ok(())
    }
}
