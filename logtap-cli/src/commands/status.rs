//! `logtap status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use logtap_core::config::LogtapConfig;
use logtap_forwarder::ForwarderSettings;

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogtapConfig::load(config_path).await?;
    let report = build_status_report(&config, &config_path.display().to_string(), args.verbose);
    writer.render(&report)
}

/// Builds the report from a loaded configuration without touching any sink.
pub fn build_status_report(config: &LogtapConfig, source: &str, verbose: bool) -> StatusReport {
    let fwd = &config.forwarder;
    let (settings, warnings) = ForwarderSettings::resolve(fwd);
    let today = chrono::Local::now().date_naive();

    let file = settings.file.as_ref().map(|file| FileTarget {
        path: file.path_for(today).display().to_string(),
        max_bytes: file.max_bytes,
        backup_count: file.backup_count,
    });
    let syslog = settings.syslog.as_ref().map(|syslog| SyslogTarget {
        target: syslog.target(),
        facility: syslog.facility.name().to_owned(),
    });

    let rules = verbose.then(|| ExclusionRules {
        wildcards: fwd.exclude_wildcards.clone(),
        patterns: fwd.exclude_patterns.clone(),
        regex: fwd.exclude_regex.clone(),
    });

    StatusReport {
        source: source.to_owned(),
        enabled: fwd.enabled,
        min_severity: settings.min_severity.as_str().to_owned(),
        log_directory: fwd.resolved_log_directory().display().to_string(),
        file,
        syslog,
        exclusion_rules: settings.filter.rule_count(),
        rules,
        warnings: warnings.iter().map(ToString::to_string).collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub source: String,
    pub enabled: bool,
    pub min_severity: String,
    pub log_directory: String,
    /// `None` when file logging is disabled.
    pub file: Option<FileTarget>,
    /// `None` when syslog forwarding is disabled.
    pub syslog: Option<SyslogTarget>,
    /// Rules that compiled successfully.
    pub exclusion_rules: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<ExclusionRules>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileTarget {
    pub path: String,
    pub max_bytes: u64,
    pub backup_count: u32,
}

#[derive(Debug, Serialize)]
pub struct SyslogTarget {
    pub target: String,
    pub facility: String,
}

#[derive(Debug, Serialize)]
pub struct ExclusionRules {
    pub wildcards: Vec<String>,
    pub patterns: Vec<String>,
    pub regex: Vec<String>,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Configuration: {}", self.source.bold())?;
        let state = if self.enabled {
            "enabled".green().bold()
        } else {
            "disabled".yellow().bold()
        };
        writeln!(w, "Forwarding:    {state}")?;
        writeln!(w, "Min severity:  {}", self.min_severity)?;
        writeln!(w, "Log directory: {}", self.log_directory)?;
        writeln!(w)?;

        match &self.file {
            Some(file) => {
                let rotation = if file.max_bytes == 0 || file.backup_count == 0 {
                    "no rotation".to_owned()
                } else {
                    format!("rotate at {} bytes, keep {}", file.max_bytes, file.backup_count)
                };
                writeln!(w, "{:<8} {} ({})", "file", file.path, rotation.dimmed())?;
            }
            None => writeln!(w, "{:<8} {}", "file", "off".dimmed())?,
        }
        match &self.syslog {
            Some(syslog) => writeln!(w, "{:<8} {} ({})", "syslog", syslog.target, syslog.facility)?,
            None => writeln!(w, "{:<8} {}", "syslog", "off".dimmed())?,
        }

        writeln!(w)?;
        writeln!(w, "Exclusion rules: {}", self.exclusion_rules)?;
        if let Some(rules) = &self.rules {
            for rule in &rules.wildcards {
                writeln!(w, "  wildcard  {rule}")?;
            }
            for rule in &rules.patterns {
                writeln!(w, "  contains  {rule}")?;
            }
            for rule in &rules.regex {
                writeln!(w, "  regex     {rule}")?;
            }
        }

        for warning in &self.warnings {
            writeln!(w, "{} {}", "warning:".yellow(), warning)?;
        }
        Ok(())
    }
}
