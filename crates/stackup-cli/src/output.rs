//! Renderers for run summaries and dry-run plans.

use std::io::Write;

use anyhow::anyhow;
use clap::ValueEnum;
use stackup_effects::PlannedEffect;
use stackup_provision::ProvisionSummary;

use crate::error::{CliError, CliResult};

/// Output format for summaries and plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

pub(crate) fn render_summary(
    summary: &ProvisionSummary,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => write_json(summary, out),
        OutputFormat::Table => {
            let steps: Vec<_> = summary.steps.iter().map(|step| step.as_str()).collect();
            let rows = [
                ("Server URL", summary.server_url.as_str()),
                ("Site name", summary.site_name.as_str()),
                ("Admin user", summary.admin_user.as_str()),
                ("Admin password", summary.admin_password.as_str()),
                ("Database", summary.db_name.as_str()),
                ("Database user", summary.db_user.as_str()),
                ("Database password", summary.db_password.as_str()),
            ];
            for (label, value) in rows {
                writeln!(out, "{label:<18} {value}").map_err(CliError::failure)?;
            }
            writeln!(out, "{:<18} {}", "Steps", steps.join(", ")).map_err(CliError::failure)
        }
    }
}

pub(crate) fn render_plan(
    journal: &[PlannedEffect],
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => write_json(journal, out),
        OutputFormat::Table => writeln!(out, "dry run: {} effects planned", journal.len())
            .map_err(CliError::failure),
    }
}

fn write_json(value: &(impl serde::Serialize + ?Sized), out: &mut dyn Write) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    writeln!(out, "{text}").map_err(CliError::failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackup_effects::ExecutionMode;
    use stackup_provision::Step;

    fn summary() -> ProvisionSummary {
        ProvisionSummary {
            mode: ExecutionMode::Live,
            server_url: "https://archive.example.org".to_string(),
            site_name: "Digital Archive".to_string(),
            admin_user: "curator".to_string(),
            admin_password: "pw1".to_string(),
            db_name: "omeka".to_string(),
            db_user: "root".to_string(),
            db_password: "pw2".to_string(),
            steps: vec![Step::HardenPhp, Step::ConfigureTls],
            planned_effects: 0,
        }
    }

    #[test]
    fn table_lists_credentials_and_steps() {
        let mut out = Vec::new();
        assert!(render_summary(&summary(), OutputFormat::Table, &mut out).is_ok());
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("Server URL         https://archive.example.org\n"));
        assert!(text.contains("Database password  pw2\n"));
        assert!(text.ends_with("Steps              harden_php, configure_tls\n"));
    }

    #[test]
    fn json_summary_uses_snake_case_fields() -> anyhow::Result<()> {
        let mut out = Vec::new();
        assert!(render_summary(&summary(), OutputFormat::Json, &mut out).is_ok());
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(value["mode"], "live");
        assert_eq!(value["steps"][1], "configure_tls");
        assert_eq!(value["admin_password"], "pw1");
        Ok(())
    }

    #[test]
    fn plan_renders_as_count_or_array() -> anyhow::Result<()> {
        let journal = [PlannedEffect::new("run").arg("a2enmod")];
        let mut table = Vec::new();
        assert!(render_plan(&journal, OutputFormat::Table, &mut table).is_ok());
        assert_eq!(String::from_utf8(table)?, "dry run: 1 effects planned\n");

        let mut json = Vec::new();
        assert!(render_plan(&journal, OutputFormat::Json, &mut json).is_ok());
        let value: serde_json::Value = serde_json::from_slice(&json)?;
        assert_eq!(value[0]["kind"], "run");
        Ok(())
    }
}
