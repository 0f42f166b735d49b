//! Argument parsing, settings resolution, and the provisioning run.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use stackup_config::{ServerName, Settings, SettingsOverrides, defaults};
use stackup_effects::{Dispatcher, ExecutionMode};
use stackup_provision::Provisioner;
use stackup_telemetry::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, RunContextGuard, init_logging,
};
use tracing::{error, info};

use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, render_plan, render_summary};

const TLS_ENABLED_VALUE: &str = "True";

/// Parses arguments, provisions the server, and prints the outcome.
/// Returns the process exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn execute(cli: &Cli) -> CliResult<()> {
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: build_sha(),
    };
    init_logging(&logging).map_err(CliError::failure)?;

    let settings = resolve_settings(cli)?;
    let mode = ExecutionMode::from_dry_run(cli.dry_run);
    let run = RunContextGuard::new(mode.as_str());
    info!(run_id = %run.run_id(), server = %settings.server_name, "starting provisioning");

    let dispatcher = match cli.output {
        OutputFormat::Table => Dispatcher::new(mode),
        OutputFormat::Json => Dispatcher::new(mode).without_echo(),
    };
    provision(&settings, dispatcher, cli.output, &mut io::stdout())
}

fn build_sha() -> &'static str {
    option_env!("STACKUP_BUILD_SHA").unwrap_or("dev")
}

pub(crate) fn resolve_settings(cli: &Cli) -> CliResult<Settings> {
    let server_name = ServerName::resolve(&cli.server, &cli.ip_domain_suffix)?;
    let overrides = SettingsOverrides {
        cms_version: Some(cli.cms_version.clone()),
        cms_patch: Some(cli.cms_patch.clone()),
        site_name: Some(cli.site_name.clone()),
        admin_user: cli.admin_user.clone(),
        owner: cli.owner.clone(),
        group: cli.group.clone(),
        clean_up: Some(!cli.keep_download),
        purge_document_root: Some(!cli.keep_document_root),
        harden_uploads: Some(cli.harden_uploads),
        tls_enabled: Some(cli.ssl.as_deref() == Some(TLS_ENABLED_VALUE)),
        document_root: cli.document_root.clone(),
        tmp_dir: cli.tmp_dir.clone(),
        php_ini: cli.php_ini.clone(),
        apache_conf: cli.apache_conf.clone(),
        sites_dir: cli.sites_dir.clone(),
        ..SettingsOverrides::default()
    };
    Ok(Settings::from_overrides(server_name, overrides)?)
}

pub(crate) fn provision(
    settings: &Settings,
    dispatcher: Dispatcher,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    let mut provisioner = Provisioner::new(settings, dispatcher);
    let summary = provisioner.run().map_err(|err| {
        error!(step = %err.step(), error = %err, "provisioning failed");
        CliError::from(err)
    })?;
    if summary.mode.is_dry_run() {
        render_plan(provisioner.dispatcher().journal(), format, out)
    } else {
        render_summary(&summary, format, out)
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse().map_err(|_| format!("unknown log format {value:?}"))
}

#[derive(Debug, Parser)]
#[command(
    name = "stackup",
    about = "Provision a hardened Omeka host on Apache, PHP, and MySQL"
)]
pub(crate) struct Cli {
    /// IPv4 address or domain name of the server.
    server: String,
    /// Print every effect instead of performing it.
    #[arg(long)]
    dry_run: bool,
    #[arg(long, env = "STACKUP_CMS_VERSION", default_value = defaults::CMS_VERSION)]
    cms_version: String,
    #[arg(long, env = "STACKUP_CMS_PATCH", default_value = defaults::CMS_PATCH)]
    cms_patch: String,
    #[arg(long, env = "STACKUP_SITE_NAME", default_value = defaults::SITE_NAME)]
    site_name: String,
    /// Administrator username; generated when absent.
    #[arg(long, env = "STACKUP_ADMIN_USER")]
    admin_user: Option<String>,
    /// Configure self-signed HTTPS when set to exactly `True`.
    #[arg(long, value_name = "VALUE")]
    ssl: Option<String>,
    #[arg(long, env = "STACKUP_DOCUMENT_ROOT")]
    document_root: Option<PathBuf>,
    #[arg(long, env = "STACKUP_TMP_DIR")]
    tmp_dir: Option<PathBuf>,
    #[arg(long, env = "STACKUP_OWNER")]
    owner: Option<String>,
    #[arg(long, env = "STACKUP_GROUP")]
    group: Option<String>,
    #[arg(long, env = "STACKUP_PHP_INI")]
    php_ini: Option<PathBuf>,
    #[arg(long, env = "STACKUP_APACHE_CONF")]
    apache_conf: Option<PathBuf>,
    #[arg(long, env = "STACKUP_SITES_DIR")]
    sites_dir: Option<PathBuf>,
    /// Leave the downloaded archive and staging directory in place.
    #[arg(long, env = "STACKUP_KEEP_DOWNLOAD")]
    keep_download: bool,
    /// Keep existing document root entries instead of purging them.
    #[arg(long, env = "STACKUP_KEEP_DOCUMENT_ROOT")]
    keep_document_root: bool,
    /// Stop Apache from executing files in the upload directory.
    #[arg(long, env = "STACKUP_HARDEN_UPLOADS")]
    harden_uploads: bool,
    #[arg(long, env = "STACKUP_IP_DOMAIN_SUFFIX", default_value = defaults::IP_DOMAIN_SUFFIX)]
    ip_domain_suffix: String,
    #[arg(
        long = "output",
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Render summaries and plans as a table or JSON"
    )]
    output: OutputFormat,
    #[arg(long, env = "STACKUP_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[arg(long, env = "STACKUP_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use std::os::unix::fs::MetadataExt;
    use stackup_test_support::fixtures::{ServerTree, write_release_archive};
    use stackup_test_support::mocks::RecordingRunner;

    fn tree_args(tree: &ServerTree) -> Result<Vec<String>> {
        let metadata = fs::metadata(tree.root())?;
        Ok(vec![
            "--document-root".to_string(),
            tree.document_root().display().to_string(),
            "--tmp-dir".to_string(),
            tree.tmp_dir().display().to_string(),
            "--php-ini".to_string(),
            tree.php_ini().display().to_string(),
            "--apache-conf".to_string(),
            tree.apache_conf().display().to_string(),
            "--sites-dir".to_string(),
            tree.sites_dir().display().to_string(),
            "--owner".to_string(),
            metadata.uid().to_string(),
            "--group".to_string(),
            metadata.gid().to_string(),
        ])
    }

    fn parse(args: &[&str]) -> Result<Cli> {
        Ok(Cli::try_parse_from(
            std::iter::once("stackup").chain(args.iter().copied()),
        )?)
    }

    #[test]
    fn ip_argument_becomes_cloud_hostname() -> Result<()> {
        let cli = parse(&["192.168.0.12", "--ssl", "True", "--admin-user", "curator"])?;
        let settings = resolve_settings(&cli)?;
        assert_eq!(
            settings.server_name.as_str(),
            "192-168-0-12.cloud.computecanada.ca"
        );
        assert!(settings.tls.enabled);
        assert_eq!(settings.site.admin_user, "curator");
        assert_eq!(settings.release.name(), "omeka-2.4.1");
        Ok(())
    }

    #[test]
    fn ssl_requires_exact_true() -> Result<()> {
        for value in ["true", "yes", "1", "TRUE"] {
            let cli = parse(&["example.org", "--ssl", value])?;
            assert!(!resolve_settings(&cli)?.tls.enabled, "{value} enabled tls");
        }
        assert!(!resolve_settings(&parse(&["example.org"])?)?.tls.enabled);
        Ok(())
    }

    #[test]
    fn keep_flags_disable_cleanup_and_purge() -> Result<()> {
        let cli = parse(&["example.org", "--keep-download", "--keep-document-root"])?;
        let settings = resolve_settings(&cli)?;
        assert!(!settings.install.clean_up);
        assert!(!settings.install.purge_document_root);
        Ok(())
    }

    #[test]
    fn missing_or_extra_arguments_are_usage_errors() {
        let Err(missing) = Cli::try_parse_from(["stackup"]) else {
            panic!("server argument is required");
        };
        assert_eq!(missing.exit_code(), 2);
        let Err(extra) = Cli::try_parse_from(["stackup", "a.example.org", "b.example.org"]) else {
            panic!("only one server argument is accepted");
        };
        assert_eq!(extra.exit_code(), 2);
    }

    #[test]
    fn bad_hostname_is_a_validation_error() -> Result<()> {
        let cli = parse(&["bad_name.example.org"])?;
        let Err(err) = resolve_settings(&cli) else {
            panic!("underscore should be rejected");
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().starts_with("invalid server name"));
        Ok(())
    }

    #[test]
    fn json_dry_run_prints_the_plan_only() -> Result<()> {
        let tree = ServerTree::new()?;
        let mut args = vec!["archive.example.org".to_string(), "--dry-run".to_string()];
        args.extend(tree_args(&tree)?);
        let cli = Cli::try_parse_from(std::iter::once("stackup".to_string()).chain(args))?;
        let settings = resolve_settings(&cli)?;
        let before = tree.read("etc/php5/apache2/php.ini")?;
        let runner = RecordingRunner::new();
        let dispatcher = Dispatcher::new(ExecutionMode::DryRun)
            .with_runner(runner.clone())
            .without_echo();

        let mut out = Vec::new();
        assert!(provision(&settings, dispatcher, OutputFormat::Json, &mut out).is_ok());

        let plan: serde_json::Value = serde_json::from_slice(&out)?;
        let effects = plan.as_array().map_or(0, Vec::len);
        assert_eq!(effects, 25);
        assert_eq!(plan[0]["kind"], "regex_replace");
        assert!(runner.commands().is_empty());
        assert_eq!(tree.read("etc/php5/apache2/php.ini")?, before);
        Ok(())
    }

    #[test]
    fn failed_step_exits_with_operational_code() -> Result<()> {
        let tree = ServerTree::new()?;
        let mut args = vec!["archive.example.org".to_string()];
        args.extend(tree_args(&tree)?);
        let cli = Cli::try_parse_from(std::iter::once("stackup".to_string()).chain(args))?;
        let settings = resolve_settings(&cli)?;
        let archive = settings.archive_path();
        let release = settings.release.name();
        let runner = RecordingRunner::new()
            .with_hook("wget", move |_| {
                write_release_archive(&archive, &release).expect("release archive");
            })
            .with_status("mysql", 1);
        let dispatcher = Dispatcher::new(ExecutionMode::Live)
            .with_runner(runner)
            .without_echo();

        let mut out = Vec::new();
        let Err(err) = provision(&settings, dispatcher, OutputFormat::Table, &mut out) else {
            panic!("mysql failure should stop the run");
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().starts_with("provisioning step failed: "));
        assert!(out.is_empty());
        Ok(())
    }
}
