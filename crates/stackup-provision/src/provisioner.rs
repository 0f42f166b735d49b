//! Step sequencing for a provisioning run.
//!
//! # Design
//! - Steps run in a fixed order; the first failure stops the run.
//! - Every side effect goes through the owned [`Dispatcher`].
//! - No retries and no rollback.

use std::path::Path;

use serde::Serialize;
use stackup_config::Settings;
use stackup_effects::{
    CommandSpec, Dispatcher, EffectResult, ExecutionMode, Outcome, PlannedEffect,
};
use stackup_patch::PatchSpec;
use tracing::{error, info, instrument};

use crate::error::{ProvisionError, ProvisionResult, Step};

/// Runs the provisioning steps for one set of settings.
#[derive(Debug)]
pub struct Provisioner<'a> {
    pub(crate) settings: &'a Settings,
    pub(crate) dispatcher: Dispatcher,
}

/// What a finished run reports back to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionSummary {
    /// Mode the run used.
    pub mode: ExecutionMode,
    /// Site URL.
    pub server_url: String,
    /// Site title.
    pub site_name: String,
    /// Administrator username.
    pub admin_user: String,
    /// Administrator password.
    pub admin_password: String,
    /// Database name.
    pub db_name: String,
    /// Database account.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Steps that ran, in order.
    pub steps: Vec<Step>,
    /// Effects described instead of performed.
    pub planned_effects: usize,
}

impl<'a> Provisioner<'a> {
    /// Pair `settings` with the dispatcher that carries out each effect.
    #[must_use]
    pub const fn new(settings: &'a Settings, dispatcher: Dispatcher) -> Self {
        Self {
            settings,
            dispatcher,
        }
    }

    /// Settings this run uses.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        self.settings
    }

    /// Dispatcher, including the dry-run journal.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Give back the dispatcher once the run is over.
    #[must_use]
    pub fn into_dispatcher(self) -> Dispatcher {
        self.dispatcher
    }

    /// Run every step in order: PHP, MySQL, CMS, optional uploads lockdown,
    /// Apache restart, optional TLS.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; later steps do not run.
    #[instrument(name = "provision.run", skip_all, fields(server = %self.settings.server_name))]
    pub fn run(&mut self) -> ProvisionResult<ProvisionSummary> {
        let mut steps = vec![Step::HardenPhp, Step::HardenMysql, Step::InstallCms];
        self.harden_php()?;
        self.harden_mysql()?;
        self.install_cms()?;
        if self.settings.install.harden_uploads {
            self.harden_uploads()?;
            steps.push(Step::HardenUploads);
        }
        self.restart_apache()?;
        steps.push(Step::RestartApache);
        if self.settings.tls.enabled {
            self.configure_tls()?;
            steps.push(Step::ConfigureTls);
        }
        info!(steps = steps.len(), "provisioning finished");
        Ok(self.summary(steps))
    }

    fn summary(&self, steps: Vec<Step>) -> ProvisionSummary {
        let settings = self.settings;
        ProvisionSummary {
            mode: self.dispatcher.mode(),
            server_url: settings.server_url(),
            site_name: settings.site.name.clone(),
            admin_user: settings.site.admin_user.clone(),
            admin_password: settings.site.admin_password.clone(),
            db_name: settings.database.name.clone(),
            db_user: settings.database.user.clone(),
            db_password: settings.database.password.clone(),
            steps,
            planned_effects: self.dispatcher.journal().len(),
        }
    }

    /// Log-only step; the stock MySQL package already binds to loopback.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` to match the other steps.
    #[instrument(name = "provision.harden_mysql", skip_all)]
    pub fn harden_mysql(&mut self) -> ProvisionResult<()> {
        self.step(Step::HardenMysql, |_| {
            info!("mysql listens on loopback by default; nothing to change");
            Ok(())
        })
    }

    /// Restart Apache so configuration changes take effect.
    ///
    /// # Errors
    ///
    /// Returns an error when the restart command fails.
    #[instrument(name = "provision.restart_apache", skip_all)]
    pub fn restart_apache(&mut self) -> ProvisionResult<()> {
        self.step(Step::RestartApache, Self::restart_apache_effects)
    }

    pub(crate) fn restart_apache_effects(&mut self) -> EffectResult<()> {
        self.dispatcher
            .run_command(&CommandSpec::new("service").args(["apache2", "restart"]))
            .map(drop)
    }

    pub(crate) fn step(
        &mut self,
        step: Step,
        body: impl FnOnce(&mut Self) -> EffectResult<()>,
    ) -> ProvisionResult<()> {
        info!(step = step.as_str(), "step started");
        body(self).map_err(|source| {
            error!(step = step.as_str(), error = %source, "step failed");
            ProvisionError::Step { step, source }
        })?;
        info!(step = step.as_str(), "step finished");
        Ok(())
    }

    /// Rewrite a setting when present, append `line` when it is not.
    ///
    /// A dry run cannot see the replace count, so the append is planned too.
    pub(crate) fn replace_or_append(
        &mut self,
        path: &Path,
        pattern: &str,
        replacement: &str,
        line: &str,
    ) -> EffectResult<()> {
        let replaced = self
            .dispatcher
            .patch(path, &PatchSpec::regex_replace(pattern, replacement))?;
        match replaced {
            Outcome::Performed(count) if !count.is_zero() => Ok(()),
            Outcome::Performed(_) | Outcome::Suppressed => self
                .dispatcher
                .patch(path, &PatchSpec::append([line]))
                .map(drop),
        }
    }

    /// Ensure `block` appears in `path` at least once, appending it otherwise.
    pub(crate) fn ensure_block(&mut self, path: &Path, block: &str) -> EffectResult<()> {
        let present = self
            .dispatcher
            .patch(path, &PatchSpec::literal_replace(block, block))?;
        match present {
            Outcome::Performed(count) if !count.is_zero() => Ok(()),
            Outcome::Performed(_) | Outcome::Suppressed => self
                .dispatcher
                .patch(path, &PatchSpec::append([block]))
                .map(drop),
        }
    }

    /// Feed `answers` to a spawned program, or describe the feed when the spawn was suppressed.
    pub(crate) fn answer(
        &mut self,
        program: &str,
        spawned: Outcome<Box<dyn stackup_effects::InteractiveProcess>>,
        answers: &str,
    ) -> EffectResult<()> {
        match spawned {
            Outcome::Performed(process) => self
                .dispatcher
                .feed_answers(program, process, answers)
                .map(drop),
            Outcome::Suppressed => self.dispatcher.describe(
                PlannedEffect::new("communicate")
                    .arg(program)
                    .named("input", answers),
            ),
        }
    }
}
