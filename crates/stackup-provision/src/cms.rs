//! CMS download, install, and database wiring.

use stackup_effects::{CommandSpec, EffectResult};
use stackup_patch::PatchSpec;
use tracing::instrument;

use crate::error::{ProvisionResult, Step};
use crate::provisioner::Provisioner;

/// Web root block in stock `apache2.conf` before `.htaccess` overrides are allowed.
pub const WEB_ROOT_OVERRIDE_NONE: &str =
    "<Directory /var/www/>\n\tOptions Indexes FollowSymLinks\n\tAllowOverride None\n";
/// Same block with overrides enabled.
pub const WEB_ROOT_OVERRIDE_ALL: &str =
    "<Directory /var/www/>\n\tOptions Indexes FollowSymLinks\n\tAllowOverride all\n";

/// Mode applied to `db.ini` so only its owner can read it.
pub const DB_INI_MODE: u32 = 0o400;

const PLACEHOLDER: &str = "\"XXXXXXX\"";

impl Provisioner<'_> {
    /// Download, unpack, and install the CMS release, then create and wire its database.
    ///
    /// # Errors
    ///
    /// Returns an error at the first effect that fails.
    #[instrument(name = "provision.install_cms", skip_all, fields(release = %self.settings.release.name()))]
    pub fn install_cms(&mut self) -> ProvisionResult<()> {
        self.step(Step::InstallCms, |this| {
            this.stage_release()?;
            this.create_database()?;
            this.configure_database_access()?;
            this.enable_overrides()
        })
    }

    fn stage_release(&mut self) -> EffectResult<()> {
        let settings = self.settings;
        let paths = &settings.paths;
        let archive = settings.archive_path();
        let staging = settings.staging_dir();

        self.dispatcher
            .download(&settings.release.download_url(), &paths.tmp_dir)?;
        self.dispatcher.extract_zip(&archive, &paths.tmp_dir)?;
        if settings.install.purge_document_root {
            self.dispatcher.purge_dir(&paths.document_root)?;
        }
        self.dispatcher
            .move_contents(&staging, &paths.document_root)?;
        self.dispatcher.chown_tree(
            &paths.document_root,
            &settings.ownership.owner,
            &settings.ownership.group,
        )?;
        if settings.install.clean_up {
            self.dispatcher
                .remove_empty_dirs(&staging, &paths.tmp_dir)?;
            self.dispatcher.remove_file(&archive)?;
        }
        Ok(())
    }

    fn create_database(&mut self) -> EffectResult<()> {
        let database = &self.settings.database;
        self.dispatcher.run_command(
            &CommandSpec::new("mysqladmin").args(["-u", "root", "password", database.password.as_str()]),
        )?;
        self.dispatcher.run_command(&CommandSpec::new("mysql").args([
            format!("--user={}", database.user),
            format!("--password={}", database.password),
            "-e".to_string(),
            format!("create database {}", database.name),
        ]))?;
        Ok(())
    }

    fn configure_database_access(&mut self) -> EffectResult<()> {
        let settings = self.settings;
        let database = &settings.database;
        let db_ini = settings.db_ini_path();
        for (key, value) in [
            ("host     = ", &database.server),
            ("username = ", &database.user),
            ("password = ", &database.password),
            ("dbname   = ", &database.name),
        ] {
            let spec = PatchSpec::literal_replace(
                format!("{key}{PLACEHOLDER}"),
                format!("{key}\"{value}\""),
            )
            .max_occurs(1)
            .expect_exactly(1);
            self.dispatcher.patch(&db_ini, &spec)?;
        }
        self.dispatcher.chown(
            &db_ini,
            &settings.ownership.owner,
            &settings.ownership.group,
        )?;
        self.dispatcher.chmod(&db_ini, DB_INI_MODE)?;
        Ok(())
    }

    fn enable_overrides(&mut self) -> EffectResult<()> {
        self.dispatcher
            .run_command(&CommandSpec::new("a2enmod").arg("rewrite"))?;
        let spec = PatchSpec::literal_replace(WEB_ROOT_OVERRIDE_NONE, WEB_ROOT_OVERRIDE_ALL)
            .expect_exactly(1);
        self.dispatcher
            .patch(&self.settings.paths.apache_conf, &spec)?;
        Ok(())
    }
}
