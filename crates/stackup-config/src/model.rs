//! Typed settings for one provisioning run.
//!
//! # Design
//! - `Settings` is built once from `SettingsOverrides` and never mutated afterwards.
//! - Every absent override falls back to a constant in `defaults.rs`.
//! - Missing credentials are generated, never left empty.

use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::credentials::generate_credential;
use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::hostname::ServerName;

/// CMS release to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseSettings {
    /// Release line, e.g. `2.4`.
    pub version: String,
    /// Patch level, e.g. `1`; `0` is omitted from the release name.
    pub patch: String,
}

impl ReleaseSettings {
    /// Archive stem, e.g. `omeka-2.4.1`.
    #[must_use]
    pub fn name(&self) -> String {
        if self.patch == "0" {
            format!("{}-{}", defaults::RELEASE_PREFIX, self.version)
        } else {
            format!("{}-{}.{}", defaults::RELEASE_PREFIX, self.version, self.patch)
        }
    }

    /// Download URL of the release archive.
    #[must_use]
    pub fn download_url(&self) -> String {
        format!("{}/{}.zip", defaults::RELEASE_BASE_URL, self.name())
    }
}

/// Database connection written into `db.ini`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSettings {
    /// Database host.
    pub server: String,
    /// Database account.
    pub user: String,
    /// Database password; also set as the MySQL root password.
    pub password: String,
    /// Database name.
    pub name: String,
}

/// Site identity and administrator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSettings {
    /// Site title.
    pub name: String,
    /// Administrator username.
    pub admin_user: String,
    /// Administrator password.
    pub admin_password: String,
}

/// Owner and group applied to installed files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ownership {
    /// User name or numeric uid.
    pub owner: String,
    /// Group name or numeric gid.
    pub group: String,
}

/// Install behaviour toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstallOptions {
    /// Remove the downloaded archive and empty staging directory afterwards.
    pub clean_up: bool,
    /// Remove non-hidden entries of the document root before installing.
    pub purge_document_root: bool,
    /// Add the upload directory lockdown block to `apache2.conf`.
    pub harden_uploads: bool,
}

/// Files touched on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerPaths {
    /// Web document root.
    pub document_root: PathBuf,
    /// Download and staging directory.
    pub tmp_dir: PathBuf,
    /// PHP configuration for Apache.
    pub php_ini: PathBuf,
    /// Main Apache configuration.
    pub apache_conf: PathBuf,
    /// Apache `sites-available` directory.
    pub sites_dir: PathBuf,
}

/// Answers given to `openssl req` for the certificate subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSubject {
    /// Two-letter country code.
    pub country: String,
    /// State or province.
    pub state: String,
    /// City.
    pub locality: String,
    /// Organisation.
    pub organization: String,
    /// Organisational unit.
    pub unit: String,
    /// Contact email.
    pub email: String,
}

impl Default for CertificateSubject {
    fn default() -> Self {
        Self {
            country: defaults::SUBJECT_COUNTRY.to_string(),
            state: defaults::SUBJECT_STATE.to_string(),
            locality: defaults::SUBJECT_LOCALITY.to_string(),
            organization: defaults::SUBJECT_ORGANIZATION.to_string(),
            unit: defaults::SUBJECT_UNIT.to_string(),
            email: defaults::SUBJECT_EMAIL.to_string(),
        }
    }
}

impl CertificateSubject {
    /// Newline-terminated answers in prompt order, with `common_name` in the CN slot.
    #[must_use]
    pub fn answers(&self, common_name: &str) -> String {
        [
            self.country.as_str(),
            self.state.as_str(),
            self.locality.as_str(),
            self.organization.as_str(),
            self.unit.as_str(),
            common_name,
            self.email.as_str(),
        ]
        .iter()
        .map(|answer| format!("{answer}\n"))
        .collect()
    }
}

/// Self-signed TLS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsSettings {
    /// Whether TLS is configured at all.
    pub enabled: bool,
    /// Certificate output path.
    pub certificate: PathBuf,
    /// Private key output path.
    pub key: PathBuf,
    /// Owner of the key.
    pub key_owner: String,
    /// Group allowed to read the key.
    pub key_group: String,
    /// Certificate validity in days.
    pub validity_days: u32,
    /// RSA key size.
    pub key_bits: u32,
    /// Subject answers.
    pub subject: CertificateSubject,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Hostname the site is served under.
    pub server_name: ServerName,
    /// CMS release.
    pub release: ReleaseSettings,
    /// Database connection.
    pub database: DatabaseSettings,
    /// Site identity.
    pub site: SiteSettings,
    /// File ownership.
    pub ownership: Ownership,
    /// Install toggles.
    pub install: InstallOptions,
    /// Server paths.
    pub paths: ServerPaths,
    /// TLS configuration.
    pub tls: TlsSettings,
}

/// Optional values layered over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    /// CMS release line.
    pub cms_version: Option<String>,
    /// CMS patch level.
    pub cms_patch: Option<String>,
    /// Database host.
    pub db_server: Option<String>,
    /// Database account.
    pub db_user: Option<String>,
    /// Database password.
    pub db_password: Option<String>,
    /// Database name.
    pub db_name: Option<String>,
    /// Site title.
    pub site_name: Option<String>,
    /// Administrator username.
    pub admin_user: Option<String>,
    /// Administrator password.
    pub admin_password: Option<String>,
    /// File owner.
    pub owner: Option<String>,
    /// File group.
    pub group: Option<String>,
    /// Remove downloads afterwards.
    pub clean_up: Option<bool>,
    /// Purge the document root first.
    pub purge_document_root: Option<bool>,
    /// Add the upload lockdown block.
    pub harden_uploads: Option<bool>,
    /// Configure TLS.
    pub tls_enabled: Option<bool>,
    /// Web document root.
    pub document_root: Option<PathBuf>,
    /// Download directory.
    pub tmp_dir: Option<PathBuf>,
    /// PHP configuration path.
    pub php_ini: Option<PathBuf>,
    /// Apache configuration path.
    pub apache_conf: Option<PathBuf>,
    /// Apache `sites-available` path.
    pub sites_dir: Option<PathBuf>,
    /// Certificate output path.
    pub ssl_certificate: Option<PathBuf>,
    /// Private key output path.
    pub ssl_key: Option<PathBuf>,
}

impl Settings {
    /// Merge `overrides` over the defaults, generating missing credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a merged value is unusable.
    pub fn from_overrides(server_name: ServerName, overrides: SettingsOverrides) -> ConfigResult<Self> {
        Self::from_overrides_with_rng(server_name, overrides, &mut rand::rng())
    }

    /// Same as [`Settings::from_overrides`] with an explicit random source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a merged value is unusable.
    pub fn from_overrides_with_rng<R: Rng + ?Sized>(
        server_name: ServerName,
        overrides: SettingsOverrides,
        rng: &mut R,
    ) -> ConfigResult<Self> {
        let mut generated = |what: &'static str| {
            debug!(credential = what, "generated credential");
            generate_credential(&mut *rng, defaults::CREDENTIAL_LENGTH)
        };
        let db_password = overrides
            .db_password
            .unwrap_or_else(|| generated("database_password"));
        let admin_user = overrides
            .admin_user
            .unwrap_or_else(|| generated("admin_user"));
        let admin_password = overrides
            .admin_password
            .unwrap_or_else(|| generated("admin_password"));

        let settings = Self {
            server_name,
            release: ReleaseSettings {
                version: or_default(overrides.cms_version, defaults::CMS_VERSION),
                patch: or_default(overrides.cms_patch, defaults::CMS_PATCH),
            },
            database: DatabaseSettings {
                server: or_default(overrides.db_server, defaults::DB_SERVER),
                user: or_default(overrides.db_user, defaults::DB_USER),
                password: db_password,
                name: or_default(overrides.db_name, defaults::DB_NAME),
            },
            site: SiteSettings {
                name: or_default(overrides.site_name, defaults::SITE_NAME),
                admin_user,
                admin_password,
            },
            ownership: Ownership {
                owner: or_default(overrides.owner, defaults::OWNER),
                group: or_default(overrides.group, defaults::GROUP),
            },
            install: InstallOptions {
                clean_up: overrides.clean_up.unwrap_or(true),
                purge_document_root: overrides.purge_document_root.unwrap_or(true),
                harden_uploads: overrides.harden_uploads.unwrap_or(false),
            },
            paths: ServerPaths {
                document_root: path_or_default(overrides.document_root, defaults::DOCUMENT_ROOT),
                tmp_dir: path_or_default(overrides.tmp_dir, defaults::TMP_DIR),
                php_ini: path_or_default(overrides.php_ini, defaults::PHP_INI),
                apache_conf: path_or_default(overrides.apache_conf, defaults::APACHE_CONF),
                sites_dir: path_or_default(overrides.sites_dir, defaults::SITES_DIR),
            },
            tls: TlsSettings {
                enabled: overrides.tls_enabled.unwrap_or(false),
                certificate: path_or_default(overrides.ssl_certificate, defaults::SSL_CERTIFICATE),
                key: path_or_default(overrides.ssl_key, defaults::SSL_KEY),
                key_owner: defaults::SSL_KEY_OWNER.to_string(),
                key_group: defaults::SSL_KEY_GROUP.to_string(),
                validity_days: defaults::SSL_VALIDITY_DAYS,
                key_bits: defaults::SSL_KEY_BITS,
                subject: CertificateSubject::default(),
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> ConfigResult<()> {
        let release = &self.release;
        if release.version.is_empty()
            || release.version.starts_with('.')
            || release.version.ends_with('.')
            || !release.version.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
        {
            return Err(ConfigError::field("release", "version", &release.version, "invalid_version"));
        }
        if release.patch.is_empty() || !release.patch.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::field("release", "patch", &release.patch, "invalid_patch"));
        }

        let database = &self.database;
        require_quotable("database", "server", &database.server)?;
        require_quotable("database", "user", &database.user)?;
        require_quotable("database", "password", &database.password)?;
        if database.name.is_empty()
            || !database
                .name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(ConfigError::field("database", "name", &database.name, "invalid_identifier"));
        }

        require_non_empty("site", "name", &self.site.name)?;
        require_non_empty("site", "admin_user", &self.site.admin_user)?;
        require_non_empty("ownership", "owner", &self.ownership.owner)?;
        require_non_empty("ownership", "group", &self.ownership.group)?;

        for (field, path) in [
            ("document_root", &self.paths.document_root),
            ("tmp_dir", &self.paths.tmp_dir),
            ("php_ini", &self.paths.php_ini),
            ("apache_conf", &self.paths.apache_conf),
            ("sites_dir", &self.paths.sites_dir),
            ("ssl_certificate", &self.tls.certificate),
            ("ssl_key", &self.tls.key),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidField {
                    section: "paths",
                    field,
                    value: None,
                    reason: "empty",
                });
            }
        }
        Ok(())
    }

    /// `http://` or `https://` URL of the site.
    #[must_use]
    pub fn server_url(&self) -> String {
        let scheme = if self.tls.enabled { "https" } else { "http" };
        format!("{scheme}://{}", self.server_name)
    }

    /// Where the release archive is downloaded to.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.paths
            .tmp_dir
            .join(format!("{}.zip", self.release.name()))
    }

    /// Directory the archive unpacks into.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.paths.tmp_dir.join(self.release.name())
    }

    /// `db.ini` inside the document root.
    #[must_use]
    pub fn db_ini_path(&self) -> PathBuf {
        self.paths.document_root.join("db.ini")
    }

    /// TLS virtual host definition.
    #[must_use]
    pub fn ssl_site_conf(&self) -> PathBuf {
        self.site_conf("default-ssl.conf")
    }

    /// Plain HTTP virtual host definition.
    #[must_use]
    pub fn default_site_conf(&self) -> PathBuf {
        self.site_conf("000-default.conf")
    }

    fn site_conf(&self, name: &str) -> PathBuf {
        self.paths.sites_dir.join(name)
    }
}

fn or_default(value: Option<String>, fallback: &str) -> String {
    value.unwrap_or_else(|| fallback.to_string())
}

fn path_or_default(value: Option<PathBuf>, fallback: &str) -> PathBuf {
    value.unwrap_or_else(|| Path::new(fallback).to_path_buf())
}

fn require_non_empty(section: &'static str, field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::field(section, field, value, "empty"));
    }
    Ok(())
}

// Values land inside double quotes in `db.ini`.
fn require_quotable(section: &'static str, field: &'static str, value: &str) -> ConfigResult<()> {
    require_non_empty(section, field, value)?;
    if value.contains(['"', '\n']) {
        return Err(ConfigError::field(section, field, value, "invalid_character"));
    }
    Ok(())
}
