//! Scratch server trees and release archives.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;
use zip::write::FileOptions;

/// Stock Debian `php.ini` excerpt with every hardened setting present but permissive.
pub const PHP_INI: &str = "[PHP]\n\
engine = On\n\
register_globals = On\n\
allow_url_fopen = On\n\
session.use_trans_sid = 1\n\
memory_limit = 128M\n";

/// `php.ini` excerpt where none of the hardened settings appear.
pub const PHP_INI_BARE: &str = "[PHP]\nengine = On\nmemory_limit = 128M\n";

/// Stock `apache2.conf` excerpt with the web root directory block.
pub const APACHE2_CONF: &str = "ServerRoot \"/etc/apache2\"\n\
\n\
<Directory />\n\
\tOptions FollowSymLinks\n\
\tAllowOverride None\n\
\tRequire all denied\n\
</Directory>\n\
\n\
<Directory /var/www/>\n\
\tOptions Indexes FollowSymLinks\n\
\tAllowOverride None\n\
\tRequire all granted\n\
</Directory>\n";

/// Stock `default-ssl.conf` excerpt with snakeoil certificate lines.
pub const DEFAULT_SSL_CONF: &str = "<IfModule mod_ssl.c>\n\
\t<VirtualHost _default_:443>\n\
\t\tServerAdmin webmaster@localhost\n\
\t\tSSLEngine on\n\
\t\tSSLCertificateFile\t/etc/ssl/certs/ssl-cert-snakeoil.pem\n\
\t\tSSLCertificateKeyFile /etc/ssl/private/ssl-cert-snakeoil.key\n\
\t\t#SSLCertificateChainFile /etc/apache2/ssl.crt/server-ca.crt\n\
\t</VirtualHost>\n\
</IfModule>\n";

/// Stock `000-default.conf` excerpt.
pub const DEFAULT_SITE_CONF: &str = "<VirtualHost *:80>\n\
\tServerAdmin webmaster@localhost\n\
\tDocumentRoot /var/www/html\n\
</VirtualHost>\n";

/// Omeka `db.ini` as shipped in the release archive.
pub const DB_INI: &str = "[database]\n\
host     = \"XXXXXXX\"\n\
username = \"XXXXXXX\"\n\
password = \"XXXXXXX\"\n\
dbname   = \"XXXXXXX\"\n\
prefix   = \"omeka_\"\n\
charset  = \"utf8\"\n";

/// Scratch copy of the paths a provisioning run touches.
#[derive(Debug)]
pub struct ServerTree {
    root: TempDir,
}

impl ServerTree {
    /// Build a tree with stock configuration files and a default web page.
    ///
    /// # Errors
    ///
    /// Returns an error when the scratch directory cannot be populated.
    pub fn new() -> Result<Self> {
        Self::with_php_ini(PHP_INI)
    }

    /// Build a tree with a custom `php.ini`.
    ///
    /// # Errors
    ///
    /// Returns an error when the scratch directory cannot be populated.
    pub fn with_php_ini(php_ini: &str) -> Result<Self> {
        let root = tempfile::Builder::new().prefix("stackup-server-").tempdir()?;
        let tree = Self { root };
        tree.write("etc/php5/apache2/php.ini", php_ini)?;
        tree.write("etc/apache2/apache2.conf", APACHE2_CONF)?;
        tree.write("etc/apache2/sites-available/default-ssl.conf", DEFAULT_SSL_CONF)?;
        tree.write("etc/apache2/sites-available/000-default.conf", DEFAULT_SITE_CONF)?;
        tree.write("var/www/html/index.html", "<html>It works!</html>\n")?;
        fs::create_dir_all(tree.tmp_dir())?;
        Ok(tree)
    }

    /// Root of the scratch tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Resolve a path relative to the root.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    /// `php.ini` location.
    #[must_use]
    pub fn php_ini(&self) -> PathBuf {
        self.path("etc/php5/apache2/php.ini")
    }

    /// `apache2.conf` location.
    #[must_use]
    pub fn apache_conf(&self) -> PathBuf {
        self.path("etc/apache2/apache2.conf")
    }

    /// `sites-available` location.
    #[must_use]
    pub fn sites_dir(&self) -> PathBuf {
        self.path("etc/apache2/sites-available")
    }

    /// Web document root.
    #[must_use]
    pub fn document_root(&self) -> PathBuf {
        self.path("var/www/html")
    }

    /// Scratch download directory.
    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.path("tmp")
    }

    /// Write `contents` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Read `relative` as text.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read.
    pub fn read(&self, relative: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path(relative))?)
    }
}

/// Write a minimal release archive whose files live under `release_name/`.
///
/// # Errors
///
/// Returns an error when the archive cannot be written.
pub fn write_release_archive(path: &Path, release_name: &str) -> Result<()> {
    let mut writer = zip::ZipWriter::new(File::create(path)?);
    let options = FileOptions::default();
    writer.add_directory(format!("{release_name}/"), options)?;
    writer.add_directory(format!("{release_name}/files/"), options)?;
    writer.start_file(format!("{release_name}/db.ini"), options)?;
    writer.write_all(DB_INI.as_bytes())?;
    writer.start_file(format!("{release_name}/.htaccess"), options)?;
    writer.write_all(b"RewriteEngine on\n")?;
    writer.start_file(format!("{release_name}/index.php"), options)?;
    writer.write_all(b"<?php\n")?;
    writer.finish()?;
    Ok(())
}
