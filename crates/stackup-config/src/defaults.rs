//! Default values applied when no override is supplied.
//!
//! # Design
//! - Paths match a stock Debian/Ubuntu Apache + PHP 5 layout.
//! - Certificate subject defaults identify the hosting organisation.

/// CMS release line.
pub const CMS_VERSION: &str = "2.4";
/// CMS patch level; `0` is omitted from the release name.
pub const CMS_PATCH: &str = "1";
/// Base URL that release archives are downloaded from.
pub const RELEASE_BASE_URL: &str = "http://omeka.org/files";
/// Release archive name prefix.
pub const RELEASE_PREFIX: &str = "omeka";

/// Database host written to `db.ini`.
pub const DB_SERVER: &str = "localhost";
/// Database account used by the CMS.
pub const DB_USER: &str = "root";
/// Database created for the CMS.
pub const DB_NAME: &str = "omeka";

/// Web server document root.
pub const DOCUMENT_ROOT: &str = "/var/www/html";
/// Scratch directory for the downloaded release.
pub const TMP_DIR: &str = "/tmp";
/// Owner of the installed files.
pub const OWNER: &str = "www-data";
/// Group of the installed files.
pub const GROUP: &str = "www-data";
/// Title of the new site.
pub const SITE_NAME: &str = "Test site";

/// PHP configuration for the Apache SAPI.
pub const PHP_INI: &str = "/etc/php5/apache2/php.ini";
/// Main Apache configuration.
pub const APACHE_CONF: &str = "/etc/apache2/apache2.conf";
/// Apache virtual host definitions.
pub const SITES_DIR: &str = "/etc/apache2/sites-available";
/// Self-signed certificate output.
pub const SSL_CERTIFICATE: &str = "/etc/ssl/certs/server.crt";
/// Private key output.
pub const SSL_KEY: &str = "/etc/ssl/private/server.key";
/// Owner of the private key.
pub const SSL_KEY_OWNER: &str = "root";
/// Group allowed to read the private key.
pub const SSL_KEY_GROUP: &str = "ssl-cert";
/// Certificate validity in days.
pub const SSL_VALIDITY_DAYS: u32 = 3650;
/// RSA key size.
pub const SSL_KEY_BITS: u32 = 2048;

/// Suffix appended to a dashed IPv4 address to form a hostname.
pub const IP_DOMAIN_SUFFIX: &str = ".cloud.computecanada.ca";

/// Length of generated usernames and passwords.
pub const CREDENTIAL_LENGTH: usize = 16;

pub(crate) const SUBJECT_COUNTRY: &str = "CA";
pub(crate) const SUBJECT_STATE: &str = "Nova Scotia";
pub(crate) const SUBJECT_LOCALITY: &str = "Halifax";
pub(crate) const SUBJECT_ORGANIZATION: &str = "Compute Canada";
pub(crate) const SUBJECT_UNIT: &str = "ACENET";
pub(crate) const SUBJECT_EMAIL: &str = "no@email.com";
