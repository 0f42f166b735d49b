//! Apache lockdown of the CMS upload directory.

use std::path::Path;

use stackup_effects::EffectResult;
use tracing::instrument;

use crate::error::{ProvisionResult, Step};
use crate::provisioner::Provisioner;

/// Directory block that stops Apache from executing anything under `{document_root}/images/`.
#[must_use]
pub fn uploads_block(document_root: &Path) -> String {
    format!(
        "<Directory {}/images/>\n\
         # Ignore .htaccess files\n\
         AllowOverride None\n\
         \n\
         # Serve HTML as plaintext, don't execute SHTML\n\
         AddType text/plain .html .htm .shtml .php .phtml .php5\n\
         \n\
         # Don't run arbitrary PHP code.\n\
         php_admin_flag engine off\n\
         </Directory>\n",
        document_root.display()
    )
}

impl Provisioner<'_> {
    /// Append the upload lockdown block to `apache2.conf` unless it is already there, then restart Apache.
    ///
    /// # Errors
    ///
    /// Returns an error when `apache2.conf` cannot be patched or Apache fails to restart.
    #[instrument(name = "provision.harden_uploads", skip_all)]
    pub fn harden_uploads(&mut self) -> ProvisionResult<()> {
        self.step(Step::HardenUploads, Self::harden_uploads_effects)
    }

    fn harden_uploads_effects(&mut self) -> EffectResult<()> {
        let settings = self.settings;
        let paths = &settings.paths;
        let block = uploads_block(&paths.document_root);
        self.ensure_block(&paths.apache_conf, &block)?;
        self.restart_apache_effects()
    }
}
