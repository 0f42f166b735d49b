//! Self-signed certificate and HTTPS virtual host setup.
//!
//! # Design
//! - The certificate prompts are answered over stdin in a single write.
//! - Stock snakeoil directives are commented out, never deleted.
//! - The plain HTTP site ends up redirecting every path to HTTPS.

use std::path::Path;

use stackup_effects::{CommandSpec, EffectResult};
use stackup_patch::PatchSpec;
use tracing::instrument;

use crate::error::{ProvisionResult, Step};
use crate::provisioner::Provisioner;

/// Permission bits of the private key: owner read/write, key group read.
pub const KEY_MODE: u32 = 0o640;

/// Stock certificate directives replaced by ours.
pub const SSL_DIRECTIVE_PATTERNS: [&str; 3] = [
    r"\s*SSLCertificateFile\b",
    r"\s*SSLCertificateKeyFile\b",
    r"\s*SSLCertificateChainFile\b",
];

const VIRTUAL_HOST_END: &str = "</VirtualHost>";

/// Directives inserted before the closing tag of the TLS virtual host.
#[must_use]
pub fn ssl_directives(certificate: &Path, key: &Path, server_name: &str) -> String {
    let certificate = certificate.display();
    format!(
        "\tSSLCertificateFile      {certificate}\n\
         \t\tSSLCertificateKeyFile {key}\n\
         \t\tSSLCertificateChainFile {certificate}\n\
         \t\tServerName {server_name}\n\
         \t\tServerAlias www.{server_name}\n\
         \t\tSSLProtocol all -SSLv2 -SSLv3\n\
         \t\tSSLCipherSuite HIGH:MEDIUM:!aNULL:!MD5:!SEED:!IDEA:!RC4\n\
         \t\tSSLHonorCipherOrder on\n\
         \t{VIRTUAL_HOST_END}",
        key = key.display(),
    )
}

/// Redirect inserted before the closing tag of the plain HTTP virtual host.
#[must_use]
pub fn https_redirect(server_name: &str) -> String {
    format!("\tRedirect permanent / https://{server_name}/\n{VIRTUAL_HOST_END}")
}

impl Provisioner<'_> {
    /// Generate a self-signed certificate, point the TLS site at it, and redirect HTTP to HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error at the first command or patch that fails, including when a
    /// site definition does not contain exactly one `</VirtualHost>`.
    #[instrument(name = "provision.configure_tls", skip_all)]
    pub fn configure_tls(&mut self) -> ProvisionResult<()> {
        self.step(Step::ConfigureTls, |this| {
            this.dispatcher
                .run_command(&CommandSpec::new("a2enmod").arg("ssl"))?;
            this.restart_apache_effects()?;
            this.issue_certificate()?;
            this.rewrite_site_definitions()?;
            this.dispatcher
                .run_command(&CommandSpec::new("a2ensite").arg("default-ssl.conf"))?;
            this.restart_apache_effects()
        })
    }

    fn issue_certificate(&mut self) -> EffectResult<()> {
        let settings = self.settings;
        let tls = &settings.tls;
        let command = CommandSpec::new("openssl")
            .args(["req", "-x509", "-nodes", "-days"])
            .arg(tls.validity_days.to_string())
            .arg("-newkey")
            .arg(format!("rsa:{}", tls.key_bits))
            .arg("-keyout")
            .arg(tls.key.display().to_string())
            .arg("-out")
            .arg(tls.certificate.display().to_string());
        let spawned = self.dispatcher.spawn_interactive(&command)?;
        let answers = tls.subject.answers(settings.server_name.as_str());
        self.answer(command.program(), spawned, &answers)?;
        self.dispatcher.chown(&tls.key, &tls.key_owner, &tls.key_group)?;
        self.dispatcher.chmod(&tls.key, KEY_MODE)?;
        Ok(())
    }

    fn rewrite_site_definitions(&mut self) -> EffectResult<()> {
        let settings = self.settings;
        let tls = &settings.tls;
        let server_name = settings.server_name.as_str();

        let ssl_site = settings.ssl_site_conf();
        for pattern in SSL_DIRECTIVE_PATTERNS {
            self.dispatcher
                .patch(&ssl_site, &PatchSpec::comment_out_matching(pattern))?;
        }
        let directives = ssl_directives(&tls.certificate, &tls.key, server_name);
        self.dispatcher.patch(
            &ssl_site,
            &PatchSpec::literal_replace(VIRTUAL_HOST_END, directives).expect_exactly(1),
        )?;

        self.dispatcher.patch(
            &settings.default_site_conf(),
            &PatchSpec::literal_replace(VIRTUAL_HOST_END, https_redirect(server_name))
                .expect_exactly(1),
        )?;
        Ok(())
    }
}
