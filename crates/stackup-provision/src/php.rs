//! PHP runtime hardening.

use stackup_effects::EffectResult;
use tracing::instrument;

use crate::error::{ProvisionResult, Step};
use crate::provisioner::Provisioner;

/// A `php.ini` directive forced to a fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhpDirective {
    /// Matches the directive when it is preceded by whitespace or starts a line.
    pub pattern: &'static str,
    /// Replacement keeping the leading whitespace captured by `pattern`.
    pub replacement: &'static str,
    /// Line appended when the directive is absent.
    pub line: &'static str,
}

/// Directives enforced by [`Provisioner::harden_php`], in order.
pub const PHP_DIRECTIVES: [PhpDirective; 3] = [
    PhpDirective {
        pattern: r"(?m)(^|\s)register_globals\s*=\s*(?:[Oo]n|[Oo]ff)",
        replacement: "${1}register_globals = Off",
        line: "register_globals = Off\n",
    },
    PhpDirective {
        pattern: r"(?m)(^|\s)allow_url_fopen\s*=\s*(?:[Oo]n|[Oo]ff)",
        replacement: "${1}allow_url_fopen = Off",
        line: "allow_url_fopen = Off\n",
    },
    PhpDirective {
        pattern: r"(?m)(^|\s)session\.use_trans_sid\s*=\s*[01]",
        replacement: "${1}session.use_trans_sid = 0",
        line: "session.use_trans_sid = 0\n",
    },
];

impl Provisioner<'_> {
    /// Force `register_globals`, `allow_url_fopen`, and `session.use_trans_sid` off, then restart Apache.
    ///
    /// # Errors
    ///
    /// Returns an error when `php.ini` cannot be patched or Apache fails to restart.
    #[instrument(name = "provision.harden_php", skip_all)]
    pub fn harden_php(&mut self) -> ProvisionResult<()> {
        self.step(Step::HardenPhp, Self::harden_php_effects)
    }

    fn harden_php_effects(&mut self) -> EffectResult<()> {
        let php_ini = self.settings.paths.php_ini.clone();
        for directive in PHP_DIRECTIVES {
            self.replace_or_append(
                &php_ini,
                directive.pattern,
                directive.replacement,
                directive.line,
            )?;
        }
        self.restart_apache_effects()
    }
}
