//! Read-modify-write of configuration files on disk.
//!
//! # Design
//! - Files are read whole, transformed in memory, and replaced through a staged sibling.
//! - Permission bits always carry over; ownership carries over when the process may chown.
//! - Expectation failures return before anything is staged.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{PatchError, PatchResult};
use crate::spec::{MatchCount, PatchSpec, Transformed};

/// Apply `spec` to the file at `path` and report how many locations changed.
///
/// # Errors
///
/// Returns an error when the file cannot be read or replaced, when the request
/// is malformed, or when an expected count is configured and not met.
pub fn apply(path: &Path, spec: &PatchSpec) -> PatchResult<MatchCount> {
    // Symlinked targets are edited in place; the link itself stays.
    let resolved =
        fs::canonicalize(path).map_err(|source| PatchError::io("patch.resolve", path, source))?;
    let original = fs::read_to_string(&resolved)
        .map_err(|source| PatchError::io("patch.read", &resolved, source))?;
    let Transformed { text, matches } = spec.transform(&original)?;

    if let Some(expected) = spec.expected()
        && matches.get() != expected
    {
        return Err(PatchError::UnexpectedMatchCount {
            path: path.to_path_buf(),
            expected,
            actual: matches.get(),
        });
    }

    if text == original {
        debug!(path = %path.display(), op = spec.op().label(), "patch left file unchanged");
        return Ok(matches);
    }

    write_atomic(&resolved, &text)?;
    debug!(
        path = %path.display(),
        op = spec.op().label(),
        matches = matches.get(),
        "patch applied"
    );
    Ok(matches)
}

/// Replace up to `max_occurs` literal occurrences of `needle` in `path`.
///
/// # Errors
///
/// See [`apply`].
pub fn literal_replace(
    path: &Path,
    needle: &str,
    replacement: &str,
    max_occurs: Option<usize>,
) -> PatchResult<MatchCount> {
    apply(path, &bounded(PatchSpec::literal_replace(needle, replacement), max_occurs))
}

/// Replace up to `max_occurs` matches of `pattern` in `path`.
///
/// # Errors
///
/// See [`apply`].
pub fn regex_replace(
    path: &Path,
    pattern: &str,
    replacement: &str,
    max_occurs: Option<usize>,
) -> PatchResult<MatchCount> {
    apply(path, &bounded(PatchSpec::regex_replace(pattern, replacement), max_occurs))
}

/// Prefix up to `max_occurs` lines of `path` starting with a match of `pattern` with `#`.
///
/// # Errors
///
/// See [`apply`].
pub fn comment_out_matching(
    path: &Path,
    pattern: &str,
    max_occurs: Option<usize>,
) -> PatchResult<MatchCount> {
    apply(path, &bounded(PatchSpec::comment_out_matching(pattern), max_occurs))
}

/// Append `fragments` to `path` in order.
///
/// # Errors
///
/// Returns an error when the file cannot be read or replaced.
pub fn append<I, S>(path: &Path, fragments: I) -> PatchResult<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    apply(path, &PatchSpec::append(fragments)).map(|_| ())
}

const fn bounded(spec: PatchSpec, max_occurs: Option<usize>) -> PatchSpec {
    match max_occurs {
        Some(limit) => spec.max_occurs(limit),
        None => spec,
    }
}

fn write_atomic(path: &Path, contents: &str) -> PatchResult<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let metadata = fs::metadata(path).map_err(|source| PatchError::io("patch.stat", path, source))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".stackup-patch-")
        .tempfile_in(parent)
        .map_err(|source| PatchError::io("patch.stage", parent, source))?;
    staged
        .write_all(contents.as_bytes())
        .map_err(|source| PatchError::io("patch.write", staged.path(), source))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|source| PatchError::io("patch.sync", staged.path(), source))?;
    fs::set_permissions(staged.path(), metadata.permissions())
        .map_err(|source| PatchError::io("patch.permissions", staged.path(), source))?;

    #[cfg(unix)]
    preserve_ownership(staged.path(), &metadata);

    staged
        .persist(path)
        .map_err(|err| PatchError::io("patch.replace", path, err.error))?;
    Ok(())
}

#[cfg(unix)]
fn preserve_ownership(staged: &Path, metadata: &fs::Metadata) {
    use nix::unistd::{Gid, Uid, chown};
    use std::os::unix::fs::MetadataExt;

    let owner = Uid::from_raw(metadata.uid());
    let group = Gid::from_raw(metadata.gid());
    if let Err(err) = chown(staged, Some(owner), Some(group)) {
        debug!(
            path = %staged.display(),
            error = %err,
            "ownership of patched file not preserved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn scratch(name: &str, contents: &str) -> Result<(TempDir, std::path::PathBuf)> {
        let dir = tempfile::Builder::new().prefix("stackup-patch-").tempdir()?;
        let path = dir.path().join(name);
        fs::write(&path, contents)?;
        Ok((dir, path))
    }

    #[test]
    fn literal_replace_rewrites_first_placeholder_only() -> Result<()> {
        let (_dir, path) = scratch(
            "db.ini",
            "host     = \"XXXXXXX\"\nhost     = \"XXXXXXX\"\n",
        )?;
        let count = literal_replace(&path, "\"XXXXXXX\"", "\"db1\"", Some(1))?;
        assert_eq!(count.get(), 1);
        assert_eq!(
            fs::read_to_string(&path)?,
            "host     = \"db1\"\nhost     = \"XXXXXXX\"\n"
        );
        Ok(())
    }

    #[test]
    fn replace_or_append_adds_missing_setting_once() -> Result<()> {
        let (_dir, path) = scratch("php.ini", "[PHP]\nmemory_limit = 128M\n")?;
        let pattern = r"(?m)(^|\s)allow_url_fopen\s*=\s*(?:[Oo]n|[Oo]ff)";
        let count = regex_replace(&path, pattern, "${1}allow_url_fopen = Off", None)?;
        assert!(count.is_zero());
        append(&path, ["\nallow_url_fopen = Off\n"])?;

        let text = fs::read_to_string(&path)?;
        assert!(text.starts_with("[PHP]\nmemory_limit = 128M\n"));
        assert!(text.ends_with("allow_url_fopen = Off\n"));
        assert_eq!(text.matches("allow_url_fopen").count(), 1);

        let again = regex_replace(&path, pattern, "${1}allow_url_fopen = Off", None)?;
        assert_eq!(again.get(), 1);
        assert_eq!(fs::read_to_string(&path)?, text);
        Ok(())
    }

    #[test]
    fn comment_out_reports_single_matching_line() -> Result<()> {
        let (_dir, path) = scratch(
            "default-ssl.conf",
            "SSLCertificateFile /etc/ssl/certs/old.pem\nSSLEngine on\nServerAdmin root\n",
        )?;
        let count = comment_out_matching(&path, "SSLCertificateFile", None)?;
        assert_eq!(count.get(), 1);
        assert_eq!(
            fs::read_to_string(&path)?,
            "#SSLCertificateFile /etc/ssl/certs/old.pem\nSSLEngine on\nServerAdmin root\n"
        );
        Ok(())
    }

    #[test]
    fn unmet_expectation_leaves_file_untouched() -> Result<()> {
        let original = "<Directory /var/www/>\n\tAllowOverride all\n";
        let (_dir, path) = scratch("apache2.conf", original)?;
        let spec = PatchSpec::literal_replace("AllowOverride None", "AllowOverride all")
            .expect_exactly(1);
        let Err(err) = apply(&path, &spec) else {
            panic!("expected an unmet expectation to fail");
        };
        assert!(matches!(
            err,
            PatchError::UnexpectedMatchCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
        assert_eq!(fs::read_to_string(&path)?, original);
        Ok(())
    }

    #[test]
    fn missing_file_is_not_created() -> Result<()> {
        let dir = tempfile::Builder::new().prefix("stackup-patch-").tempdir()?;
        let path = dir.path().join("absent.conf");
        let Err(err) = append(&path, ["x"]) else {
            panic!("expected a missing file to fail");
        };
        assert!(matches!(err, PatchError::Io { operation: "patch.resolve", .. }));
        assert!(!path.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_target_is_written_through() -> Result<()> {
        use std::os::unix::fs::symlink;

        let (dir, real) = scratch("real.conf", "SSLCertificateFile a\n")?;
        let link = dir.path().join("link.conf");
        symlink(&real, &link)?;

        let count = comment_out_matching(&link, "SSLCertificateFile", None)?;
        assert_eq!(count.get(), 1);
        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_link(&link)?, real);
        assert_eq!(fs::read_to_string(&real)?, "#SSLCertificateFile a\n");
        assert_eq!(fs::read_dir(dir.path())?.count(), 2);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn permissions_survive_the_rewrite() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = scratch("db.ini", "password = \"XXXXXXX\"\n")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640))?;
        literal_replace(&path, "XXXXXXX", "secret", None)?;
        let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        Ok(())
    }

    #[test]
    fn no_stray_staging_files_remain() -> Result<()> {
        let (dir, path) = scratch("a.conf", "a\n")?;
        append(&path, ["b\n"])?;
        let entries = fs::read_dir(dir.path())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }
}
