//! Patch requests and the in-memory transformations behind them.
//!
//! # Design
//! - `PatchSpec` is immutable once built; builder methods consume `self`.
//! - Transformations are pure functions over `&str` so file IO stays in `file.rs`.
//! - Counts are capped by the bound and by the matches present in the input.

use std::fmt::{self, Display, Formatter};

use regex::Regex;
use serde::Serialize;

use crate::error::{PatchError, PatchResult};

/// Marker prepended to lines by [`PatchSpec::comment_out_matching`].
pub const DEFAULT_COMMENT_MARKER: &str = "#";

/// Number of locations a patch operation actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct MatchCount(usize);

impl MatchCount {
    /// No locations changed.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw count.
    #[must_use]
    pub const fn new(count: usize) -> Self {
        Self(count)
    }

    /// Raw count.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Whether nothing was changed.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Display for MatchCount {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Operation carried by a [`PatchSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchOp {
    /// Replace literal occurrences of `needle`.
    LiteralReplace {
        /// Literal text to look for.
        needle: String,
        /// Text substituted for each occurrence.
        replacement: String,
    },
    /// Replace regular expression matches; the replacement may use `$1` or `${name}`.
    RegexReplace {
        /// Regular expression to look for.
        pattern: String,
        /// Replacement template.
        replacement: String,
    },
    /// Prefix lines whose start matches `pattern` with `marker`.
    CommentOutMatching {
        /// Regular expression that must match at the start of a line.
        pattern: String,
        /// Comment marker to prepend.
        marker: String,
    },
    /// Append fragments to the end of the file, in order.
    Append {
        /// Fragments appended verbatim.
        fragments: Vec<String>,
    },
}

impl PatchOp {
    /// Stable label used in logs and planned effects.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::LiteralReplace { .. } => "literal_replace",
            Self::RegexReplace { .. } => "regex_replace",
            Self::CommentOutMatching { .. } => "comment_out_matching",
            Self::Append { .. } => "append",
        }
    }
}

/// A single patch request against one configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchSpec {
    op: PatchOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_occurs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<usize>,
}

/// Result of applying a [`PatchSpec`] to in-memory contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Contents after the operation.
    pub text: String,
    /// Locations changed; always zero for appends.
    pub matches: MatchCount,
}

impl PatchSpec {
    /// Replace literal occurrences of `needle` with `replacement`.
    #[must_use]
    pub fn literal_replace(needle: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::from_op(PatchOp::LiteralReplace {
            needle: needle.into(),
            replacement: replacement.into(),
        })
    }

    /// Replace matches of `pattern` with `replacement`.
    #[must_use]
    pub fn regex_replace(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::from_op(PatchOp::RegexReplace {
            pattern: pattern.into(),
            replacement: replacement.into(),
        })
    }

    /// Comment out lines whose start matches `pattern` using `#`.
    #[must_use]
    pub fn comment_out_matching(pattern: impl Into<String>) -> Self {
        Self::comment_out_matching_with(pattern, DEFAULT_COMMENT_MARKER)
    }

    /// Comment out lines whose start matches `pattern` using a custom marker.
    #[must_use]
    pub fn comment_out_matching_with(pattern: impl Into<String>, marker: impl Into<String>) -> Self {
        Self::from_op(PatchOp::CommentOutMatching {
            pattern: pattern.into(),
            marker: marker.into(),
        })
    }

    /// Append `fragments` to the end of the file.
    #[must_use]
    pub fn append<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_op(PatchOp::Append {
            fragments: fragments.into_iter().map(Into::into).collect(),
        })
    }

    const fn from_op(op: PatchOp) -> Self {
        Self {
            op,
            max_occurs: None,
            expected: None,
        }
    }

    /// Stop after `limit` changes. Ignored by appends.
    #[must_use]
    pub const fn max_occurs(mut self, limit: usize) -> Self {
        self.max_occurs = Some(limit);
        self
    }

    /// Fail the patch, leaving the file untouched, unless exactly `count` locations change.
    #[must_use]
    pub const fn expect_exactly(mut self, count: usize) -> Self {
        self.expected = Some(count);
        self
    }

    /// Operation carried by this request.
    #[must_use]
    pub const fn op(&self) -> &PatchOp {
        &self.op
    }

    /// Configured bound, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.max_occurs
    }

    /// Configured expectation, if any.
    #[must_use]
    pub const fn expected(&self) -> Option<usize> {
        self.expected
    }

    /// Apply the operation to `original` without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error when a pattern fails to compile or a literal needle is empty.
    pub fn transform(&self, original: &str) -> PatchResult<Transformed> {
        match &self.op {
            PatchOp::LiteralReplace {
                needle,
                replacement,
            } => replace_literal(original, needle, replacement, self.max_occurs),
            PatchOp::RegexReplace {
                pattern,
                replacement,
            } => replace_regex(original, pattern, replacement, self.max_occurs),
            PatchOp::CommentOutMatching { pattern, marker } => {
                comment_out(original, pattern, marker, self.max_occurs)
            }
            PatchOp::Append { fragments } => Ok(append_fragments(original, fragments)),
        }
    }
}

fn capped(present: usize, limit: Option<usize>) -> usize {
    limit.map_or(present, |limit| present.min(limit))
}

fn compile(pattern: &str) -> PatchResult<Regex> {
    Regex::new(pattern).map_err(|source| PatchError::pattern(pattern, source))
}

fn replace_literal(
    original: &str,
    needle: &str,
    replacement: &str,
    limit: Option<usize>,
) -> PatchResult<Transformed> {
    if needle.is_empty() {
        return Err(PatchError::InvalidInput {
            field: "needle",
            reason: "empty",
        });
    }
    let matches = capped(original.matches(needle).count(), limit);
    Ok(Transformed {
        text: original.replacen(needle, replacement, matches),
        matches: MatchCount::new(matches),
    })
}

fn replace_regex(
    original: &str,
    pattern: &str,
    replacement: &str,
    limit: Option<usize>,
) -> PatchResult<Transformed> {
    let regex = compile(pattern)?;
    let matches = capped(regex.find_iter(original).count(), limit);
    // `replacen` treats a limit of zero as "replace all".
    let text = if matches == 0 {
        original.to_string()
    } else {
        regex.replacen(original, matches, replacement).into_owned()
    };
    Ok(Transformed {
        text,
        matches: MatchCount::new(matches),
    })
}

fn comment_out(
    original: &str,
    pattern: &str,
    marker: &str,
    limit: Option<usize>,
) -> PatchResult<Transformed> {
    let regex = compile(pattern)?;
    let budget = limit.unwrap_or(usize::MAX);
    let mut text = String::with_capacity(original.len());
    let mut changed = 0usize;
    for line in original.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        if changed < budget && matches_at_line_start(&regex, body) {
            text.push_str(marker);
            changed += 1;
        }
        text.push_str(line);
    }
    Ok(Transformed {
        text,
        matches: MatchCount::new(changed),
    })
}

// Leftmost search: any match starting at zero is the one reported.
fn matches_at_line_start(regex: &Regex, line: &str) -> bool {
    regex.find(line).is_some_and(|found| found.start() == 0)
}

fn append_fragments(original: &str, fragments: &[String]) -> Transformed {
    let extra: usize = fragments.iter().map(String::len).sum();
    let mut text = String::with_capacity(original.len() + extra);
    text.push_str(original);
    for fragment in fragments {
        text.push_str(fragment);
    }
    Transformed {
        text,
        matches: MatchCount::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const DB_INI: &str = "[database]\nhost     = \"XXXXXXX\"\nusername = \"XXXXXXX\"\n";

    #[test]
    fn literal_replace_respects_bound_in_document_order() -> Result<()> {
        let spec = PatchSpec::literal_replace("\"XXXXXXX\"", "\"db1\"").max_occurs(1);
        let result = spec.transform(DB_INI)?;
        assert_eq!(result.matches, MatchCount::new(1));
        assert_eq!(
            result.text,
            "[database]\nhost     = \"db1\"\nusername = \"XXXXXXX\"\n"
        );
        Ok(())
    }

    #[test]
    fn literal_replace_without_bound_replaces_everything() -> Result<()> {
        let result = PatchSpec::literal_replace("XXXXXXX", "x").transform(DB_INI)?;
        assert_eq!(result.matches.get(), 2);
        assert!(!result.text.contains("XXXXXXX"));
        Ok(())
    }

    #[test]
    fn literal_replace_reports_true_count_under_generous_bound() -> Result<()> {
        let result = PatchSpec::literal_replace("XXXXXXX", "x")
            .max_occurs(10)
            .transform(DB_INI)?;
        assert_eq!(result.matches.get(), 2);
        Ok(())
    }

    #[test]
    fn literal_replace_rejects_empty_needle() {
        let result = PatchSpec::literal_replace("", "x").transform(DB_INI);
        assert!(matches!(
            result,
            Err(PatchError::InvalidInput { field: "needle", .. })
        ));
    }

    #[test]
    fn zero_bound_changes_nothing() -> Result<()> {
        let literal = PatchSpec::literal_replace("XXXXXXX", "x")
            .max_occurs(0)
            .transform(DB_INI)?;
        assert!(literal.matches.is_zero());
        assert_eq!(literal.text, DB_INI);

        let regex = PatchSpec::regex_replace("X+", "x")
            .max_occurs(0)
            .transform(DB_INI)?;
        assert!(regex.matches.is_zero());
        assert_eq!(regex.text, DB_INI);
        Ok(())
    }

    #[test]
    fn regex_replace_expands_capture_groups() -> Result<()> {
        let ini = "  register_globals = On\n;register_globals = On\n";
        let spec = PatchSpec::regex_replace(
            r"(?m)(^|\s)register_globals\s*=\s*(?:[Oo]n|[Oo]ff)",
            "${1}register_globals = Off",
        );
        let result = spec.transform(ini)?;
        assert_eq!(result.matches.get(), 1);
        assert_eq!(
            result.text,
            "  register_globals = Off\n;register_globals = On\n"
        );
        Ok(())
    }

    #[test]
    fn unbounded_regex_replace_rewrites_every_match() -> Result<()> {
        let ini = "allow_url_fopen = On\nengine = On\n allow_url_fopen=on\n\tallow_url_fopen = Off\n";
        let result = PatchSpec::regex_replace(
            r"(?m)(^|\s)allow_url_fopen\s*=\s*(?:[Oo]n|[Oo]ff)",
            "${1}allow_url_fopen = Off",
        )
        .transform(ini)?;
        assert_eq!(result.matches.get(), 3);
        assert_eq!(
            result.text,
            "allow_url_fopen = Off\nengine = On\n allow_url_fopen = Off\n\tallow_url_fopen = Off\n"
        );
        Ok(())
    }

    #[test]
    fn regex_replace_caps_at_bound() -> Result<()> {
        let result = PatchSpec::regex_replace("X{7}", "y")
            .max_occurs(1)
            .transform(DB_INI)?;
        assert_eq!(result.matches.get(), 1);
        assert_eq!(result.text.matches("XXXXXXX").count(), 1);
        assert!(result.text.starts_with("[database]\nhost     = \"y\""));
        Ok(())
    }

    #[test]
    fn regex_replace_reports_malformed_patterns() {
        let result = PatchSpec::regex_replace("(unclosed", "x").transform(DB_INI);
        assert!(matches!(result, Err(PatchError::Pattern { .. })));
    }

    #[test]
    fn comment_out_touches_only_lines_matching_at_start() -> Result<()> {
        let conf = "SSLCertificateFile /a.crt\nServerName demo\n  Mid SSLCertificateFile x\n";
        let result = PatchSpec::comment_out_matching("SSLCertificateFile").transform(conf)?;
        assert_eq!(result.matches.get(), 1);
        assert_eq!(
            result.text,
            "#SSLCertificateFile /a.crt\nServerName demo\n  Mid SSLCertificateFile x\n"
        );
        Ok(())
    }

    #[test]
    fn comment_out_honours_bound_and_marker() -> Result<()> {
        let conf = "a=1\na=2\na=3";
        let result = PatchSpec::comment_out_matching_with("a=", ";")
            .max_occurs(2)
            .transform(conf)?;
        assert_eq!(result.matches.get(), 2);
        assert_eq!(result.text, ";a=1\n;a=2\na=3");
        Ok(())
    }

    #[test]
    fn comment_out_preserves_missing_trailing_newline_and_crlf() -> Result<()> {
        let conf = "keep\r\nSSLCertificateFile x\r\nlast";
        let result = PatchSpec::comment_out_matching(r"\s*SSLCertificateFile\b").transform(conf)?;
        assert_eq!(result.text, "keep\r\n#SSLCertificateFile x\r\nlast");
        Ok(())
    }

    #[test]
    fn append_keeps_original_as_prefix() -> Result<()> {
        let result = PatchSpec::append(["one\n", "two\n"]).transform("zero\n")?;
        assert_eq!(result.text, "zero\none\ntwo\n");
        assert!(result.matches.is_zero());
        Ok(())
    }

    #[test]
    fn bounds_never_exceed_presence_or_limit() -> Result<()> {
        let text = "ab ab ab ab";
        for limit in 0..6 {
            let literal = PatchSpec::literal_replace("ab", "c")
                .max_occurs(limit)
                .transform(text)?;
            let regex = PatchSpec::regex_replace("a.", "c")
                .max_occurs(limit)
                .transform(text)?;
            let expected = limit.min(4);
            for result in [&literal, &regex] {
                assert_eq!(result.matches.get(), expected);
                assert_eq!(result.text.matches('c').count(), expected);
                assert_eq!(result.text.matches("ab").count(), 4 - expected);
            }
        }
        Ok(())
    }

    #[test]
    fn spec_serialises_with_operation_tag() -> Result<()> {
        let spec = PatchSpec::literal_replace("a", "b").max_occurs(1).expect_exactly(1);
        assert_eq!(spec.op().label(), "literal_replace");
        assert_eq!(spec.limit(), Some(1));
        assert_eq!(spec.expected(), Some(1));
        Ok(())
    }
}
