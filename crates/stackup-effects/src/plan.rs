//! Execution modes, outcomes, and the planned-effect records kept in dry runs.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Whether side effects run or are only described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Perform every effect.
    #[default]
    Live,
    /// Describe every effect without performing it.
    DryRun,
}

impl ExecutionMode {
    /// Pick the mode from a `--dry-run` style flag.
    #[must_use]
    pub const fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Live }
    }

    /// Whether effects are suppressed.
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::DryRun => "dry_run",
        }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Result of a dispatched effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The effect ran and produced a value.
    Performed(T),
    /// The effect was described instead of run.
    Suppressed,
}

impl<T> Outcome<T> {
    /// Whether the effect was suppressed.
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    /// The produced value, if the effect ran.
    #[must_use]
    pub fn performed(self) -> Option<T> {
        match self {
            Self::Performed(value) => Some(value),
            Self::Suppressed => None,
        }
    }

    /// Transform the produced value.
    #[must_use]
    pub fn map<U>(self, op: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Performed(value) => Outcome::Performed(op(value)),
            Self::Suppressed => Outcome::Suppressed,
        }
    }
}

/// Value of a planned-effect argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Free text, rendered quoted.
    Text(String),
    /// Filesystem path, rendered quoted.
    Path(PathBuf),
    /// Count or bound.
    Count(usize),
    /// Boolean toggle.
    Flag(bool),
    /// File mode, rendered in octal.
    Mode(u32),
    /// Ordered list of text values.
    List(Vec<String>),
}

impl Display for ArgValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(formatter, "{text:?}"),
            Self::Path(path) => write!(formatter, "{:?}", path.display().to_string()),
            Self::Count(count) => write!(formatter, "{count}"),
            Self::Flag(flag) => write!(formatter, "{flag}"),
            Self::Mode(mode) => write!(formatter, "{mode:#o}"),
            Self::List(items) => write!(formatter, "{items:?}"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&Path> for ArgValue {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for ArgValue {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<usize> for ArgValue {
    fn from(value: usize) -> Self {
        Self::Count(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// One argument of a planned effect; keyword arguments carry a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectArg {
    /// Keyword, absent for positional arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    /// Argument value.
    pub value: ArgValue,
}

/// Structured description of an effect that a dry run suppressed.
///
/// Renders as `kind(arg1,arg2,key=value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedEffect {
    kind: &'static str,
    args: Vec<EffectArg>,
}

impl PlannedEffect {
    /// Start describing an effect of the given kind.
    #[must_use]
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    /// Add a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(EffectArg {
            name: None,
            value: value.into(),
        });
        self
    }

    /// Add a keyword argument.
    #[must_use]
    pub fn named(mut self, name: &'static str, value: impl Into<ArgValue>) -> Self {
        self.args.push(EffectArg {
            name: Some(name),
            value: value.into(),
        });
        self
    }

    /// Add a keyword argument when `value` is present.
    #[must_use]
    pub fn named_opt<V: Into<ArgValue>>(self, name: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.named(name, value),
            None => self,
        }
    }

    /// Effect kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Arguments in order.
    #[must_use]
    pub fn args(&self) -> &[EffectArg] {
        &self.args
    }

    /// Look up a keyword argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|arg| arg.name == Some(name))
            .map(|arg| &arg.value)
    }
}

impl Display for PlannedEffect {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}(", self.kind)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                formatter.write_str(",")?;
            }
            if let Some(name) = arg.name {
                write!(formatter, "{name}=")?;
            }
            write!(formatter, "{}", arg.value)?;
        }
        formatter.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn planned_effect_renders_positional_then_keyword_arguments() {
        let effect = PlannedEffect::new("chown")
            .arg(Path::new("/var/www/html/db.ini"))
            .named("user", "www-data")
            .named("group", "www-data");
        assert_eq!(
            effect.to_string(),
            "chown(\"/var/www/html/db.ini\",user=\"www-data\",group=\"www-data\")"
        );
        assert_eq!(effect.get("user"), Some(&ArgValue::from("www-data")));
        assert_eq!(effect.get("owner"), None);
    }

    #[test]
    fn planned_effect_renders_modes_lists_and_escapes() {
        let effect = PlannedEffect::new("chmod")
            .arg(PathBuf::from("/x"))
            .arg(ArgValue::Mode(0o400))
            .named("argv", vec!["a".to_string(), "b c".to_string()])
            .named("text", "line\n")
            .named_opt("max", Some(1usize))
            .named_opt::<usize>("expect", None);
        assert_eq!(
            effect.to_string(),
            "chmod(\"/x\",0o400,argv=[\"a\", \"b c\"],text=\"line\\n\",max=1)"
        );
    }

    #[test]
    fn planned_effect_serialises_to_json() -> Result<()> {
        let effect = PlannedEffect::new("run")
            .arg("a2enmod")
            .named("dry", true);
        let json = serde_json::to_value(&effect)?;
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "run",
                "args": [
                    {"value": "a2enmod"},
                    {"name": "dry", "value": true}
                ]
            })
        );
        Ok(())
    }

    #[test]
    fn outcome_helpers_follow_variant() {
        let performed: Outcome<usize> = Outcome::Performed(2);
        assert!(!performed.is_suppressed());
        assert_eq!(performed.clone().map(|n| n * 2), Outcome::Performed(4));
        assert_eq!(performed.performed(), Some(2));

        let suppressed: Outcome<usize> = Outcome::Suppressed;
        assert!(suppressed.is_suppressed());
        assert_eq!(suppressed.performed(), None);
    }

    #[test]
    fn execution_mode_from_flag() {
        assert_eq!(ExecutionMode::from_dry_run(true), ExecutionMode::DryRun);
        assert_eq!(ExecutionMode::from_dry_run(false), ExecutionMode::Live);
        assert_eq!(ExecutionMode::DryRun.to_string(), "dry_run");
        assert!(!ExecutionMode::default().is_dry_run());
    }
}
