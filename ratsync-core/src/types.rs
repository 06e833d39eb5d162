//! Domain types for the ratsync lock record.
//!
//! Rule paths and ignore patterns are posix strings relative to the
//! repository root. They are normalized on construction and again on load,
//! so every value held by a [`LockRecord`] is already canonical.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::template_ref;

/// Lock record schema written by this version.
pub const SCHEMA_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Path normalization
// ---------------------------------------------------------------------------

/// Normalize a rule path or glob to posix form.
///
/// Trims whitespace, converts `\` to `/`, drops empty and `.` segments.
/// `src/**` stays `src/**`; `./src/` becomes `src`.
pub fn normalize_path(raw: &str) -> String {
    raw.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// True when `s` is a full 40- or 64-character hex commit id.
pub fn looks_like_commit(s: &str) -> bool {
    matches!(s.len(), 40 | 64) && s.chars().all(|c| c.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Ownership strategy of a managed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Template always wins.
    Enforce,
    /// Local always wins once the file exists.
    Preserve,
    /// Line-level reconciliation with conflict marking.
    Merge,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Enforce => "enforce",
            Strategy::Preserve => "preserve",
            Strategy::Merge => "merge",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Strategy::Enforce),
            "preserve" => Ok(Strategy::Preserve),
            "merge" => Ok(Strategy::Merge),
            other => Err(ConfigError::UnknownStrategy(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Managed rules
// ---------------------------------------------------------------------------

/// A path pattern and the strategy that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ManagedRuleFile")]
pub struct ManagedRule {
    path: String,
    strategy: Strategy,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ManagedRuleFile {
    path: String,
    strategy: Strategy,
}

impl TryFrom<ManagedRuleFile> for ManagedRule {
    type Error = ConfigError;

    fn try_from(raw: ManagedRuleFile) -> Result<Self, Self::Error> {
        ManagedRule::new(&raw.path, raw.strategy)
    }
}

impl ManagedRule {
    /// Build a rule, normalizing `path`. Fails on an empty path.
    pub fn new(path: &str, strategy: Strategy) -> Result<Self, ConfigError> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        Ok(Self { path, strategy })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

impl fmt::Display for ManagedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.strategy)
    }
}

/// Parses `PATH` (enforce) or `PATH:STRATEGY`.
impl FromStr for ManagedRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((path, suffix))
                if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_alphabetic()) =>
            {
                ManagedRule::new(path, suffix.parse()?)
            }
            _ => ManagedRule::new(s, Strategy::Enforce),
        }
    }
}

/// Ordered, path-unique set of managed rules.
///
/// Construction keeps the first rule declared for each path and drops the
/// rest; the result is never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ManagedRule>", into = "Vec<ManagedRule>")]
pub struct RuleSet {
    rules: Vec<ManagedRule>,
}

impl RuleSet {
    pub fn new(rules: impl IntoIterator<Item = ManagedRule>) -> Self {
        let mut kept: Vec<ManagedRule> = Vec::new();
        for rule in rules {
            if !kept.iter().any(|r| r.path == rule.path) {
                kept.push(rule);
            }
        }
        Self { rules: kept }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManagedRule> {
        self.rules.iter()
    }

    pub fn as_slice(&self) -> &[ManagedRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule declared for exactly `path` (after normalization), if any.
    pub fn get(&self, path: &str) -> Option<&ManagedRule> {
        let path = normalize_path(path);
        self.rules.iter().find(|r| r.path == path)
    }
}

impl From<Vec<ManagedRule>> for RuleSet {
    fn from(rules: Vec<ManagedRule>) -> Self {
        RuleSet::new(rules)
    }
}

impl From<RuleSet> for Vec<ManagedRule> {
    fn from(set: RuleSet) -> Self {
        set.rules
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a ManagedRule;
    type IntoIter = std::slice::Iter<'a, ManagedRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Normalize, deduplicate and drop empty ignore patterns, keeping order.
pub fn normalize_ignore_patterns<I, S>(patterns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for raw in patterns {
        let p = normalize_path(raw.as_ref());
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Render rules
// ---------------------------------------------------------------------------

/// Substitution applied to template text before it is compared or written.
///
/// Accepted on input either as a mapping
/// `{pattern, replacement, literal}` or as a `[pattern, replacement]` pair
/// (regex). Both collapse into this one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RenderRuleShape")]
pub struct RenderRule {
    pattern: String,
    replacement: String,
    literal: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RenderRuleShape {
    Mapping {
        pattern: String,
        replacement: String,
        #[serde(default)]
        literal: bool,
    },
    Pair(String, String),
}

impl TryFrom<RenderRuleShape> for RenderRule {
    type Error = ConfigError;

    fn try_from(shape: RenderRuleShape) -> Result<Self, Self::Error> {
        match shape {
            RenderRuleShape::Mapping {
                pattern,
                replacement,
                literal,
            } => RenderRule::new(pattern, replacement, literal),
            RenderRuleShape::Pair(pattern, replacement) => {
                RenderRule::new(pattern, replacement, false)
            }
        }
    }
}

impl RenderRule {
    pub fn new(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        literal: bool,
    ) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(ConfigError::EmptyRenderPattern);
        }
        Ok(Self {
            pattern,
            replacement: replacement.into(),
            literal,
        })
    }

    /// Plain substring replacement.
    pub fn literal(from: impl Into<String>, to: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(from, to, true)
    }

    /// Regex substitution with backreferences.
    pub fn regex(pattern: impl Into<String>, replacement: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(pattern, replacement, false)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }
}

// ---------------------------------------------------------------------------
// Template source
// ---------------------------------------------------------------------------

/// Template flavour. Only Repo-as-Template exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Rat,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Rat => f.write_str("rat"),
        }
    }
}

/// Where the template comes from and which revision is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSource {
    #[serde(default)]
    pub kind: TemplateKind,
    /// `gh:org/repo`, `local:<path>` or a local directory path.
    pub repo: String,
    /// Tag, branch or commit-ish the repository is bound to.
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl TemplateSource {
    /// Build a source. A commit-shaped `reference` doubles as the commit.
    pub fn new(repo: impl Into<String>, reference: impl Into<String>, commit: Option<String>) -> Self {
        let reference = reference.into();
        let commit = commit.or_else(|| looks_like_commit(&reference).then(|| reference.clone()));
        Self {
            kind: TemplateKind::Rat,
            repo: repo.into(),
            reference,
            commit,
        }
    }

    /// Display version, `kind@ref`.
    pub fn version(&self) -> String {
        format!("{}@{}", self.kind, self.reference)
    }
}

/// A template reference already resolved to a local directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    /// Root of the template tree on disk (read-only).
    pub root: PathBuf,
    pub repo: String,
    pub reference: String,
    pub commit: Option<String>,
}

// ---------------------------------------------------------------------------
// Lock record
// ---------------------------------------------------------------------------

/// Persistent binding of a repository to a template source and its rules.
///
/// `version` is derived from the template source on every read and write;
/// any stored value is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LockRecordFile", into = "LockRecordFile")]
pub struct LockRecord {
    schema_version: String,
    template: TemplateSource,
    managed_rules: RuleSet,
    ignore_patterns: Vec<String>,
    render_rules: Vec<RenderRule>,
    applied_ref: String,
    applied_commit: Option<String>,
}

/// On-disk shape of [`LockRecord`].
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LockRecordFile {
    #[serde(default = "default_schema_version")]
    schema_version: String,
    template: TemplateSource,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    managed_rules: Vec<ManagedRule>,
    #[serde(default)]
    ignore_patterns: Vec<String>,
    #[serde(default)]
    render_rules: Vec<RenderRule>,
    #[serde(default)]
    applied_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    applied_commit: Option<String>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_owned()
}

impl TryFrom<LockRecordFile> for LockRecord {
    type Error = ConfigError;

    fn try_from(raw: LockRecordFile) -> Result<Self, Self::Error> {
        template_ref::classify_locator(&raw.template.repo)?;
        let template = TemplateSource::new(raw.template.repo, raw.template.reference, raw.template.commit);
        let applied_ref = raw.applied_ref.unwrap_or_else(|| template.reference.clone());
        let applied_commit = raw.applied_commit.or_else(|| template.commit.clone());
        Ok(LockRecord {
            schema_version: raw.schema_version,
            template,
            managed_rules: RuleSet::new(raw.managed_rules),
            ignore_patterns: normalize_ignore_patterns(raw.ignore_patterns),
            render_rules: raw.render_rules,
            applied_ref,
            applied_commit,
        })
    }
}

impl From<LockRecord> for LockRecordFile {
    fn from(record: LockRecord) -> Self {
        let version = Some(record.version());
        LockRecordFile {
            schema_version: record.schema_version,
            template: record.template,
            version,
            managed_rules: record.managed_rules.into(),
            ignore_patterns: record.ignore_patterns,
            render_rules: record.render_rules,
            applied_ref: Some(record.applied_ref),
            applied_commit: record.applied_commit,
        }
    }
}

impl LockRecord {
    /// Fresh record for a first adoption; applied ref/commit mirror the template.
    pub fn new(
        template: TemplateSource,
        managed_rules: RuleSet,
        ignore_patterns: Vec<String>,
        render_rules: Vec<RenderRule>,
    ) -> Self {
        let template = TemplateSource::new(template.repo, template.reference, template.commit);
        Self {
            schema_version: SCHEMA_VERSION.to_owned(),
            applied_ref: template.reference.clone(),
            applied_commit: template.commit.clone(),
            template,
            managed_rules,
            ignore_patterns: normalize_ignore_patterns(ignore_patterns),
            render_rules,
        }
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn template(&self) -> &TemplateSource {
        &self.template
    }

    /// `kind@ref`, always recomputed from the template source.
    pub fn version(&self) -> String {
        self.template.version()
    }

    pub fn managed_rules(&self) -> &RuleSet {
        &self.managed_rules
    }

    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    pub fn render_rules(&self) -> &[RenderRule] {
        &self.render_rules
    }

    pub fn applied_ref(&self) -> &str {
        &self.applied_ref
    }

    pub fn applied_commit(&self) -> Option<&str> {
        self.applied_commit.as_deref()
    }

    /// Record bound to `target` after a successful apply.
    ///
    /// Template repo, ref and commit move to the target and the applied
    /// ref/commit mirror them. Rules are carried over unchanged.
    pub fn advanced_to(&self, target: &ResolvedTemplate) -> LockRecord {
        let template = TemplateSource::new(
            target.repo.clone(),
            target.reference.clone(),
            target.commit.clone(),
        );
        LockRecord {
            schema_version: self.schema_version.clone(),
            applied_ref: template.reference.clone(),
            applied_commit: template.commit.clone(),
            template,
            managed_rules: self.managed_rules.clone(),
            ignore_patterns: self.ignore_patterns.clone(),
            render_rules: self.render_rules.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
