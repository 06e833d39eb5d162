//! Path rule resolution: pattern matching, rule precedence and ignores.
//!
//! Patterns are posix globs over the whole relative path. `*` crosses `/`
//! (fnmatch semantics, not gitignore). A pattern ending in `/**` names a
//! directory: it matches the directory path itself and everything below it.

use globset::{GlobBuilder, GlobMatcher};

use ratsync_core::types::normalize_path;
use ratsync_core::{ConfigError, LockRecord, ManagedRule};

// ---------------------------------------------------------------------------
// PathPattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum PatternKind {
    /// `dir/**`: the directory and its descendants.
    Directory(String),
    Glob(GlobMatcher),
}

/// A compiled rule path or ignore pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    kind: PatternKind,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let raw = normalize_path(pattern);
        let kind = match raw.strip_suffix("/**") {
            Some(dir) => PatternKind::Directory(dir.to_owned()),
            None => {
                let glob = GlobBuilder::new(&raw)
                    .literal_separator(false)
                    .backslash_escape(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidGlob {
                        pattern: raw.clone(),
                        reason: e.kind().to_string(),
                    })?;
                PatternKind::Glob(glob.compile_matcher())
            }
        };
        Ok(Self { raw, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match &self.kind {
            PatternKind::Directory(dir) => {
                path == *dir
                    || path
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            PatternKind::Glob(glob) => path == self.raw || glob.is_match(&path),
        }
    }

    /// Precedence class: lower is more specific. Every glob other than a
    /// `/**` directory shares one class.
    fn rank(&self, path: &str) -> u8 {
        if self.raw == normalize_path(path) {
            0
        } else if matches!(self.kind, PatternKind::Directory(_)) {
            1
        } else {
            2
        }
    }
}

/// True when `path` matches `pattern`. An invalid pattern matches nothing.
pub fn matches(path: &str, pattern: &str) -> bool {
    PathPattern::new(pattern).is_ok_and(|p| p.is_match(path))
}

/// Most specific rule matching `path`.
///
/// Exact paths beat `/**` directory globs, which beat other wildcards; within
/// a class the longer pattern wins and the first declared rule breaks ties.
pub fn best_rule<'a>(path: &str, rules: &'a [ManagedRule]) -> Option<&'a ManagedRule> {
    let compiled: Vec<(PathPattern, &ManagedRule)> = rules
        .iter()
        .filter_map(|r| PathPattern::new(r.path()).ok().map(|p| (p, r)))
        .collect();
    pick_best(path, compiled.iter().map(|(p, r)| (p, *r)))
}

fn pick_best<'a, 'p, I>(path: &str, candidates: I) -> Option<&'a ManagedRule>
where
    I: Iterator<Item = (&'p PathPattern, &'a ManagedRule)>,
{
    candidates
        .filter(|(pattern, _)| pattern.is_match(path))
        .enumerate()
        .min_by_key(|(order, (pattern, _))| {
            (pattern.rank(path), std::cmp::Reverse(pattern.as_str().len()), *order)
        })
        .map(|(_, (_, rule))| rule)
}

/// True when any ignore pattern matches `path`.
pub fn is_ignored<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| matches(path, p.as_ref()))
}

// ---------------------------------------------------------------------------
// RuleMatcher
// ---------------------------------------------------------------------------

/// Managed rules and ignore patterns of one lock record, compiled once per
/// plan pass.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<(PathPattern, ManagedRule)>,
    ignores: Vec<PathPattern>,
}

impl RuleMatcher {
    pub fn compile(lock: &LockRecord) -> Result<Self, ConfigError> {
        Self::new(lock.managed_rules().as_slice(), lock.ignore_patterns())
    }

    pub fn new<S: AsRef<str>>(rules: &[ManagedRule], ignores: &[S]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|r| Ok((PathPattern::new(r.path())?, r.clone())))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let ignores = ignores
            .iter()
            .map(|p| PathPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, ignores })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignores.iter().any(|p| p.is_match(path))
    }

    pub fn best_rule(&self, path: &str) -> Option<&ManagedRule> {
        pick_best(path, self.rules.iter().map(|(p, r)| (p, r)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ratsync_core::Strategy;

    fn rule(path: &str, strategy: Strategy) -> ManagedRule {
        ManagedRule::new(path, strategy).unwrap()
    }

    #[test]
    fn exact_and_wildcard_matching() {
        assert!(matches("README.md", "README.md"));
        assert!(matches("src/deep/mod.py", "*.py"));
        assert!(matches("a/b/c.txt", "a/*/c.txt"));
        assert!(matches("file1.txt", "file?.txt"));
        assert!(!matches("README.md", "*.py"));
    }

    #[test]
    fn directory_glob_matches_dir_and_descendants() {
        assert!(matches("src", "src/**"));
        assert!(matches("src/lib.rs", "src/**"));
        assert!(matches("src/a/b/c.rs", "src/**"));
        assert!(!matches("srcs/lib.rs", "src/**"));
        assert!(!matches("other/src/lib.rs", "src/**"));
    }

    #[test]
    fn invalid_glob_is_a_configuration_error() {
        let err = PathPattern::new("src/[").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
        assert!(!matches("src/[", "src/["), "invalid pattern matches nothing");
    }

    #[test]
    fn exact_rule_beats_glob_in_either_order() {
        let a = [rule("src/**", Strategy::Enforce), rule("src/main.py", Strategy::Preserve)];
        let b = [rule("src/main.py", Strategy::Preserve), rule("src/**", Strategy::Enforce)];
        for rules in [&a[..], &b[..]] {
            let best = best_rule("src/main.py", rules).unwrap();
            assert_eq!(best.path(), "src/main.py");
        }
    }

    #[test]
    fn dir_glob_beats_wildcard_and_longer_wins() {
        let rules = [
            rule("*.py", Strategy::Merge),
            rule("src/**", Strategy::Enforce),
            rule("src/app/**", Strategy::Preserve),
        ];
        assert_eq!(best_rule("src/app/x.py", &rules).unwrap().path(), "src/app/**");
        assert_eq!(best_rule("src/x.py", &rules).unwrap().path(), "src/**");
        assert_eq!(best_rule("tools/x.py", &rules).unwrap().path(), "*.py");
        assert!(best_rule("docs/x.md", &rules).is_none());

        let wildcards = [
            rule("*.txt", Strategy::Enforce),
            rule("file?.txt", Strategy::Merge),
            rule("f[a-z]le[0-9].txt", Strategy::Preserve),
        ];
        assert_eq!(best_rule("file1.txt", &wildcards).unwrap().path(), "f[a-z]le[0-9].txt");
        assert_eq!(best_rule("fileX.txt", &wildcards).unwrap().path(), "file?.txt");
        assert_eq!(best_rule("other.txt", &wildcards).unwrap().path(), "*.txt");
    }

    #[test]
    fn equal_rank_and_length_goes_to_first_declared() {
        let rules = [rule("a*.txt", Strategy::Merge), rule("*b.txt", Strategy::Enforce)];
        assert_eq!(best_rule("ab.txt", &rules).unwrap().strategy(), Strategy::Merge);
    }

    #[test]
    fn rule_matcher_ignores_and_precedence() {
        let rules = [rule("docs/**", Strategy::Enforce), rule("*.md", Strategy::Merge)];
        let m = RuleMatcher::new(&rules, &["docs/internal/**", "*.log"]).unwrap();
        assert!(m.is_ignored("docs/internal/notes.md"));
        assert!(m.is_ignored("build/out.log"));
        assert!(!m.is_ignored("docs/guide.md"));
        assert_eq!(m.best_rule("docs/guide.md").unwrap().path(), "docs/**");
    }

    #[test]
    fn rule_matcher_rejects_bad_ignore_pattern() {
        assert!(RuleMatcher::new(&[], &["[unclosed"]).is_err());
    }
}
