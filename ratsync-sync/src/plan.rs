//! Plan builder: classifies every file of the repository and template trees
//! under the lock record's rules.
//!
//! Building a plan never writes anything and never mutates the lock record;
//! calling it twice over unchanged trees yields the same plan.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use ratsync_core::{LockRecord, Strategy};
use ratsync_renderer::{Rendered, Renderer};

use crate::apply::ORPHAN_SUFFIX;
use crate::baseline::{self, Baseline};
use crate::error::SyncError;
use crate::matcher::RuleMatcher;
use crate::tree::FileTree;

/// What apply does to one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Overwrite,
    Edit,
    Delete,
    Keep,
    Orphan,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Overwrite => "overwrite",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Keep => "keep",
            Action::Orphan => "orphan",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub path: String,
    pub strategy: Strategy,
    pub action: Action,
    pub had_conflict: bool,
    pub binary: bool,
    /// Path pattern of the rule that governs this file.
    pub matched_rule: String,
}

/// Ordered plan for one upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Sorted by path.
    pub items: Vec<PlanItem>,
    pub conflict_count: usize,
}

impl Plan {
    /// Items that change something on apply.
    pub fn changes(&self) -> impl Iterator<Item = &PlanItem> {
        self.items.iter().filter(|i| i.action != Action::Keep)
    }

    pub fn count(&self, action: Action) -> usize {
        self.items.iter().filter(|i| i.action == action).count()
    }

    pub fn get(&self, path: &str) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.path == path)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

struct Classified {
    action: Action,
    had_conflict: bool,
    binary: bool,
}

impl Classified {
    fn plain(action: Action) -> Self {
        Self {
            action,
            had_conflict: false,
            binary: false,
        }
    }

    fn conflicted(action: Action, binary: bool) -> Self {
        Self {
            action,
            had_conflict: true,
            binary,
        }
    }
}

fn classify(
    path: &str,
    strategy: Strategy,
    repo: &FileTree,
    template: &FileTree,
    baseline: &Baseline,
    renderer: &Renderer,
) -> Result<Option<Classified>, SyncError> {
    let in_template = template.contains(path);
    let in_repo = repo.contains(path);

    let classified = match (strategy, in_template, in_repo) {
        (_, false, false) => None,
        (_, true, false) => Some(Classified::plain(Action::Create)),

        (Strategy::Preserve, _, true) => Some(Classified::plain(Action::Keep)),

        (Strategy::Enforce, true, true) => Some(Classified::plain(Action::Overwrite)),
        (Strategy::Enforce, false, true) => Some(Classified::plain(Action::Delete)),

        (Strategy::Merge, false, true) => {
            let local = repo.read_bytes(path)?;
            let unmodified = baseline
                .get(path)
                .is_some_and(|snapshot| snapshot.as_bytes() == local.as_slice());
            if unmodified {
                Some(Classified::plain(Action::Delete))
            } else {
                Some(Classified::conflicted(Action::Orphan, false))
            }
        }
        (Strategy::Merge, true, true) => {
            let rendered = renderer.render_bytes(template.read_bytes(path)?);
            let local = repo.read_bytes(path)?;
            if rendered.as_bytes() == local.as_slice() {
                Some(Classified::plain(Action::Keep))
            } else {
                let binary =
                    matches!(rendered, Rendered::Binary(_)) || std::str::from_utf8(&local).is_err();
                Some(Classified::conflicted(Action::Edit, binary))
            }
        }
    };
    Ok(classified)
}

/// Build the plan for `repo` against `template`.
///
/// Ignored paths, paths matched by no rule and `*.orphaned` files left by
/// earlier runs never appear in the plan.
pub fn build_plan(
    lock: &LockRecord,
    repo: &FileTree,
    template: &FileTree,
    baseline: &Baseline,
) -> Result<Plan, SyncError> {
    let matcher = RuleMatcher::compile(lock)?;
    let renderer = Renderer::new(lock.render_rules())?;

    let all: BTreeSet<&String> = repo.paths().iter().chain(template.paths()).collect();
    let mut plan = Plan::default();

    for path in all {
        if matcher.is_ignored(path) {
            tracing::debug!("ignored: {path}");
            continue;
        }
        if path.ends_with(ORPHAN_SUFFIX) && !template.contains(path) {
            tracing::debug!("earlier orphan: {path}");
            continue;
        }
        let Some(rule) = matcher.best_rule(path) else {
            tracing::debug!("unmanaged: {path}");
            continue;
        };
        let strategy = rule.strategy();
        let Some(c) = classify(path, strategy, repo, template, baseline, &renderer)? else {
            continue;
        };
        tracing::debug!("{path}: {} via {} ({strategy})", c.action, rule.path());
        if c.had_conflict {
            plan.conflict_count += 1;
        }
        plan.items.push(PlanItem {
            path: path.clone(),
            strategy,
            action: c.action,
            had_conflict: c.had_conflict,
            binary: c.binary,
            matched_rule: rule.path().to_owned(),
        });
    }
    Ok(plan)
}

/// Scan both trees, load the baseline and build the plan.
pub fn compute_plan(
    lock: &LockRecord,
    repo_root: &Path,
    template_root: &Path,
) -> Result<Plan, SyncError> {
    let repo = FileTree::scan(repo_root)?;
    let template = FileTree::scan(template_root)?;
    let baseline = baseline::load_at(repo_root)?;
    build_plan(lock, &repo, &template, &baseline)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ratsync_core::{ManagedRule, RenderRule, RuleSet, TemplateSource};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        repo: std::path::PathBuf,
        template: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let repo = tmp.path().join("repo");
            let template = tmp.path().join("template");
            fs::create_dir_all(&repo).unwrap();
            fs::create_dir_all(&template).unwrap();
            Self {
                _tmp: tmp,
                repo,
                template,
            }
        }

        fn repo_file(&self, rel: &str, content: &str) -> &Self {
            write(&self.repo, rel, content);
            self
        }

        fn template_file(&self, rel: &str, content: &str) -> &Self {
            write(&self.template, rel, content);
            self
        }

        fn plan(&self, lock: &LockRecord) -> Plan {
            compute_plan(lock, &self.repo, &self.template).unwrap()
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn lock(rules: &[(&str, Strategy)], ignores: &[&str], render: Vec<RenderRule>) -> LockRecord {
        let rules = rules
            .iter()
            .map(|(p, s)| ManagedRule::new(p, *s).unwrap())
            .collect::<Vec<_>>();
        LockRecord::new(
            TemplateSource::new("./template", "v1", None),
            RuleSet::new(rules),
            ignores.iter().map(|s| s.to_string()).collect(),
            render,
        )
    }

    #[test]
    fn template_only_file_is_created() {
        let fx = Fixture::new();
        fx.template_file("README.md", "# Template\n");
        let plan = fx.plan(&lock(&[("README.md", Strategy::Enforce)], &[], vec![]));
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].action, Action::Create);
        assert_eq!(plan.items[0].matched_rule, "README.md");
        assert_eq!(plan.conflict_count, 0);
    }

    #[test]
    fn enforce_overwrites_and_deletes() {
        let fx = Fixture::new();
        fx.template_file("ci.yml", "v2\n")
            .repo_file("ci.yml", "v1\n")
            .repo_file("old.yml", "stale\n");
        let plan = fx.plan(&lock(&[("*.yml", Strategy::Enforce)], &[], vec![]));
        assert_eq!(plan.get("ci.yml").unwrap().action, Action::Overwrite);
        assert_eq!(plan.get("old.yml").unwrap().action, Action::Delete);
    }

    #[test]
    fn preserve_keeps_existing_and_creates_missing() {
        let fx = Fixture::new();
        fx.template_file("a.cfg", "tpl\n")
            .template_file("b.cfg", "tpl\n")
            .repo_file("a.cfg", "local\n");
        let plan = fx.plan(&lock(&[("*.cfg", Strategy::Preserve)], &[], vec![]));
        assert_eq!(plan.get("a.cfg").unwrap().action, Action::Keep);
        assert_eq!(plan.get("b.cfg").unwrap().action, Action::Create);
    }

    #[test]
    fn merge_identical_after_render_is_keep() {
        let fx = Fixture::new();
        fx.template_file("README.md", "# MyTemplate\n")
            .repo_file("README.md", "# MyProject\n");
        let render = vec![RenderRule::literal("MyTemplate", "MyProject").unwrap()];
        let plan = fx.plan(&lock(&[("README.md", Strategy::Merge)], &[], render));
        assert_eq!(plan.get("README.md").unwrap().action, Action::Keep);
        assert_eq!(plan.conflict_count, 0);
    }

    #[test]
    fn merge_difference_is_a_conflicted_edit() {
        let fx = Fixture::new();
        fx.template_file("README.md", "template\n")
            .repo_file("README.md", "local\n");
        let plan = fx.plan(&lock(&[("README.md", Strategy::Merge)], &[], vec![]));
        let item = plan.get("README.md").unwrap();
        assert_eq!(item.action, Action::Edit);
        assert!(item.had_conflict);
        assert!(!item.binary);
        assert_eq!(plan.conflict_count, 1);
    }

    #[test]
    fn merge_binary_difference_is_flagged() {
        let fx = Fixture::new();
        fs::write(fx.template.join("logo.bin"), [0xffu8, 0x00, 0x01]).unwrap();
        fs::write(fx.repo.join("logo.bin"), [0xffu8, 0x00, 0x02]).unwrap();
        let plan = fx.plan(&lock(&[("logo.bin", Strategy::Merge)], &[], vec![]));
        let item = plan.get("logo.bin").unwrap();
        assert_eq!(item.action, Action::Edit);
        assert!(item.binary);
    }

    #[test]
    fn merge_repo_only_without_baseline_is_orphan() {
        let fx = Fixture::new();
        fx.repo_file("notes.md", "local\n");
        let plan = fx.plan(&lock(&[("*.md", Strategy::Merge)], &[], vec![]));
        let item = plan.get("notes.md").unwrap();
        assert_eq!(item.action, Action::Orphan);
        assert_eq!(plan.conflict_count, 1);
    }

    #[test]
    fn merge_repo_only_matching_baseline_is_delete() {
        let fx = Fixture::new();
        fx.repo_file("notes.md", "as applied\n");
        let mut snapshot = Baseline::default();
        snapshot.record("notes.md", "as applied\n");
        baseline::save_at(&fx.repo, &snapshot).unwrap();

        let plan = fx.plan(&lock(&[("*.md", Strategy::Merge)], &[], vec![]));
        assert_eq!(plan.get("notes.md").unwrap().action, Action::Delete);
        assert_eq!(plan.conflict_count, 0);
    }

    #[test]
    fn ignored_and_unmanaged_paths_are_skipped() {
        let fx = Fixture::new();
        fx.template_file("docs/guide.md", "g\n")
            .template_file("docs/internal/x.md", "x\n")
            .template_file("other.txt", "o\n");
        let plan = fx.plan(&lock(&[("docs/**", Strategy::Enforce)], &["docs/internal/**"], vec![]));
        let paths: Vec<&str> = plan.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/guide.md"]);
    }

    #[test]
    fn bookkeeping_files_never_planned() {
        let fx = Fixture::new();
        fx.repo_file(".ratsync.lock", "x").repo_file("a.txt", "a\n");
        fx.template_file("a.txt", "a\n");
        let plan = fx.plan(&lock(&[("*", Strategy::Enforce)], &[], vec![]));
        assert!(plan.get(".ratsync.lock").is_none());
        assert_eq!(plan.items.len(), 1);
    }

    #[test]
    fn plan_is_sorted_and_idempotent() {
        let fx = Fixture::new();
        fx.template_file("b.txt", "b\n")
            .template_file("a.txt", "a\n")
            .repo_file("c.txt", "c\n");
        let l = lock(&[("*.txt", Strategy::Enforce)], &[], vec![]);
        let first = fx.plan(&l);
        let paths: Vec<&str> = first.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(first, fx.plan(&l));
    }
}
