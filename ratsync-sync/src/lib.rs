//! # ratsync-sync
//!
//! The reconciliation engine: keeps a consumer repository in step with a
//! template tree under per-path ownership rules.
//!
//! - [`compute_plan`] classifies every file (create, overwrite, edit, delete,
//!   keep, orphan) without touching the disk.
//! - [`apply_plan`] carries a plan out with atomic writes, protected-block
//!   enforcement and line-level merges, then advances the lock record.
//! - [`adopt`] binds a repository to a template for the first time.

pub mod adopt;
pub mod apply;
pub mod baseline;
pub mod blocks;
pub mod diff;
pub mod drift;
pub mod error;
pub mod matcher;
pub mod merge;
pub mod plan;
pub mod source;
pub mod tree;

pub use adopt::{adopt, create_adoption_record};
pub use apply::{apply_plan, ApplyOutcome, ApplyResult, ApplyWarning};
pub use blocks::{enforce_ours_blocks, find_blocks, BlockReport, BlockSpan};
pub use diff::{diff_plan, FileDiff};
pub use drift::{detect_drift, DriftReport};
pub use error::SyncError;
pub use matcher::{best_rule, is_ignored, matches, PathPattern, RuleMatcher};
pub use merge::{merge, merge3, MergeOutcome};
pub use plan::{build_plan, compute_plan, Action, Plan, PlanItem};
pub use source::{resolve_source, resolve_template};
pub use tree::FileTree;
