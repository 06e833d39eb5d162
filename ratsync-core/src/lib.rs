//! ratsync core library: lock record types, template references, errors.
//!
//! - [`types`]: strategies, rules, render rules, template source, lock record
//! - [`template_ref`]: the `rat:<locator>@<ref>` grammar
//! - [`lockfile`]: load / save the lock record
//! - [`error`]: [`ConfigError`], [`LockError`]

pub mod error;
pub mod lockfile;
pub mod template_ref;
pub mod types;

pub use error::{ConfigError, LockError};
pub use template_ref::{Locator, TemplateRef};
pub use types::{
    LockRecord, ManagedRule, RenderRule, ResolvedTemplate, RuleSet, Strategy, TemplateKind,
    TemplateSource,
};
