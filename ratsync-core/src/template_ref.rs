//! Template reference grammar: `rat:<locator>@<ref>`.
//!
//! The locator is either a remote repository (`gh:org/repo`,
//! `github:org/repo`) or a local directory (`local:<path>`, or a path
//! starting with `/`, `./`, `../`, or a dotted directory containing `/`).
//! The last `@` separates the locator from the ref.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::types::TemplateSource;

pub const RAT_PREFIX: &str = "rat:";

/// Classified repository locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Remote repository, e.g. `gh:acme/service-template`.
    Remote(String),
    /// Directory on the local filesystem.
    Local(PathBuf),
}

/// Classify a locator string, rejecting anything unrecognised.
pub fn classify_locator(repo: &str) -> Result<Locator, ConfigError> {
    let malformed = || ConfigError::MalformedLocator(repo.to_owned());

    for scheme in ["gh:", "github:"] {
        if let Some(rest) = repo.strip_prefix(scheme) {
            if rest.is_empty() || !rest.contains('/') {
                return Err(malformed());
            }
            return Ok(Locator::Remote(repo.to_owned()));
        }
    }
    if let Some(rest) = repo.strip_prefix("local:") {
        if rest.is_empty() {
            return Err(malformed());
        }
        return Ok(Locator::Local(PathBuf::from(rest)));
    }
    let is_path = repo.starts_with('/')
        || repo.starts_with("./")
        || repo.starts_with("../")
        || (repo.starts_with('.') && repo.contains('/'));
    if is_path {
        Ok(Locator::Local(PathBuf::from(repo)))
    } else {
        Err(malformed())
    }
}

/// Parsed `rat:<locator>@<ref>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub locator: String,
    pub reference: String,
}

impl TemplateRef {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedReference {
            reference: input.to_owned(),
            reason: reason.to_owned(),
        };

        let body = input
            .trim()
            .strip_prefix(RAT_PREFIX)
            .ok_or_else(|| malformed("only Repo-as-Template references ('rat:...') are supported"))?;
        let (locator, reference) = body
            .rsplit_once('@')
            .ok_or_else(|| malformed("missing '@<ref>' suffix"))?;
        if locator.is_empty() {
            return Err(malformed("empty repository locator"));
        }
        if reference.is_empty() {
            return Err(malformed("empty ref after '@'"));
        }
        classify_locator(locator)?;

        Ok(Self {
            locator: locator.to_owned(),
            reference: reference.to_owned(),
        })
    }

    pub fn locator_kind(&self) -> Locator {
        // Validated in `parse`.
        classify_locator(&self.locator).unwrap_or_else(|_| Locator::Remote(self.locator.clone()))
    }

    /// Unresolved template source (no commit unless the ref is one).
    pub fn to_source(&self) -> TemplateSource {
        TemplateSource::new(self.locator.clone(), self.reference.clone(), None)
    }
}

impl FromStr for TemplateRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateRef::parse(s)
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{RAT_PREFIX}{}@{}", self.locator, self.reference)
    }
}
