//! Render rule engine: [`Renderer`] and [`Rendered`].
//!
//! Rules are compiled once, when a plan or apply pass starts, and applied in
//! declared order. A literal rule is a plain substring replacement; any other
//! rule is a regex substitution.
//!
//! # Replacement syntax
//!
//! | Form          | Meaning                          |
//! |---------------|----------------------------------|
//! | `$1`, `${1}`  | numbered group                   |
//! | `${name}`     | named group                      |
//! | `\1`          | numbered group (rewritten `${1}`)|
//! | `\g<name>`    | named group (rewritten `${name}`)|
//! | `\\`          | a literal backslash              |

use regex::Regex;

use ratsync_core::RenderRule;

use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Compiled rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum CompiledRule {
    Literal { from: String, to: String },
    Regex { regex: Regex, replacement: String },
}

impl CompiledRule {
    fn compile(rule: &RenderRule) -> Result<Self, RenderError> {
        if rule.is_literal() {
            return Ok(CompiledRule::Literal {
                from: rule.pattern().to_owned(),
                to: rule.replacement().to_owned(),
            });
        }
        let regex = Regex::new(rule.pattern()).map_err(|source| RenderError::InvalidRegex {
            pattern: rule.pattern().to_owned(),
            source,
        })?;
        Ok(CompiledRule::Regex {
            regex,
            replacement: expand_backrefs(rule.replacement()),
        })
    }

    fn apply(&self, text: &str) -> String {
        match self {
            CompiledRule::Literal { from, to } => text.replace(from.as_str(), to),
            CompiledRule::Regex { regex, replacement } => {
                regex.replace_all(text, replacement.as_str()).into_owned()
            }
        }
    }
}

/// Rewrite `\1` and `\g<name>` backreferences into regex-crate `${..}` form.
pub fn expand_backrefs(replacement: &str) -> String {
    let chars: Vec<char> = replacement.chars().collect();
    let mut out = String::with_capacity(replacement.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 == chars.len() {
            out.push(c);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        if next.is_ascii_digit() {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].is_ascii_digit() {
                end += 1;
            }
            let digits: String = chars[start..end].iter().collect();
            out.push_str(&format!("${{{digits}}}"));
            i = end;
        } else if next == 'g' && chars.get(i + 2) == Some(&'<') {
            match chars[i + 3..].iter().position(|&c| c == '>') {
                Some(len) => {
                    let name: String = chars[i + 3..i + 3 + len].iter().collect();
                    out.push_str(&format!("${{{name}}}"));
                    i += 4 + len;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            }
        } else if next == '\\' {
            out.push('\\');
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Rendered template content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// UTF-8 content with every render rule applied.
    Text(String),
    /// Undecodable content, passed through byte-for-byte.
    Binary(Vec<u8>),
}

impl Rendered {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendered::Text(text) => Some(text),
            Rendered::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Rendered::Text(text) => text.as_bytes(),
            Rendered::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Rendered::Text(text) => text.into_bytes(),
            Rendered::Binary(bytes) => bytes,
        }
    }
}

/// Ordered, compiled render rules.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    rules: Vec<CompiledRule>,
}

impl Renderer {
    /// Compile `rules`; the first invalid regex aborts compilation.
    pub fn new(rules: &[RenderRule]) -> Result<Self, RenderError> {
        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule, in declared order, to `text`.
    pub fn render(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_owned(), |acc, rule| rule.apply(&acc))
    }

    /// Render raw file content; non-UTF-8 content is returned untouched.
    pub fn render_bytes(&self, bytes: Vec<u8>) -> Rendered {
        match String::from_utf8(bytes) {
            Ok(text) => Rendered::Text(self.render(&text)),
            Err(err) => Rendered::Binary(err.into_bytes()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
