//! # ratsync-renderer
//!
//! Applies a lock record's render rules to template content before it is
//! compared against, or written into, a consumer repository.
//!
//! ## Usage
//!
//! ```rust
//! use ratsync_core::RenderRule;
//! use ratsync_renderer::Renderer;
//!
//! let rules = vec![RenderRule::literal("MyTemplate", "MyProject").unwrap()];
//! let renderer = Renderer::new(&rules).unwrap();
//! assert_eq!(renderer.render("MyTemplate CI"), "MyProject CI");
//! ```

pub mod engine;
pub mod error;

pub use engine::{expand_backrefs, Rendered, Renderer};
pub use error::RenderError;
