//! Markup include resolution for kiln pages.
//!
//! Pages pull shared fragments in with `@@include('header.html', {"title": "Home"})`
//! and fragments read their parameters back with `@@title`. This crate expands
//! those directives and strips HTML comments from the rendered result.

pub mod comments;
pub mod directive;
pub mod resolver;

pub use comments::strip_comments;
pub use directive::{find_directives, Directive, ParseError};
pub use resolver::{IncludeError, IncludeOptions, Resolver};
