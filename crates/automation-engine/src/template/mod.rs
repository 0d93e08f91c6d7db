//! Template rendering for email content, webhook payloads and conditions.
//!
//! Uses minijinja for Jinja2-compatible template syntax.

mod renderer;

pub use renderer::{contains_template_syntax, TemplateContext, TemplateRenderer};
