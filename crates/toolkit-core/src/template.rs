//! Command templating.
//!
//! Templates use `{{.Field}}` placeholders (spaces inside the braces are
//! allowed). Rendering is a single substitution pass with no control flow;
//! see [`ProjectInfo::variable`] for the field names.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::project::ProjectInfo;

/// Errors from rendering a template.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    /// The template names a field that does not exist.
    #[error("unknown template variable `{name}` in `{template}`")]
    UnknownVariable {
        /// The unknown field name.
        name: String,
        /// The template being rendered.
        template: String,
    },

    /// The template contains `{{` that is not a valid placeholder.
    #[error("malformed placeholder in `{template}`")]
    Malformed {
        /// The template being rendered.
        template: String,
    },
}

/// Result alias for template rendering.
pub type TemplateResult<T> = Result<T, TemplateError>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.(\w+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Render `template` against `info`.
///
/// Either every placeholder is replaced or an error is returned; there is
/// no partial output.
pub fn render(template: &str, info: &ProjectInfo) -> TemplateResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = &caps[1];
        let value = info
            .variable(name)
            .ok_or_else(|| TemplateError::UnknownVariable {
                name: name.to_string(),
                template: template.to_string(),
            })?;

        check_literal(&template[last..whole.start], template)?;
        out.push_str(&template[last..whole.start]);
        out.push_str(&value);
        last = whole.end;
    }

    check_literal(&template[last..], template)?;
    out.push_str(&template[last..]);
    Ok(out)
}

/// Render every template in order, stopping at the first failure.
pub fn render_all(templates: &[String], info: &ProjectInfo) -> TemplateResult<Vec<String>> {
    templates.iter().map(|t| render(t, info)).collect()
}

fn check_literal(segment: &str, template: &str) -> TemplateResult<()> {
    if segment.contains("{{") {
        return Err(TemplateError::Malformed {
            template: template.to_string(),
        });
    }
    Ok(())
}
