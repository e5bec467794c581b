//! Parameterized scope templates
//!
//! A role's scopes may contain the placeholder `<..>`, replaced by the suffix
//! captured when a parameterized role is activated.

use std::fmt;

/// Capture placeholder marker
pub const PLACEHOLDER: &str = "<..>";

/// Substitutes a captured value into a scope template
///
/// Exact captures replace every `<..>`. An open capture is only a known prefix
/// of the real value, so the result keeps the template up to the first `<..>`,
/// appends the capture and a trailing `*`, and drops the rest of the template.
///
/// # Examples
///
/// ```
/// use scopegate_authz::scope::substitute;
///
/// assert_eq!(substitute("ABC<..>DEF<..>GHI", "/", false), "ABC/DEF/GHI");
/// assert_eq!(substitute("ABC<..>DEF<..>GHI", "/", true), "ABC/*");
/// assert_eq!(substitute("plain", "/", true), "plain");
/// ```
pub fn substitute(template: &str, capture: &str, open: bool) -> String {
    match template.find(PLACEHOLDER) {
        None => template.to_string(),
        Some(idx) if open => {
            let mut scope = String::with_capacity(idx + capture.len() + 1);
            scope.push_str(&template[..idx]);
            scope.push_str(capture);
            scope.push('*');
            scope
        }
        Some(_) => template.replace(PLACEHOLDER, capture),
    }
}

/// A scope template split around its placeholders
///
/// `parts` always holds one more element than there are placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<String>,
}

impl Template {
    /// Splits a template string at every `<..>`
    pub fn parse(template: &str) -> Self {
        Self {
            source: template.to_string(),
            parts: template.split(PLACEHOLDER).map(str::to_string).collect(),
        }
    }

    /// Returns whether the template contains at least one placeholder
    pub fn has_placeholder(&self) -> bool {
        self.parts.len() > 1
    }

    /// Literal text before the first placeholder
    pub fn literal_prefix(&self) -> &str {
        &self.parts[0]
    }

    /// Returns the original template string
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the template for a capture; same contract as [`substitute`]
    pub fn render(&self, capture: &str, open: bool) -> String {
        if !self.has_placeholder() {
            return self.source.clone();
        }

        if open {
            let prefix = self.literal_prefix();
            let mut scope = String::with_capacity(prefix.len() + capture.len() + 1);
            scope.push_str(prefix);
            scope.push_str(capture);
            scope.push('*');
            return scope;
        }

        self.parts.join(capture)
    }

    /// Checks placeholder syntax
    ///
    /// Once every `<..>` is removed, no partial marker (`<..` or `..>`) may be
    /// left over.
    pub fn check_syntax(template: &str) -> Result<(), &'static str> {
        let stripped = template.replace(PLACEHOLDER, "");
        if stripped.contains("<..") || stripped.contains("..>") {
            return Err("unbalanced placeholder marker");
        }
        Ok(())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
