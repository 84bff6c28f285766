//! Local rendering of message templates
//!
//! Vendors without server-side templates receive a fully rendered body.
//! Templates use `{name}` placeholders filled from the named arguments.

use std::collections::BTreeMap;

use otp_core::domain::entities::notification::NamedArg;
use otp_core::errors::NotifyError;

/// Message templates keyed by template id
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, String>,
}

impl TemplateRegistry {
    pub fn new(templates: BTreeMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn with_template(mut self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(id.into(), body.into());
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Render a template, failing on unknown ids or unfilled placeholders
    pub fn render(&self, template_id: &str, args: &[NamedArg]) -> Result<String, NotifyError> {
        let template = self.templates.get(template_id).ok_or_else(|| NotifyError::Template {
            message: format!("Unknown template: {}", template_id),
        })?;

        let mut rendered = template.clone();
        for arg in args {
            rendered = rendered.replace(&format!("{{{}}}", arg.name), &arg.value);
        }

        if let Some(name) = first_placeholder(&rendered) {
            return Err(NotifyError::Template {
                message: format!("Template {} is missing argument {}", template_id, name),
            });
        }
        Ok(rendered)
    }
}

fn first_placeholder(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let name = &after[..end];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Some(name);
        }
        rest = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::default().with_template(
            "1",
            "Your verification code is {code}. It expires in {expiry} minutes.",
        )
    }

    #[test]
    fn test_render_fills_placeholders() {
        let body = registry()
            .render(
                "1",
                &[NamedArg::new("code", "0042"), NamedArg::new("expiry", "10")],
            )
            .unwrap();
        assert_eq!(body, "Your verification code is 0042. It expires in 10 minutes.");
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let result = registry().render("2", &[]);
        assert!(matches!(result, Err(NotifyError::Template { .. })));
    }

    #[test]
    fn test_missing_argument_is_rejected() {
        let result = registry().render("1", &[NamedArg::new("code", "0042")]);
        match result {
            Err(NotifyError::Template { message }) => assert!(message.contains("expiry")),
            other => panic!("Expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_braces_are_kept() {
        let registry = TemplateRegistry::default().with_template("json", "{ \"code\": \"{code}\" }");
        let body = registry
            .render("json", &[NamedArg::new("code", "1234")])
            .unwrap();
        assert_eq!(body, "{ \"code\": \"1234\" }");
    }
}
