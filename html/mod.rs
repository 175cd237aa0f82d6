use crate::*;

use rust_embed::RustEmbed;
use tera::{Context, Tera};
use thiserror::Error;

/// Layout every page extends
pub const BASE_TEMPLATE: &str = "base.html";
/// Todo list page
pub const INDEX_TEMPLATE: &str = "index.html";

#[derive(RustEmbed)]
#[folder = "templates/"]
struct TemplateAssets;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template {0} is not bundled")]
    Missing(&'static str),
    #[error("template {0} is not valid UTF-8")]
    NotUtf8(&'static str),
    #[error(transparent)]
    Parse(#[from] tera::Error),
}

/// Context of [`INDEX_TEMPLATE`]
#[derive(Debug, Serialize)]
pub struct TemplateContext {
    pub todo_list: Vec<Todo>,
}

/// Parsed page templates
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Parses the bundled templates, failing on the first missing or malformed one
    pub fn load() -> std::result::Result<Self, TemplateError> {
        let mut sources = Vec::new();
        for name in [BASE_TEMPLATE, INDEX_TEMPLATE] {
            let file = TemplateAssets::get(name).ok_or(TemplateError::Missing(name))?;
            let source = String::from_utf8(file.data.into_owned())
                .map_err(|_| TemplateError::NotUtf8(name))?;
            sources.push((name, source));
        }
        Self::from_sources(sources)
    }

    pub fn from_sources<N, S>(
        sources: impl IntoIterator<Item = (N, S)>,
    ) -> std::result::Result<Self, TemplateError>
    where
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut tera = Tera::default();
        tera.add_raw_templates(sources)?;
        debug!("Loaded templates: {:?}", tera.get_template_names().collect::<Vec<_>>());
        Ok(Self { tera })
    }

    /// Renders `name` into a string so a failure never leaves a half-written response
    pub fn exec(&self, name: &str, ctx: &impl Serialize) -> Result<String> {
        let ctx = Context::from_serialize(ctx)?;
        Ok(self.tera.render(name, &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_templates_parse() {
        let templates = Templates::load().unwrap();
        let page = templates
            .exec(INDEX_TEMPLATE, &TemplateContext { todo_list: vec![] })
            .unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("Nothing to do"));
    }

    #[test]
    fn renders_todos_escaped() {
        let templates = Templates::load().unwrap();
        let mut todo = Todo::new("<script>alert(1)</script>");
        todo.id = 7;
        todo.toggle_done();
        let page = templates
            .exec(INDEX_TEMPLATE, &TemplateContext { todo_list: vec![todo] })
            .unwrap();
        assert!(page.contains(r#"class="todo done" data-id="7""#));
        assert!(page.contains(r#"action="/done/7""#));
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(!page.contains("Nothing to do"));
    }

    #[test]
    fn malformed_template_is_rejected() {
        let result = Templates::from_sources([
            (BASE_TEMPLATE, "<html>{% block content %}</html>"),
            (INDEX_TEMPLATE, r#"{% extends "base.html" %}"#),
        ]);
        assert!(matches!(result, Err(TemplateError::Parse(_))));
    }

    #[test]
    fn unknown_template_fails_to_render() {
        let templates = Templates::load().unwrap();
        let ctx = TemplateContext { todo_list: vec![] };
        assert!(matches!(
            templates.exec("missing.html", &ctx),
            Err(Error::Render(_))
        ));
    }
}
