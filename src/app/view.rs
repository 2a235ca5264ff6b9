use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use log::debug;
use serde_json::Value;

use crate::{app::Settings, errors::GantryError};

/// Setting naming the directory templates are loaded from.
pub static VIEWS_SETTING: &str = "views";

/// Renders a named template with data into markup.
///
/// Installed on an [`App`](crate::app::App) with `App::engine`, and used by
/// `Response::render`.
pub trait ViewEngine: Send + Sync + 'static {
    fn render(&self, template: &str, data: &Value, settings: &Settings)
        -> Result<String, GantryError>;
}

/// Loads templates from disk and substitutes `{{ key }}` placeholders.
///
/// Templates are looked up in the directory named by the `views` setting
/// (`views` when unset); a template without an extension gets `.html`.
/// Keys may be dotted (`{{ user.name }}`) to reach into nested objects.
/// Substituted values are HTML-escaped and missing keys render empty.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use gantry::app::{App, FileViewEngine};
///
/// let app = App::new();
/// app.set("views", "./templates");
/// app.engine(Arc::new(FileViewEngine::default()));
/// ```
#[derive(Clone, Debug)]
pub struct FileViewEngine {
    extension: String,
}

impl Default for FileViewEngine {
    fn default() -> Self {
        Self { extension: "html".to_string() }
    }
}

impl FileViewEngine {
    pub fn with_extension(extension: &str) -> Self {
        Self {
            extension: extension
                .trim_start_matches('.')
                .to_string(),
        }
    }

    fn resolve(&self, template: &str, settings: &Settings) -> Result<PathBuf, GantryError> {
        let relative = Path::new(template);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(GantryError::Render(format!("Invalid template name: {}", template)));
        }

        let directory = settings
            .get(VIEWS_SETTING)
            .and_then(Value::as_str)
            .unwrap_or("views");

        let mut path = Path::new(directory).join(relative);
        if path
            .extension()
            .is_none()
        {
            path.set_extension(&self.extension);
        }
        Ok(path)
    }
}

impl ViewEngine for FileViewEngine {
    fn render(
        &self,
        template: &str,
        data: &Value,
        settings: &Settings,
    ) -> Result<String, GantryError> {
        let path = self.resolve(template, settings)?;
        debug!("Rendering template {}", path.display());

        let source = fs::read_to_string(&path).map_err(|e| {
            GantryError::Render(format!("Cannot read template {}: {}", path.display(), e))
        })?;

        Ok(substitute(&source, data))
    }
}

fn substitute(source: &str, data: &Value) -> String {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = after[..end].trim();
        let pointer = format!("/{}", key.replace('.', "/"));
        match data.pointer(&pointer) {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => escape_into(&mut output, text),
            Some(other) => escape_into(&mut output, &other.to_string()),
        }

        rest = &after[end + 2..];
    }

    output.push_str(rest);
    output
}

fn escape_into(output: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
}
