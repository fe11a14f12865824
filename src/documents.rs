//! # Documents Module
//!
//! Fills a document template with the four fields collected by the document
//! filler and writes the result to a uniquely named temporary file that is
//! removed as soon as the [`RenderedDocument`] is dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::errors::DocumentError;

/// Label of the only template offered in the documents section
pub const APPLICATION_TEMPLATE_LABEL: &str = "Шаблон заявления";
/// File name of that template inside the templates directory
pub const APPLICATION_TEMPLATE_FILE: &str = "заявление.txt";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .expect("Placeholder pattern should be valid");
}

/// The values collected from the user, in collection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub fio: String,
    pub age: String,
    pub phone: String,
    pub email: String,
}

impl DocumentFields {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "fio" => Some(&self.fio),
            "age" => Some(&self.age),
            "phone" => Some(&self.phone),
            "email" => Some(&self.email),
            _ => None,
        }
    }
}

/// Substitute `{{ name }}` placeholders; unknown names are an error
pub fn fill_template(
    template_name: &str,
    template: &str,
    fields: &DocumentFields,
) -> Result<String, DocumentError> {
    if let Some(unknown) = PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|name| fields.lookup(name).is_none())
    {
        return Err(DocumentError::UnknownPlaceholder {
            template: template_name.to_string(),
            name: unknown,
        });
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        fields.lookup(&caps[1]).unwrap_or_default().to_string()
    });
    Ok(rendered.into_owned())
}

/// A rendered document on disk; the file is deleted on drop
#[derive(Debug)]
pub struct RenderedDocument {
    file: NamedTempFile,
}

impl RenderedDocument {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Delete the file now, reporting failures that drop would swallow
    pub fn remove(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Renders templates from `templates_dir` into `output_dir`
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    templates_dir: PathBuf,
    output_dir: PathBuf,
}

impl DocumentRenderer {
    pub fn new(templates_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Render `template_file` with `fields` into a fresh uniquely named file
    pub fn render(
        &self,
        template_file: &str,
        fields: &DocumentFields,
    ) -> Result<RenderedDocument, DocumentError> {
        let template_path = self.templates_dir.join(template_file);
        let template = std::fs::read_to_string(&template_path).map_err(|source| {
            DocumentError::TemplateUnavailable {
                path: template_path.display().to_string(),
                source,
            }
        })?;
        let content = fill_template(template_file, &template, fields)?;

        let stem = Path::new(template_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let suffix = Path::new(template_file)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let output_error = |source: std::io::Error| DocumentError::Output {
            dir: self.output_dir.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.output_dir).map_err(output_error)?;
        // Created with O_EXCL, so concurrent renders never share a name
        let mut file = Builder::new()
            .prefix(&format!("{stem}_"))
            .suffix(&suffix)
            .rand_bytes(12)
            .tempfile_in(&self.output_dir)
            .map_err(output_error)?;
        file.write_all(content.as_bytes()).map_err(output_error)?;
        file.flush().map_err(output_error)?;

        let document = RenderedDocument { file };
        info!(file = %document.file_name(), template = template_file, "Document rendered");
        debug!(path = %document.path().display(), bytes = content.len(), "Rendered document written");
        Ok(document)
    }
}
