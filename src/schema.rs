//! Table schemas: describe the expected columns once, get a tailored prompt.
//!
//! A schema file (YAML or JSON) names the columns a table should have. The
//! vision model does noticeably better on dense financial tables when it
//! knows the column names and value formats up front.
//!
//! ```yaml
//! name: Payments
//! description: Yearly payments per beneficiary
//! columns:
//!   - name: BENEFICIARIO
//!     description: Name of the beneficiary
//!   - name: TOTALE PERCEPITO
//!     type: number
//!     examples: ["1.234,56"]
//! notes:
//!   - Amounts use a comma as decimal separator
//! ```

use crate::error::AlicePdfError;
use crate::prompts::{JSON_CONTRACT, PROMPT_PREAMBLE};
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// The expected layout of the tables in a document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// One expected column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaFormat {
    Yaml,
    Json,
}

impl SchemaFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => SchemaFormat::Json,
            _ => SchemaFormat::Yaml,
        }
    }
}

impl TableSchema {
    /// Load a schema from a `.yaml`/`.yml` or `.json` file.
    ///
    /// Unknown extensions are read as YAML, which also accepts JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AlicePdfError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AlicePdfError::SchemaNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| invalid(path, e.to_string()))?;
        Self::parse(&text, SchemaFormat::from_path(path)).map_err(|detail| invalid(path, detail))
    }

    fn parse(text: &str, format: SchemaFormat) -> Result<Self, String> {
        let schema: TableSchema = match format {
            SchemaFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string())?,
            SchemaFormat::Yaml => serde_yaml_ng::from_str(text).map_err(|e| e.to_string())?,
        };
        if schema.columns.is_empty() {
            return Err("schema must list at least one column".into());
        }
        if let Some(col) = schema.columns.iter().find(|c| c.name.trim().is_empty()) {
            return Err(format!("column with empty name (description: {:?})", col.description));
        }
        Ok(schema)
    }

    /// Build the extraction prompt for this schema.
    pub fn to_prompt(&self) -> String {
        let mut prompt = String::from(PROMPT_PREAMBLE);
        prompt.push('\n');

        if let Some(name) = &self.name {
            let _ = write!(prompt, "\nThe tables contain: {name}");
            if let Some(desc) = &self.description {
                let _ = write!(prompt, " ({desc})");
            }
            prompt.push('\n');
        } else if let Some(desc) = &self.description {
            let _ = writeln!(prompt, "\nThe tables contain: {desc}");
        }

        let _ = writeln!(
            prompt,
            "\nEach table has these {} columns, in this order:",
            self.columns.len()
        );
        for (i, col) in self.columns.iter().enumerate() {
            let _ = write!(prompt, "{}. {}", i + 1, col.name);
            if let Some(kind) = &col.kind {
                let _ = write!(prompt, " [{kind}]");
            }
            if let Some(desc) = &col.description {
                let _ = write!(prompt, ": {desc}");
            }
            if !col.examples.is_empty() {
                let _ = write!(prompt, " (e.g. {})", col.examples.join(", "));
            }
            prompt.push('\n');
        }
        prompt.push_str("Use exactly these column names as headers.\n");

        if !self.notes.is_empty() {
            prompt.push_str("\nNotes:\n");
            for note in &self.notes {
                let _ = writeln!(prompt, "- {note}");
            }
        }

        prompt.push('\n');
        prompt.push_str(JSON_CONTRACT);
        prompt
    }
}

/// Load a schema file and turn it into a prompt in one step.
pub fn prompt_from_schema(path: impl AsRef<Path>) -> Result<String, AlicePdfError> {
    TableSchema::from_path(path).map(|s| s.to_prompt())
}

fn invalid(path: &Path, detail: String) -> AlicePdfError {
    AlicePdfError::InvalidSchema {
        path: PathBuf::from(path),
        detail,
    }
}
