//! Native engine: tabula-java through JNI.
//!
//! Runs entirely offline. tabula's `Decide` method picks lattice or stream
//! detection per page; the first row of each detected table is taken as its
//! header. A process can host only one JVM, so the VM is created on first use
//! and shared by every engine instance.

use crate::config::ExtractionConfig;
use crate::engine::{SourceDocument, TableEngine};
use crate::error::{AlicePdfError, PageError};
use crate::table::RawTable;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

const ENGINE_NAME: &str = "tabula";

static TABULA_VM: OnceLock<tabula::TabulaVM> = OnceLock::new();

#[derive(Deserialize, Debug)]
#[serde(transparent)]
struct JsonTableSet(Vec<JsonTable>);

#[derive(Deserialize, Debug)]
struct JsonTable {
    #[serde(default)]
    data: Vec<JsonRow>,
}

#[derive(Deserialize, Debug)]
struct JsonRow(Vec<JsonCell>);

#[derive(Deserialize, Debug)]
struct JsonCell {
    #[serde(default)]
    text: String,
}

pub struct TabulaEngine {
    jar: PathBuf,
}

impl TabulaEngine {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, AlicePdfError> {
        let jar = config
            .tabula_jar
            .clone()
            .ok_or_else(|| AlicePdfError::EngineUnavailable {
                engine: ENGINE_NAME.into(),
                reason: "no tabula jar configured (use --tabula-jar)".into(),
            })?;
        if !jar.is_file() {
            return Err(AlicePdfError::EngineUnavailable {
                engine: ENGINE_NAME.into(),
                reason: format!("tabula jar not found: {}", jar.display()),
            });
        }
        vm(&jar)?;
        Ok(Self { jar })
    }
}

fn vm(jar: &Path) -> Result<&'static tabula::TabulaVM, AlicePdfError> {
    if let Some(vm) = TABULA_VM.get() {
        return Ok(vm);
    }
    info!("Starting JVM for tabula ({})", jar.display());
    let created = tabula::TabulaVM::new(&jar.to_string_lossy(), false).map_err(|e| {
        AlicePdfError::EngineUnavailable {
            engine: ENGINE_NAME.into(),
            reason: format!("cannot start JVM: {e}"),
        }
    })?;
    let _ = TABULA_VM.set(created);
    TABULA_VM.get().ok_or_else(|| AlicePdfError::EngineUnavailable {
        engine: ENGINE_NAME.into(),
        reason: "JVM instance not stored".into(),
    })
}

fn extract_blocking(jar: &Path, pdf: &Path, page: usize) -> Result<Vec<RawTable>, String> {
    let vm = vm(jar).map_err(|e| e.to_string())?;
    let env = vm.attach().map_err(|e| format!("attaching to JVM: {e}"))?;

    let pages = [page as i32];
    let tabula = env
        .configure_tabula(
            None,
            Some(&pages),
            tabula::OutputFormat::Json,
            true,
            tabula::ExtractionMethod::Decide,
            false,
            None,
        )
        .map_err(|e| format!("configuring tabula: {e}"))?;

    let extracted = tabula
        .parse_document(pdf, "alice-pdf")
        .map_err(|e| format!("parsing document: {e}"))?;
    let result: JsonTableSet =
        serde_json::from_reader(extracted).map_err(|e| format!("reading tabula JSON: {e}"))?;

    debug!("tabula found {} table(s) on page {}", result.0.len(), page);
    Ok(result.0.into_iter().filter_map(into_raw_table).collect())
}

/// First row becomes the header; cells are trimmed.
fn into_raw_table(table: JsonTable) -> Option<RawTable> {
    let mut rows = table
        .data
        .into_iter()
        .map(|row| row.0.into_iter().map(|c| c.text.trim().to_string()).collect::<Vec<_>>())
        .filter(|row: &Vec<String>| row.iter().any(|c| !c.is_empty()));
    let headers = rows.next()?;
    Some(RawTable::new(headers, rows.collect()))
}

impl TableEngine for TabulaEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn extract_page(
        &self,
        doc: &SourceDocument,
        page_index: usize,
    ) -> Result<Vec<RawTable>, PageError> {
        let page = page_index + 1;
        let jar = self.jar.clone();
        let pdf = doc.path.clone();

        tokio::task::spawn_blocking(move || extract_blocking(&jar, &pdf, page))
            .await
            .map_err(|e| format!("tabula task panicked: {e}"))
            .and_then(|r| r)
            .map_err(|detail| PageError::RequestFailed {
                page,
                engine: ENGINE_NAME.to_string(),
                detail,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_row_is_header() {
        let set: JsonTableSet = serde_json::from_str(
            r#"[{"page_number":1,"data":[
                [{"text":"Name "},{"text":"Qty"}],
                [{"text":""},{"text":""}],
                [{"text":"bolt"},{"text":"4"}]
            ]}]"#,
        )
        .unwrap();
        let tables: Vec<RawTable> = set.0.into_iter().filter_map(into_raw_table).collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["Name", "Qty"]);
        assert_eq!(tables[0].rows, vec![vec!["bolt", "4"]]);
    }

    #[test]
    fn missing_jar_is_unavailable() {
        let config = ExtractionConfig::builder()
            .engine(crate::config::EngineKind::Tabula)
            .tabula_jar("/no/such/tabula.jar")
            .build()
            .unwrap();
        assert!(matches!(
            TabulaEngine::from_config(&config),
            Err(AlicePdfError::EngineUnavailable { .. })
        ));
    }
}
