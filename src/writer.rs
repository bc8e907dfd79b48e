//! CSV output: one file per table, plus an optional merged file.
//!
//! Files are UTF-8 with a byte-order mark so spreadsheet applications pick
//! the right encoding, and every file starts with a `page` column. Each file
//! is written to a `.tmp` sibling and renamed into place, so an interrupted
//! run never leaves a half-written CSV behind.

use crate::error::AlicePdfError;
use crate::table::{Table, PAGE_COLUMN};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Create the output directory, removing it first when `clear` is set.
pub async fn prepare_output_dir(dir: &Path, clear: bool) -> Result<(), AlicePdfError> {
    let failed = |source: io::Error| AlicePdfError::OutputDirFailed {
        path: dir.to_path_buf(),
        source,
    };

    if clear && tokio::fs::try_exists(dir).await.map_err(failed)? {
        tokio::fs::remove_dir_all(dir).await.map_err(failed)?;
        info!("Cleared output directory: {}", dir.display());
    }
    tokio::fs::create_dir_all(dir).await.map_err(failed)
}

pub fn table_file_name(stem: &str, page: usize, index: usize) -> String {
    format!("{stem}_page{page}_table{index}.csv")
}

pub fn merged_file_name(stem: &str) -> String {
    format!("{stem}_merged.csv")
}

/// Column name as it appears in the merged file: spaces become `_`.
pub fn normalise_column_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// All tables of a document stacked into one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTable {
    /// `page` first, then every other column in first-seen order.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Stack tables under the union of their (normalised) columns.
///
/// A table lacking a column gets empty cells there. A name repeated inside
/// one table maps to as many distinct merged columns. Rows keep their table
/// order within a page and are stable-sorted by page.
pub fn merge_tables(tables: &[Table]) -> MergedTable {
    let mut headers = vec![PAGE_COLUMN.to_string()];
    // name → positions of that name in `headers`, in order of appearance.
    let mut slots: HashMap<String, Vec<usize>> = HashMap::new();
    slots.insert(PAGE_COLUMN.to_string(), vec![0]);

    let mut mapped: Vec<(usize, Vec<usize>)> = Vec::with_capacity(tables.len());
    for table in tables {
        let mut seen: HashMap<String, usize> = HashMap::from([(PAGE_COLUMN.to_string(), 1)]);
        let mut positions = Vec::with_capacity(table.headers.len());
        for header in &table.headers {
            let name = normalise_column_name(header);
            let occurrence = seen.entry(name.clone()).or_insert(0);
            let entry = slots.entry(name.clone()).or_default();
            if entry.len() <= *occurrence {
                entry.push(headers.len());
                headers.push(name);
            }
            positions.push(entry[*occurrence]);
            *occurrence += 1;
        }
        mapped.push((table.page, positions));
    }

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (table, (page, positions)) in tables.iter().zip(&mapped) {
        for row in &table.rows {
            let mut out = vec![String::new(); headers.len()];
            out[0] = page.to_string();
            for (cell, &pos) in row.iter().zip(positions) {
                out[pos] = cell.clone();
            }
            rows.push((*page, out));
        }
    }
    rows.sort_by_key(|(page, _)| *page);

    MergedTable {
        headers,
        rows: rows.into_iter().map(|(_, row)| row).collect(),
    }
}

/// Write one table to `dir`, returning the file path.
pub async fn write_table_csv(dir: &Path, stem: &str, table: &Table) -> Result<PathBuf, AlicePdfError> {
    let path = dir.join(table_file_name(stem, table.page, table.index));
    let page = table.page.to_string();

    let bytes = to_csv_bytes(
        std::iter::once(PAGE_COLUMN).chain(table.headers.iter().map(String::as_str)),
        table.rows.iter().map(|row| {
            std::iter::once(page.as_str())
                .chain(row.iter().map(String::as_str))
                .collect::<Vec<_>>()
        }),
    )
    .map_err(|source| AlicePdfError::OutputWriteFailed {
        path: path.clone(),
        source,
    })?;

    write_atomic(&path, &bytes).await?;
    Ok(path)
}

/// Write the merged table to `dir`, returning the file path.
pub async fn write_merged_csv(
    dir: &Path,
    stem: &str,
    merged: &MergedTable,
) -> Result<PathBuf, AlicePdfError> {
    let path = dir.join(merged_file_name(stem));
    let bytes = to_csv_bytes(
        merged.headers.iter().map(String::as_str),
        merged
            .rows
            .iter()
            .map(|row| row.iter().map(String::as_str).collect::<Vec<_>>()),
    )
    .map_err(|source| AlicePdfError::OutputWriteFailed {
        path: path.clone(),
        source,
    })?;

    write_atomic(&path, &bytes).await?;
    Ok(path)
}

fn to_csv_bytes<'a, H, R>(headers: H, rows: R) -> io::Result<Vec<u8>>
where
    H: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = Vec<&'a str>>,
{
    let mut buf = UTF8_BOM.to_vec();
    {
        let mut writer = csv::WriterBuilder::new().from_writer(&mut buf);
        writer.write_record(headers).map_err(io::Error::other)?;
        for row in rows {
            writer.write_record(&row).map_err(io::Error::other)?;
        }
        writer.flush()?;
    }
    Ok(buf)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AlicePdfError> {
    let failed = |source: io::Error| AlicePdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(page: usize, index: usize, headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            page,
            index,
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn read_csv(path: &Path) -> (Vec<u8>, Vec<Vec<String>>) {
        let bytes = std::fs::read(path).unwrap();
        let body = bytes.strip_prefix(UTF8_BOM).expect("BOM").to_vec();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(body.as_slice());
        let records = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        (bytes, records)
    }

    #[test]
    fn file_names() {
        assert_eq!(table_file_name("report", 3, 0), "report_page3_table0.csv");
        assert_eq!(merged_file_name("report"), "report_merged.csv");
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(normalise_column_name("TOTALE PERCEPITO"), "TOTALE_PERCEPITO");
        assert_eq!(normalise_column_name(" a  b "), "_a__b_");
        assert_eq!(normalise_column_name("plain"), "plain");
    }

    #[test]
    fn merge_unions_columns_and_sorts_by_page() {
        let tables = vec![
            table(2, 0, &["Name", "Unit Price"], &[&["bolt", "0.10"]]),
            table(1, 0, &["Name", "Qty"], &[&["nut", "4"], &["washer", "9"]]),
        ];
        let merged = merge_tables(&tables);
        assert_eq!(merged.headers, vec!["page", "Name", "Unit_Price", "Qty"]);
        assert_eq!(
            merged.rows,
            vec![
                vec!["1", "nut", "", "4"],
                vec!["1", "washer", "", "9"],
                vec!["2", "bolt", "0.10", ""],
            ]
        );
    }

    #[test]
    fn merge_aligns_names_that_differ_only_by_spaces() {
        let tables = vec![
            table(1, 0, &["TOTALE PERCEPITO"], &[&["10"]]),
            table(1, 1, &["TOTALE_PERCEPITO"], &[&["20"]]),
        ];
        let merged = merge_tables(&tables);
        assert_eq!(merged.headers, vec!["page", "TOTALE_PERCEPITO"]);
        assert_eq!(merged.rows, vec![vec!["1", "10"], vec!["1", "20"]]);
    }

    #[test]
    fn merge_keeps_repeated_names_apart() {
        let tables = vec![table(1, 0, &["x", "x"], &[&["a", "b"]])];
        let merged = merge_tables(&tables);
        assert_eq!(merged.headers, vec!["page", "x", "x"]);
        assert_eq!(merged.rows, vec![vec!["1", "a", "b"]]);
    }

    #[test]
    fn merge_of_nothing_is_page_only() {
        let merged = merge_tables(&[]);
        assert_eq!(merged.headers, vec!["page"]);
        assert!(merged.rows.is_empty());
    }

    #[tokio::test]
    async fn table_csv_has_bom_and_page_column() {
        let dir = tempfile::tempdir().unwrap();
        let t = table(4, 1, &["Name", "Note"], &[&["bolt", "M6, zinc"]]);

        let path = write_table_csv(dir.path(), "doc", &t).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "doc_page4_table1.csv");

        let (bytes, records) = read_csv(&path);
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(records[0], vec!["page", "Name", "Note"]);
        assert_eq!(records[1], vec!["4", "bolt", "M6, zinc"]);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[tokio::test]
    async fn merged_csv_written() {
        let dir = tempfile::tempdir().unwrap();
        let merged = merge_tables(&[table(1, 0, &["A B"], &[&["1"]])]);
        let path = write_merged_csv(dir.path(), "doc", &merged).await.unwrap();
        let (_, records) = read_csv(&path);
        assert_eq!(records, vec![vec!["page", "A_B"], vec!["1", "1"]]);
    }

    #[test]
    fn prepare_clears_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("stale.csv"), "x").unwrap();

        tokio_test::block_on(prepare_output_dir(&out, false)).unwrap();
        assert!(out.join("stale.csv").exists());

        tokio_test::block_on(prepare_output_dir(&out, true)).unwrap();
        assert!(out.is_dir());
        assert!(!out.join("stale.csv").exists());
    }
}
