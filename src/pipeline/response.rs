//! Response parsing: engine text → [`TableSet`].
//!
//! Vision models are asked for bare JSON but regularly wrap it in
//! ` ```json ` fences or add a sentence of commentary. The OCR endpoint
//! returns Markdown, where tables are GFM pipe tables. Both are handled
//! here with small deterministic rules, each independently testable.

use crate::table::{RawTable, TableSet};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// The reply could not be turned into a [`TableSet`].
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ResponseError {
    pub reason: String,
}

/// Parse a vision-model reply into tables.
///
/// Rules, in order:
/// 1. Prefer the first ` ```json ` block, else the first plain ` ``` ` block.
/// 2. Parse the candidate as JSON.
/// 3. Failing that, parse the span from the first `{` to the last `}`, first
///    inside the candidate, then across the whole reply.
pub fn parse_table_response(text: &str) -> Result<TableSet, ResponseError> {
    let candidate = strip_code_fences(text);

    let first_err = match serde_json::from_str::<TableSet>(candidate) {
        Ok(set) => return Ok(set),
        Err(e) => e,
    };

    let fallbacks = [outermost_object(candidate), outermost_object(text)];
    for inner in fallbacks.into_iter().flatten() {
        if inner.len() == candidate.len() {
            continue;
        }
        if let Ok(set) = serde_json::from_str::<TableSet>(inner) {
            return Ok(set);
        }
    }

    Err(ResponseError {
        reason: first_err.to_string(),
    })
}

// ── Rule 1: Code fences ──────────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json(.*?)(?:```|\z)").unwrap());

static RE_ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_-]*[ \t]*\n)?(.*?)(?:```|\z)").unwrap());

fn strip_code_fences(text: &str) -> &str {
    let re: &Regex = if text.contains("```json") {
        &RE_JSON_FENCE
    } else if text.contains("```") {
        &RE_ANY_FENCE
    } else {
        return text.trim();
    };

    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| text.trim())
}

// ── Rule 3: Outermost JSON object ────────────────────────────────────────────

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ── Markdown pipe tables ─────────────────────────────────────────────────────

/// Parse every GFM pipe table in a Markdown document.
///
/// A table is a run of consecutive lines that start and end with `|`. The
/// first line is the header; a `| --- |` separator row anywhere in the block
/// is dropped. `\|` inside a cell is a literal pipe.
pub fn parse_markdown_tables(markdown: &str) -> Vec<RawTable> {
    let mut tables = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if is_table_row(line) {
            block.push(line);
        } else if !block.is_empty() {
            tables.extend(table_from_block(&block));
            block.clear();
        }
    }
    if !block.is_empty() {
        tables.extend(table_from_block(&block));
    }
    tables
}

fn table_from_block(lines: &[&str]) -> Option<RawTable> {
    let mut rows = lines
        .iter()
        .filter(|l| !is_separator_row(l))
        .map(|l| split_cells(l));
    let headers = rows.next()?;
    Some(RawTable::new(headers, rows.collect()))
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('|')
        .and_then(|s| s.strip_suffix('|'))
        .unwrap_or(trimmed);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"tables": [{"headers": ["A", "B"], "rows": [["1", "2"]]}]}"#;

    #[test]
    fn bare_json() {
        let set = parse_table_response(BODY).unwrap();
        assert_eq!(set.tables.len(), 1);
        assert_eq!(set.tables[0].headers, vec!["A", "B"]);
    }

    #[test]
    fn json_fence_is_stripped() {
        let text = format!("Here are the tables:\n```json\n{BODY}\n```\nDone.");
        let set = parse_table_response(&text).unwrap();
        assert_eq!(set.tables[0].rows, vec![vec!["1", "2"]]);
    }

    #[test]
    fn plain_fence_is_stripped() {
        let text = format!("```\n{BODY}\n```");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn json_fence_preferred_over_earlier_plain_fence() {
        let text = format!("```\nnot json\n```\n```json\n{BODY}\n```");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn unterminated_fence_still_parses() {
        let text = format!("```json\n{BODY}");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn single_line_json_fence() {
        let text = format!("```json {BODY} ```");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn single_line_json_fence_with_trailing_text() {
        let text = format!("```json {BODY} ```\nHope this helps.");
        let set = parse_table_response(&text).unwrap();
        assert_eq!(set.tables[0].headers, vec!["A", "B"]);
    }

    #[test]
    fn single_line_plain_fence() {
        let text = format!("``` {BODY} ```");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn language_tag_on_plain_fence_is_dropped() {
        let text = format!("```javascript\n{BODY}\n```");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn commentary_around_object_is_ignored() {
        let text = format!("Sure! {BODY} Let me know if you need more.");
        assert_eq!(parse_table_response(&text).unwrap().tables.len(), 1);
    }

    #[test]
    fn empty_tables_reply() {
        let set = parse_table_response(r#"{"tables": []}"#).unwrap();
        assert!(set.tables.is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_table_response("I could not find any table.").unwrap_err();
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn markdown_table_parsed() {
        let md = "# Title\n\n| Name | Total |\n| :--- | ---: |\n| a | 1 |\n| b | 2 |\n\nText after.";
        let tables = parse_markdown_tables(md);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["Name", "Total"]);
        assert_eq!(tables[0].rows, vec![vec!["a", "1"], vec!["b", "2"]]);
    }

    #[test]
    fn markdown_multiple_tables_and_escaped_pipe() {
        let md = "| A |\n|---|\n| x \\| y |\n\nbetween\n\n| B | C |\n| 1 | 2 |";
        let tables = parse_markdown_tables(md);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows, vec![vec!["x | y"]]);
        assert_eq!(tables[1].headers, vec!["B", "C"]);
        assert_eq!(tables[1].rows, vec![vec!["1", "2"]]);
    }

    #[test]
    fn markdown_without_tables() {
        assert!(parse_markdown_tables("just | some text").is_empty());
        assert!(parse_markdown_tables("").is_empty());
    }

    #[test]
    fn empty_cells_are_kept() {
        assert_eq!(split_cells("| a || c |"), vec!["a", "", "c"]);
    }
}
