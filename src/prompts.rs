//! Prompts sent to the vision model.
//!
//! The response contract (a single JSON object with a `tables` array) is the
//! only thing [`crate::pipeline::response`] relies on; schema-generated and
//! default prompts both end with [`JSON_CONTRACT`] so the parser stays the same.
//! A user-supplied `--prompt` replaces everything here.

/// Opening line shared by the default and schema-generated prompts.
pub const PROMPT_PREAMBLE: &str = "Extract all tables from this image.";

/// Response-format section appended to every generated prompt.
pub const JSON_CONTRACT: &str = r#"For each table, return structured data in JSON format with:
- headers: list of column headers
- rows: list of rows, each row is a list of cell values

Return ONLY valid JSON in this format:
{
  "tables": [
    {
      "headers": ["col1", "col2", ...],
      "rows": [
        ["val1", "val2", ...],
        ["val1", "val2", ...]
      ]
    }
  ]
}

If no tables found, return: {"tables": []}
"#;

/// Default prompt used when neither `--prompt` nor `--schema` is given.
pub fn default_table_prompt() -> String {
    format!("{PROMPT_PREAMBLE}\n{JSON_CONTRACT}")
}
