//! `;` separated two-column tables with optional quoting and UTF-8 BOM.

use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

const BOM: char = '\u{feff}';
const SEPARATOR: char = ';';
const QUOTE: char = '"';

/// Read a table file into `(first column, second column)` rows.
///
/// # Errors
///
/// Returns an IO error when the file cannot be read and
/// [`PipelineError::MalformedTable`] for rows that cannot be parsed.
pub fn load_pairs(path: &Path) -> PipelineResult<Vec<(String, String)>> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| PipelineError::io("mapping.read_table", path, err))?;
    parse_pairs(&text).map_err(|err| match err {
        PipelineError::MalformedTable { line, reason, .. } => PipelineError::MalformedTable {
            path: Some(path.to_path_buf()),
            line,
            reason,
        },
        other => other,
    })
}

/// Parse table text into rows; blank lines are skipped and extra columns ignored.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedTable`] for unterminated quotes or rows
/// with fewer than two columns.
pub fn parse_pairs(text: &str) -> PipelineResult<Vec<(String, String)>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line).ok_or_else(|| malformed(index, "unterminated quote"))?;
        let mut fields = fields.into_iter();
        match (fields.next(), fields.next()) {
            (Some(source), Some(destination)) => rows.push((source, destination)),
            _ => return Err(malformed(index, "expected two columns")),
        }
    }
    Ok(rows)
}

fn malformed(index: usize, reason: &'static str) -> PipelineError {
    PipelineError::MalformedTable {
        path: None,
        line: index + 1,
        reason,
    }
}

fn split_fields(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            QUOTE if quoted && chars.peek() == Some(&QUOTE) => {
                chars.next();
                current.push(QUOTE);
            }
            QUOTE if quoted => quoted = false,
            QUOTE if current.trim().is_empty() => {
                current.clear();
                quoted = true;
            }
            SEPARATOR if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if quoted {
        return None;
    }
    fields.push(current);
    Some(fields)
}
