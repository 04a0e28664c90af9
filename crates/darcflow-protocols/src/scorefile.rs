//! Rosetta score files (`.sc`).

use darcflow_common::{DarcError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

const SCORE_PREFIX: &str = "SCORE:";

/// Scored model from one `SCORE:` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub description: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreTable {
    /// Term names, `description` excluded.
    pub columns: Vec<String>,
    pub rows: Vec<ScoreRow>,
}

impl ScoreTable {
    pub fn read(path: &Path) -> Result<Self> {
        DarcError::require(path)?;
        let text = fs::read_to_string(path)?;
        Self::parse(&text).map_err(|(line, details)| DarcError::format(path, line, details))
    }

    fn parse(text: &str) -> std::result::Result<Self, (usize, String)> {
        let mut table = Self::default();
        let mut width: Option<usize> = None;

        for (idx, line) in text.lines().enumerate() {
            let Some(rest) = line.strip_prefix(SCORE_PREFIX) else {
                continue;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let is_header = fields.last() == Some(&"description");

            let Some(expected) = width else {
                if !is_header {
                    return Err((idx + 1, "score header must end with `description`".into()));
                }
                table.columns = fields[..fields.len() - 1].iter().map(|f| f.to_string()).collect();
                width = Some(fields.len());
                continue;
            };

            // Appending runs repeat the header.
            if is_header {
                continue;
            }
            if fields.len() != expected {
                return Err((
                    idx + 1,
                    format!("expected {} fields, found {}", expected, fields.len()),
                ));
            }
            if let Some((description, values)) = fields.split_last() {
                table.rows.push(ScoreRow {
                    description: description.to_string(),
                    values: values.iter().map(|v| v.to_string()).collect(),
                });
            }
        }

        Ok(table)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Numeric value of `column` for the model called `description`.
    pub fn value(&self, description: &str, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .find(|row| row.description == description)?
            .values
            .get(idx)?
            .parse()
            .ok()
    }

    /// Row with the lowest `total_score`.
    pub fn best(&self) -> Option<&ScoreRow> {
        let idx = self.column_index("total_score")?;
        self.rows
            .iter()
            .filter_map(|row| row.values.get(idx)?.parse::<f64>().ok().map(|v| (v, row)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, row)| row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const SCORES: &str = "\
SEQUENCE:
SCORE: total_score fa_atr fa_rep description
SCORE:   -120.5  -300.1  40.2 1abc_clean_0001
SCORE: total_score fa_atr fa_rep description
SCORE:   -130.0  -310.0  38.0 1abc_clean_0002
";

    #[test]
    fn test_parse_scores() {
        let table = ScoreTable::parse(SCORES).unwrap();
        assert_eq!(table.columns, vec!["total_score", "fa_atr", "fa_rep"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.value("1abc_clean_0001", "fa_rep"), Some(40.2));
        assert_eq!(table.value("1abc_clean_0001", "missing"), None);
        assert_eq!(table.best().unwrap().description, "1abc_clean_0002");
    }

    #[test]
    fn test_row_width_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1abc.sc");
        fs::write(&path, "SCORE: total_score description\nSCORE: -1.0 2.0 model\n").unwrap();
        let err = ScoreTable::read(&path).unwrap_err();
        assert!(matches!(err, DarcError::FormatViolation { line: 2, .. }));
    }

    #[test]
    fn test_header_required() {
        assert!(ScoreTable::parse("SCORE: -1.0 model\n").is_err());
        assert!(ScoreTable::parse("").unwrap().rows.is_empty());
    }
}
