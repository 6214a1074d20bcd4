//! Reference dataset CSV ingest.
//!
//! This module turns the historical NEO CSV into a clean feature matrix the
//! explainer can use as its background distribution.
//!
//! Design goals:
//! - **Strict schema** for the four model features (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (rows kept in file order)
//! - **Separation of concerns**: no statistics or explainer logic here
//!
//! The label column (`is_hazardous`) and any pandas index column (empty header
//! or `Unnamed: N`) are dropped from the feature matrix. Feature columns are
//! matched by name and reordered into model order.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
use crate::error::AppError;

/// Name of the label column in the reference dataset.
pub const LABEL_COLUMN: &str = "is_hazardous";

/// Background data for the explainer: read-only after load.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureVector>,
    /// Class labels when the CSV has a label column.
    pub labels: Option<Vec<u8>>,
}

impl ReferenceDataset {
    /// Build directly from rows in model order (no label column).
    pub fn from_rows(rows: Vec<FeatureVector>) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            rows,
            labels: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one feature column, in row order.
    pub fn column(&self, feature: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[feature]).collect()
    }
}

/// Per-feature range summary of the rows actually used.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub min: FeatureVector,
    pub max: FeatureVector,
    /// Number of rows labelled hazardous, when labels exist.
    pub n_hazardous: Option<usize>,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: dataset + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: ReferenceDataset,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load and validate the reference dataset CSV.
pub fn load_reference_dataset(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open dataset CSV '{}': {e}", path.display())))?;
    let ingest = read_reference_dataset(file)
        .map_err(|e| AppError::new(e.exit_code(), format!("{} ('{}')", e.message(), path.display())))?;

    info!(
        path = %path.display(),
        rows_used = ingest.rows_used,
        rows_skipped = ingest.row_errors.len(),
        "loaded reference dataset"
    );
    Ok(ingest)
}

/// Parse a reference dataset from any CSV reader.
pub fn read_reference_dataset<R: std::io::Read>(reader: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    let feature_columns = resolve_feature_columns(&header_map)?;
    let label_column = header_map.get(LABEL_COLUMN).copied();

    let ignored: Vec<&str> = headers
        .iter()
        .filter(|h| {
            let name = normalize_header_name(h);
            !is_index_column(&name) && name != LABEL_COLUMN && !FEATURE_NAMES.contains(&name.as_str())
        })
        .collect();
    if !ignored.is_empty() {
        debug!(?ignored, "ignoring extra dataset columns");
    }

    let mut rows = Vec::new();
    let mut labels = label_column.map(|_| Vec::new());
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let parsed = parse_features(&record, &feature_columns).and_then(|features| {
            let label = match label_column {
                Some(col) => Some(parse_label(record.get(col).unwrap_or(""))?),
                None => None,
            };
            Ok((features, label))
        });

        match parsed {
            Ok((features, label)) => {
                rows.push(features);
                if let (Some(labels), Some(label)) = (labels.as_mut(), label) {
                    labels.push(label);
                }
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let rows_used = rows.len();
    if rows_used == 0 {
        return Err(AppError::refused("No valid rows in the reference dataset."));
    }

    let dataset = ReferenceDataset {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        rows,
        labels,
    };
    let stats = compute_stats(&dataset);

    Ok(IngestedData {
        dataset,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn is_index_column(normalized: &str) -> bool {
    normalized.is_empty() || normalized.starts_with("unnamed:")
}

fn resolve_feature_columns(header_map: &HashMap<String, usize>) -> Result<[usize; FEATURE_COUNT], AppError> {
    let mut out = [0usize; FEATURE_COUNT];
    let mut missing = Vec::new();
    for (slot, name) in FEATURE_NAMES.iter().enumerate() {
        match header_map.get(*name) {
            Some(idx) => out[slot] = *idx,
            None => missing.push(*name),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::input(format!(
            "Missing required dataset column(s): {}",
            missing.iter().map(|m| format!("`{m}`")).collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(out)
}

fn parse_features(record: &StringRecord, columns: &[usize; FEATURE_COUNT]) -> Result<FeatureVector, String> {
    let mut out = [0.0; FEATURE_COUNT];
    for (slot, &col) in columns.iter().enumerate() {
        let name = FEATURE_NAMES[slot];
        let raw = record
            .get(col)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing required value: `{name}`"))?;
        let v = raw
            .parse::<f64>()
            .map_err(|_| format!("Invalid `{name}` value '{raw}'."))?;
        if !v.is_finite() {
            return Err(format!("Non-finite `{name}` value."));
        }
        out[slot] = v;
    }
    Ok(out)
}

fn parse_label(raw: &str) -> Result<u8, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(1),
        "0" | "0.0" | "false" => Ok(0),
        other => Err(format!("Invalid `{LABEL_COLUMN}` value '{other}'.")),
    }
}

fn compute_stats(dataset: &ReferenceDataset) -> DatasetStats {
    let mut min = [f64::INFINITY; FEATURE_COUNT];
    let mut max = [f64::NEG_INFINITY; FEATURE_COUNT];
    for row in &dataset.rows {
        for j in 0..FEATURE_COUNT {
            min[j] = min[j].min(row[j]);
            max[j] = max[j].max(row[j]);
        }
    }

    DatasetStats {
        min,
        max,
        n_hazardous: dataset
            .labels
            .as_ref()
            .map(|l| l.iter().filter(|v| **v == 1).count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_index_and_label_and_reorders_features() {
        let csv = "\u{feff},relative_velocity,miss_distance,absolute_magnitude,estimated_diameter_max,is_hazardous,orbiting_body\n\
                   0,48000.5,17.2,21.1,0.25,True,Earth\n\
                   1,22000.0,18.1,25.3,0.03,False,Earth\n";
        let ingest = read_reference_dataset(csv.as_bytes()).unwrap();

        assert_eq!(ingest.rows_used, 2);
        assert_eq!(ingest.dataset.rows[0], [21.1, 0.25, 48000.5, 17.2]);
        assert_eq!(ingest.dataset.rows[1], [25.3, 0.03, 22000.0, 18.1]);
        assert_eq!(ingest.dataset.labels, Some(vec![1, 0]));
        assert_eq!(ingest.stats.n_hazardous, Some(1));
        assert_eq!(ingest.stats.min[0], 21.1);
        assert_eq!(ingest.stats.max[2], 48000.5);
    }

    #[test]
    fn unnamed_pandas_index_is_ignored() {
        let csv = "Unnamed: 0,absolute_magnitude,estimated_diameter_max,relative_velocity,miss_distance\n\
                   7,20.0,0.5,30000.0,16.0\n";
        let ingest = read_reference_dataset(csv.as_bytes()).unwrap();
        assert_eq!(ingest.dataset.rows, vec![[20.0, 0.5, 30000.0, 16.0]]);
        assert!(ingest.dataset.labels.is_none());
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = "absolute_magnitude,estimated_diameter_max,relative_velocity,miss_distance,is_hazardous\n\
                   20.0,0.5,30000.0,16.0,1\n\
                   oops,0.5,30000.0,16.0,1\n\
                   20.0,0.5,,16.0,0\n\
                   20.0,0.5,30000.0,16.0,maybe\n\
                   21.0,0.4,31000.0,17.0,0\n";
        let ingest = read_reference_dataset(csv.as_bytes()).unwrap();
        assert_eq!(ingest.rows_read, 5);
        assert_eq!(ingest.rows_used, 2);
        let lines: Vec<usize> = ingest.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn missing_feature_column_is_fatal() {
        let csv = "absolute_magnitude,relative_velocity,miss_distance\n20.0,30000.0,16.0\n";
        let err = read_reference_dataset(csv.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("estimated_diameter_max"));
    }

    #[test]
    fn no_usable_rows_is_refused() {
        let csv = "absolute_magnitude,estimated_diameter_max,relative_velocity,miss_distance\nx,y,z,w\n";
        let err = read_reference_dataset(csv.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_REFUSED);
    }
}
