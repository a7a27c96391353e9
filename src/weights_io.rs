//! Weight file reading and writing.
//!
//! Weights are stored either as an Arrow IPC stream or as JSON. The Arrow
//! layout follows the usual sparse-matrix weight file convention: columns
//! `row` (destination id), `col` (source id) and `S` (weight), with 1-based
//! ids. Matrix sizes, method, normalization and creation time travel as
//! schema metadata.

use arrow::record_batch::RecordBatch;
use arrow_array::{Array, ArrayRef, Float64Array, UInt64Array};
use arrow_ipc::reader::StreamReader;
use arrow_ipc::writer::StreamWriter;
use arrow_schema::{DataType, Field, Schema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{RegridError, Result};
use crate::options::{NormType, RegridMethod};
use crate::weights::matrix::MatrixRepr;
use crate::weights::{SparseWeightMatrix, WeightEntry};

/// On-disk weight file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightFormat {
    /// Arrow IPC stream
    #[default]
    Arrow,
    /// JSON document
    Json,
}

impl WeightFormat {
    /// Guess the format from a file extension (`.json` → JSON, else Arrow)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => WeightFormat::Json,
            _ => WeightFormat::Arrow,
        }
    }
}

impl fmt::Display for WeightFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightFormat::Arrow => write!(f, "arrow"),
            WeightFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for WeightFormat {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "arrow" | "ipc" => Ok(WeightFormat::Arrow),
            "json" => Ok(WeightFormat::Json),
            _ => Err(RegridError::Config {
                message: format!("Unknown weight format: {}", s),
            }),
        }
    }
}

/// Descriptive header of a weight file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightFileMeta {
    pub n_src: usize,
    pub n_dst: usize,
    pub method: RegridMethod,
    pub norm_type: NormType,
    pub created_at: DateTime<Utc>,
}

/// Source and destination sizes a weight file is expected to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightShape {
    pub n_src: usize,
    pub n_dst: usize,
}

impl WeightShape {
    pub fn new(n_src: usize, n_dst: usize) -> Self {
        Self { n_src, n_dst }
    }

    fn check(&self, n_src: usize, n_dst: usize, what: &str) -> Result<()> {
        if n_src != self.n_src || n_dst != self.n_dst {
            return Err(RegridError::WeightFile {
                message: format!(
                    "{} says {} x {} but {} x {} was expected",
                    what, n_src, n_dst, self.n_src, self.n_dst
                ),
            });
        }
        Ok(())
    }
}

/// A weight matrix together with its header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightFile {
    pub meta: WeightFileMeta,
    pub matrix: SparseWeightMatrix,
}

impl WeightFile {
    pub fn new(matrix: SparseWeightMatrix, method: RegridMethod, norm_type: NormType) -> Self {
        Self {
            meta: WeightFileMeta {
                n_src: matrix.n_src(),
                n_dst: matrix.n_dst(),
                method,
                norm_type,
                created_at: Utc::now(),
            },
            matrix,
        }
    }
}

fn weight_schema(meta: &WeightFileMeta) -> Schema {
    let mut metadata = HashMap::new();
    metadata.insert("n_src".to_string(), meta.n_src.to_string());
    metadata.insert("n_dst".to_string(), meta.n_dst.to_string());
    metadata.insert("method".to_string(), meta.method.to_string());
    metadata.insert("norm_type".to_string(), meta.norm_type.to_string());
    metadata.insert("created_at".to_string(), meta.created_at.to_rfc3339());

    Schema::new(vec![
        Field::new("row", DataType::UInt64, false),
        Field::new("col", DataType::UInt64, false),
        Field::new("S", DataType::Float64, false),
    ])
    .with_metadata(metadata)
}

/// Encode a weight file as an Arrow IPC stream
pub fn encode_arrow(file: &WeightFile) -> Result<Vec<u8>> {
    let schema = Arc::new(weight_schema(&file.meta));
    let entries = file.matrix.entries();

    let rows = UInt64Array::from_iter_values(entries.iter().map(|e| e.dst as u64 + 1));
    let cols = UInt64Array::from_iter_values(entries.iter().map(|e| e.src as u64 + 1));
    let weights = Float64Array::from_iter_values(entries.iter().map(|e| e.weight));
    let columns: Vec<ArrayRef> = vec![Arc::new(rows), Arc::new(cols), Arc::new(weights)];

    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let mut output = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut output, &schema)?;
        writer.write(&batch)?;
        writer.finish()?;
    }
    debug!(bytes = output.len(), entries = entries.len(), "Encoded weight stream");
    Ok(output)
}

fn metadata_value<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| RegridError::WeightFile {
            message: format!("Missing metadata key {}", key),
        })
}

fn parse_metadata<T: FromStr>(metadata: &HashMap<String, String>, key: &str) -> Result<T> {
    let value = metadata_value(metadata, key)?;
    value.parse().map_err(|_| RegridError::WeightFile {
        message: format!("Invalid value {:?} for metadata key {}", value, key),
    })
}

fn id_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| RegridError::WeightFile {
            message: format!("Column {} is missing or not UInt64", name),
        })
}

fn to_index(id: u64, name: &str) -> Result<usize> {
    if id == 0 {
        return Err(RegridError::WeightFile {
            message: format!("Column {} holds a 0 id; ids are 1-based", name),
        });
    }
    Ok(id as usize - 1)
}

/// Decode an Arrow IPC weight stream
pub fn decode_arrow(bytes: &[u8]) -> Result<WeightFile> {
    decode_arrow_shaped(bytes, None)
}

/// Decode an Arrow IPC weight stream whose header must match `expected`.
///
/// The header is checked before any entry is read.
pub fn decode_arrow_shaped(bytes: &[u8], expected: Option<WeightShape>) -> Result<WeightFile> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let metadata = schema.metadata();

    let created_at = DateTime::parse_from_rfc3339(metadata_value(metadata, "created_at")?)
        .map_err(|e| RegridError::WeightFile {
            message: format!("Invalid created_at: {}", e),
        })?
        .with_timezone(&Utc);
    let meta = WeightFileMeta {
        n_src: parse_metadata(metadata, "n_src")?,
        n_dst: parse_metadata(metadata, "n_dst")?,
        method: parse_metadata(metadata, "method")?,
        norm_type: parse_metadata(metadata, "norm_type")?,
        created_at,
    };
    if let Some(shape) = expected {
        shape.check(meta.n_src, meta.n_dst, "Header")?;
    }

    let mut entries = Vec::new();
    for batch in reader {
        let batch = batch?;
        let rows = id_column(&batch, "row")?;
        let cols = id_column(&batch, "col")?;
        let weights = batch
            .column_by_name("S")
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .ok_or_else(|| RegridError::WeightFile {
                message: "Column S is missing or not Float64".to_string(),
            })?;
        if rows.null_count() + cols.null_count() + weights.null_count() > 0 {
            return Err(RegridError::WeightFile {
                message: "Weight columns must not contain nulls".to_string(),
            });
        }
        for k in 0..batch.num_rows() {
            entries.push(WeightEntry::new(
                to_index(cols.value(k), "col")?,
                to_index(rows.value(k), "row")?,
                weights.value(k),
            ));
        }
    }

    let matrix = SparseWeightMatrix::from_entries(meta.n_src, meta.n_dst, entries)?;
    Ok(WeightFile { meta, matrix })
}

/// Write a weight file in the given format
pub fn write_weights(path: &Path, file: &WeightFile, format: WeightFormat) -> Result<()> {
    let bytes = match format {
        WeightFormat::Arrow => encode_arrow(file)?,
        WeightFormat::Json => serde_json::to_vec_pretty(file)?,
    };
    std::fs::write(path, &bytes)?;
    info!(
        path = %path.display(),
        format = %format,
        entries = file.matrix.nnz(),
        bytes = bytes.len(),
        "Weight file written"
    );
    Ok(())
}

#[derive(Deserialize)]
struct RawWeightFile {
    meta: WeightFileMeta,
    matrix: MatrixRepr,
}

fn decode_json_shaped(bytes: &[u8], expected: Option<WeightShape>) -> Result<WeightFile> {
    let raw: RawWeightFile = serde_json::from_slice(bytes)?;
    if let Some(shape) = expected {
        shape.check(raw.meta.n_src, raw.meta.n_dst, "Header")?;
    }
    WeightShape::new(raw.meta.n_src, raw.meta.n_dst).check(
        raw.matrix.n_src,
        raw.matrix.n_dst,
        "Matrix",
    )?;
    Ok(WeightFile {
        meta: raw.meta,
        matrix: SparseWeightMatrix::try_from(raw.matrix)?,
    })
}

/// Read a weight file in the given format
pub fn read_weights(path: &Path, format: WeightFormat) -> Result<WeightFile> {
    read_weights_shaped(path, format, None)
}

/// Read a weight file that must map `expected.n_src` sources onto
/// `expected.n_dst` destinations; a mismatched header is rejected before the
/// matrix is built
pub fn read_weights_shaped(
    path: &Path,
    format: WeightFormat,
    expected: Option<WeightShape>,
) -> Result<WeightFile> {
    let bytes = std::fs::read(path)?;
    match format {
        WeightFormat::Arrow => decode_arrow_shaped(&bytes, expected),
        WeightFormat::Json => decode_json_shaped(&bytes, expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WeightFile {
        let matrix = SparseWeightMatrix::from_entries(
            3,
            2,
            vec![
                WeightEntry::new(0, 0, 0.25),
                WeightEntry::new(2, 0, 0.75),
                WeightEntry::new(1, 1, 1.0),
            ],
        )
        .unwrap();
        WeightFile::new(matrix, RegridMethod::Conserve, NormType::FracArea)
    }

    #[test]
    fn test_arrow_stream_preserves_weights_and_header() {
        let file = sample();
        let bytes = encode_arrow(&file).unwrap();
        let back = decode_arrow(&bytes).unwrap();
        assert_eq!(back.matrix, file.matrix);
        assert_eq!(back.meta.method, RegridMethod::Conserve);
        assert_eq!(back.meta.norm_type, NormType::FracArea);
        assert_eq!(back.meta.n_src, 3);
    }

    #[test]
    fn test_arrow_ids_are_one_based() {
        let bytes = encode_arrow(&sample()).unwrap();
        let mut reader = StreamReader::try_new(Cursor::new(bytes), None).unwrap();
        let batch = reader.next().unwrap().unwrap();
        let rows = id_column(&batch, "row").unwrap();
        assert_eq!(rows.values().to_vec(), vec![1, 1, 2]);
    }

    #[test]
    fn test_json_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let file = sample();
        assert_eq!(WeightFormat::from_path(&path), WeightFormat::Json);
        write_weights(&path, &file, WeightFormat::Json).unwrap();
        let back = read_weights(&path, WeightFormat::Json).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_arrow(b"not an arrow stream").is_err());
        assert!("parquet".parse::<WeightFormat>().is_err());
    }

    fn corrupt_header(n_dst: &str) -> Vec<u8> {
        let file = sample();
        let mut meta = file.meta.clone();
        meta.n_dst = 2;
        let mut schema = weight_schema(&meta);
        schema.metadata.insert("n_dst".to_string(), n_dst.to_string());
        let schema = Arc::new(schema);
        let entries = file.matrix.entries();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt64Array::from_iter_values(entries.iter().map(|e| e.dst as u64 + 1))),
            Arc::new(UInt64Array::from_iter_values(entries.iter().map(|e| e.src as u64 + 1))),
            Arc::new(Float64Array::from_iter_values(entries.iter().map(|e| e.weight))),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let mut output = Vec::new();
        let mut writer = StreamWriter::try_new(&mut output, &schema).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
        drop(writer);
        output
    }

    #[test]
    fn test_oversized_header_rejected() {
        let huge = corrupt_header("1000000000000");
        let err = decode_arrow_shaped(&huge, Some(WeightShape::new(3, 2))).unwrap_err();
        assert!(matches!(err, RegridError::WeightFile { .. }));
        assert!(err.to_string().contains("1000000000000"));

        let max = corrupt_header(&usize::MAX.to_string());
        assert!(matches!(
            decode_arrow(&max),
            Err(RegridError::WeightFile { .. })
        ));

        let good = corrupt_header("2");
        let file = decode_arrow_shaped(&good, Some(WeightShape::new(3, 2))).unwrap();
        assert_eq!(file.matrix, sample().matrix);
    }

    #[test]
    fn test_json_header_checked_before_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        write_weights(&path, &sample(), WeightFormat::Json).unwrap();

        assert!(read_weights_shaped(&path, WeightFormat::Json, Some(WeightShape::new(3, 2))).is_ok());
        let err = read_weights_shaped(&path, WeightFormat::Json, Some(WeightShape::new(3, 5)))
            .unwrap_err();
        assert!(err.to_string().contains("was expected"));

        let mut doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc["matrix"]["n_dst"] = serde_json::json!(1_000_000_000_000u64);
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
        let err = read_weights(&path, WeightFormat::Json).unwrap_err();
        assert!(err.to_string().contains("Matrix says"));
    }
}
