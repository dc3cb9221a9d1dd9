//! Record sources: sequential cursors over split-track records.
//!
//! Every source reads the six splitter-tree columns of each variable (see
//! [`SplitColumns`]). A column that does not exist reads as `0.0` for every
//! record, and so does a null value in a Parquet column.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, AsArray, Float64Array};
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::error::{Error, Result};
use crate::policy::Variable;
use crate::record::{SplitColumns, SplitMeasurement, SplitRecord};

/// Rows decoded per Parquet batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// A forward-only cursor over records.
pub trait RecordSource {
    /// Number of records in the source.
    fn total(&self) -> u64;

    /// Read the next record into `record`; `false` at end of stream.
    ///
    /// `record` must be shaped for the variables the source was opened with.
    fn next_into(&mut self, record: &mut SplitRecord) -> Result<bool>;
}

fn warn_missing(origin: &str, missing: &[String]) {
    for name in missing {
        log::warn!("{origin}: column '{name}' not found, reading it as 0");
    }
}

/// In-memory columns keyed by name.
pub struct ColumnSource {
    fields: Vec<[Option<Vec<f64>>; 6]>,
    n_entries: usize,
    cursor: usize,
}

impl ColumnSource {
    /// Take the columns needed for `variables` out of `columns`.
    ///
    /// All present columns must have the same length.
    pub fn new(variables: &[Variable], mut columns: HashMap<String, Vec<f64>>) -> Result<Self> {
        let mut n_entries: Option<usize> = None;
        let mut first = String::new();
        let mut missing = Vec::new();
        let mut fields = Vec::with_capacity(variables.len());

        for v in variables {
            let names = SplitColumns::for_variable(&v.name);
            let mut cols: [Option<Vec<f64>>; 6] = Default::default();
            for (slot, name) in cols.iter_mut().zip(names.names()) {
                let Some(col) = columns.remove(name) else {
                    missing.push(name.to_string());
                    continue;
                };
                match n_entries {
                    Some(n) if n != col.len() => {
                        return Err(Error::Configuration(format!(
                            "column '{name}' has {} entries, '{first}' has {n}",
                            col.len()
                        )));
                    }
                    Some(_) => {}
                    None => {
                        n_entries = Some(col.len());
                        first = name.to_string();
                    }
                }
                *slot = Some(col);
            }
            fields.push(cols);
        }

        warn_missing("columns", &missing);
        Ok(Self { fields, n_entries: n_entries.unwrap_or(0), cursor: 0 })
    }
}

impl RecordSource for ColumnSource {
    fn total(&self) -> u64 {
        self.n_entries as u64
    }

    fn next_into(&mut self, record: &mut SplitRecord) -> Result<bool> {
        if self.cursor >= self.n_entries {
            return Ok(false);
        }
        let i = self.cursor;
        for (out, cols) in record.measurements.iter_mut().zip(&self.fields) {
            *out = SplitMeasurement::from_fields(std::array::from_fn(|f| {
                cols[f].as_ref().map_or(0.0, |c| c[i])
            }));
        }
        self.cursor += 1;
        Ok(true)
    }
}

/// Streaming reader over a Parquet file with one Float64-castable column per
/// splitter-tree branch.
pub struct ParquetSource {
    path: PathBuf,
    reader: ParquetRecordBatchReader,
    total: u64,
    columns: Vec<SplitColumns>,
    batch: Vec<[Option<Float64Array>; 6]>,
    batch_rows: usize,
    row: usize,
}

impl ParquetSource {
    /// Open `path` for the given variables.
    pub fn open(path: &Path, variables: &[Variable]) -> Result<Self> {
        Self::open_with_batch_size(path, variables, DEFAULT_BATCH_SIZE)
    }

    /// Open with an explicit decode batch size.
    pub fn open_with_batch_size(
        path: &Path,
        variables: &[Variable],
        batch_size: usize,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::source_unavailable(path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::source_unavailable(path, format!("failed to read Parquet: {e}")))?;

        let total = u64::try_from(builder.metadata().file_metadata().num_rows()).unwrap_or(0);
        let columns: Vec<SplitColumns> =
            variables.iter().map(|v| SplitColumns::for_variable(&v.name)).collect();

        let schema = builder.schema().clone();
        let mut roots = Vec::new();
        let mut missing = Vec::new();
        for name in columns.iter().flat_map(|c| c.names()) {
            match schema.index_of(name) {
                Ok(i) => roots.push(i),
                Err(_) => missing.push(name.to_string()),
            }
        }
        warn_missing(&path.display().to_string(), &missing);

        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(batch_size.max(1))
            .build()
            .map_err(|e| {
                Error::source_unavailable(path, format!("failed to build Parquet reader: {e}"))
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            total,
            columns,
            batch: Vec::new(),
            batch_rows: 0,
            row: 0,
        })
    }

    fn load_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let mut loaded = Vec::with_capacity(self.columns.len());
        for names in &self.columns {
            let mut cols: [Option<Float64Array>; 6] = Default::default();
            for (slot, name) in cols.iter_mut().zip(names.names()) {
                let Some(arr) = batch.column_by_name(name) else { continue };
                let arr = if arr.data_type() == &DataType::Float64 {
                    arr.clone()
                } else {
                    arrow::compute::cast(arr, &DataType::Float64).map_err(|e| {
                        Error::source_unavailable(
                            &self.path,
                            format!("column '{name}' is not numeric: {e}"),
                        )
                    })?
                };
                *slot = Some(arr.as_primitive::<Float64Type>().clone());
            }
            loaded.push(cols);
        }
        self.batch = loaded;
        self.batch_rows = batch.num_rows();
        self.row = 0;
        Ok(())
    }
}

impl RecordSource for ParquetSource {
    fn total(&self) -> u64 {
        self.total
    }

    fn next_into(&mut self, record: &mut SplitRecord) -> Result<bool> {
        while self.row >= self.batch_rows {
            match self.reader.next() {
                None => return Ok(false),
                Some(Err(e)) => {
                    return Err(Error::source_unavailable(
                        &self.path,
                        format!("failed to decode Parquet batch: {e}"),
                    ));
                }
                Some(Ok(batch)) => self.load_batch(&batch)?,
            }
        }

        let row = self.row;
        for (out, cols) in record.measurements.iter_mut().zip(&self.batch) {
            *out = SplitMeasurement::from_fields(std::array::from_fn(|f| match &cols[f] {
                Some(c) if !c.is_null(row) => c.value(row),
                _ => 0.0,
            }));
        }
        self.row += 1;
        Ok(true)
    }
}
