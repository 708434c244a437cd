//! Export pipeline: filter, fetch, materialize.
//!
//! An export runs the caller's filter statements and commits them, reads
//! the whole target table, and writes the rows to disk in the requested
//! training format.
//!
//! # Examples
//!
//! ```ignore
//! use imgstage_postgres::{ExportOptions, Session, SessionConfig};
//!
//! let mut session = Session::open(&url, SessionConfig::default()).await?;
//! let options = ExportOptions::new(["class_id", "center_norm_x"], "out/");
//! let summary = session
//!     .join_and_download("test_images", "test_bb_labels", &options, &[] as &[&str])
//!     .await?;
//! // out/images/1.jpg, out/labels/1.txt, ...
//! ```

pub mod yolo;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::query::{build_drop_table, build_select_into_join, temp_table_name};
use crate::{QueryBuilder, Result, Row, Session, StageError};
use yolo::ColumnLayout;

/// Training-data layouts the exporter can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// `images/<id>.<ext>` and `labels/<id>.txt`, one line per row
    #[default]
    Yolo,
}

impl FromStr for ExportFormat {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yolo" => Ok(ExportFormat::Yolo),
            other => Err(StageError::Validation(format!(
                "Unsupported export format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Yolo => f.write_str("yolo"),
        }
    }
}

/// What to export and where.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Columns written to each label line, in this order
    pub label_columns: Vec<String>,
    pub output: PathBuf,
    pub format: ExportFormat,
    /// Column rows are grouped by; also the join column for two-table exports
    pub image_id_column: String,
}

impl ExportOptions {
    pub fn new<I, S>(label_columns: I, output: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label_columns: label_columns.into_iter().map(Into::into).collect(),
            output: output.into(),
            format: ExportFormat::default(),
            image_id_column: "image_id".to_string(),
        }
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn image_id_column(mut self, column: impl Into<String>) -> Self {
        self.image_id_column = column.into();
        self
    }
}

/// Counts reported by a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub images: usize,
    pub label_lines: usize,
    pub output: PathBuf,
}

impl Session {
    /// Exports every row of `table` after running `filters`.
    ///
    /// Filters run in order inside the session transaction and are then
    /// committed together with any queued uploads.
    ///
    /// # Errors
    ///
    /// `StageError::InvalidColumn` if a label column, the image id column or
    /// the filepath column is not in the table. Files already written when a
    /// later step fails stay on disk.
    #[instrument(skip(self, options, filters), fields(format = %options.format, filters = filters.len()))]
    pub async fn download_data<S: AsRef<str>>(
        &mut self,
        table: &str,
        options: &ExportOptions,
        filters: &[S],
    ) -> Result<ExportSummary> {
        for filter in filters {
            self.execute(filter.as_ref()).await?;
        }
        self.commit().await?;

        let (sql, params) = QueryBuilder::new(table)?.build_select();
        let columns = self.describe_columns(&sql).await?;

        let images = &self.config().images;
        let layout = ColumnLayout::resolve(
            &columns,
            &options.label_columns,
            &options.image_id_column,
            &images.filepath_column,
            &images.data_column,
        )?;

        let rows = self
            .fetch_with(&sql, &params)
            .await?
            .iter()
            .map(Row::from_sqlx)
            .collect::<Result<Vec<_>>>()?;
        info!(rows = rows.len(), "Rows fetched");

        let summary = match options.format {
            ExportFormat::Yolo => {
                let groups = yolo::group_rows(&rows, &layout)?;
                yolo::materialize(&groups, &options.output).await?
            }
        };

        info!(
            images = summary.images,
            label_lines = summary.label_lines,
            output = %summary.output.display(),
            "Export finished"
        );
        Ok(summary)
    }

    /// Exports the join of an images table and a labels table.
    ///
    /// The join is materialized into `<images>_<labels>_tmp` (dropped first
    /// if left over) before the caller's filters run, exported, then dropped.
    /// A failure part-way leaves the temporary table behind.
    #[instrument(skip(self, options, filters))]
    pub async fn join_and_download<S: AsRef<str>>(
        &mut self,
        images_table: &str,
        labels_table: &str,
        options: &ExportOptions,
        filters: &[S],
    ) -> Result<ExportSummary> {
        let tmp = temp_table_name(images_table, labels_table);

        let mut statements = vec![
            build_drop_table(&tmp, true)?,
            build_select_into_join(&tmp, images_table, labels_table, &options.image_id_column)?,
        ];
        statements.extend(filters.iter().map(|f| f.as_ref().to_string()));

        let summary = self.download_data(&tmp, options, &statements).await?;

        self.execute(&build_drop_table(&tmp, false)?).await?;
        self.commit().await?;
        Ok(summary)
    }
}
