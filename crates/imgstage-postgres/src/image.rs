//! Image binary transfer to and from the images table.
//!
//! Images are keyed informally by the local path they were uploaded from.

use std::fmt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::query::validate_identifier;
use crate::{row_values, QueryBuilder, Result, Session, StageError, Value};

/// Column layout of the images table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTable {
    pub table: String,
    pub id_column: String,
    pub x_res_column: String,
    pub y_res_column: String,
    pub data_column: String,
    pub filepath_column: String,
}

impl Default for ImageTable {
    fn default() -> Self {
        Self {
            table: "images".to_string(),
            id_column: "image_id".to_string(),
            x_res_column: "x_res".to_string(),
            y_res_column: "y_res".to_string(),
            data_column: "image_data".to_string(),
            filepath_column: "filepath".to_string(),
        }
    }
}

impl ImageTable {
    /// Default layout under a different table name.
    pub fn named(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self {
            table,
            ..Self::default()
        })
    }

    /// Row of the image stored under `filepath`, data included.
    fn lookup(&self, filepath: &str) -> Result<QueryBuilder> {
        Ok(QueryBuilder::new(&self.table)?
            .select(&[
                &self.id_column,
                &self.x_res_column,
                &self.y_res_column,
                &self.data_column,
                &self.filepath_column,
            ])?
            .where_eq(&self.filepath_column, Value::String(filepath.to_string()))?
            .limit(1))
    }
}

/// Summary of one stored image, as appended to the download log.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub image_id: Value,
    pub x_res: Value,
    pub y_res: Value,
    pub data_size: i64,
    pub filepath: String,
}

impl fmt::Display for ImageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image ID: {}", self.image_id)?;
        writeln!(f, "X Resolution: {}", self.x_res)?;
        writeln!(f, "Y Resolution: {}", self.y_res)?;
        writeln!(f, "Image Data Size: {} bytes", self.data_size)?;
        writeln!(f, "Filepath: {}", self.filepath)?;
        writeln!(f, "{}", "-".repeat(30))
    }
}

/// Result of [`Session::download`]. A miss is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Written(ImageRecord),
    NotFound,
}

impl Session {
    /// Stores a local image as a new images-table row and commits immediately.
    ///
    /// `remote_path` and `remote_name` only label the transfer in logs; the
    /// row is keyed by `local_path`.
    #[instrument(skip(self), fields(local_path = %local_path.display()))]
    pub async fn upload(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        remote_name: &str,
    ) -> Result<()> {
        if !local_path.is_file() {
            return Err(StageError::MissingFile(local_path.to_path_buf()));
        }
        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len();

        let images = self.config().images.clone();
        let values = vec![
            (
                images.filepath_column.clone(),
                Value::String(local_path.to_string_lossy().into_owned()),
            ),
            (images.data_column.clone(), Value::Bytes(bytes)),
        ];
        let (sql, params) = QueryBuilder::new(&images.table)?.build_insert(&values)?;

        self.fetch_with(&sql, &params).await?;
        self.commit_transaction().await?;

        info!(bytes = size, remote_path, remote_name, "Image uploaded");
        Ok(())
    }

    /// Looks an image up by its stored filepath and appends its record to
    /// the configured download log.
    ///
    /// A missing image is logged and reported as [`DownloadOutcome::NotFound`];
    /// nothing is written in that case.
    #[instrument(skip(self))]
    pub async fn download(&mut self, remote_key: &str) -> Result<DownloadOutcome> {
        let images = self.config().images.clone();
        let log_path = self.config().download_log.clone();
        let (sql, params) = images.lookup(remote_key)?.build_select();

        let rows = self.fetch_with(&sql, &params).await?;

        let Some(row) = rows.first() else {
            warn!(filepath = remote_key, "No image found");
            return Ok(DownloadOutcome::NotFound);
        };

        let mut values = row_values(row)?.into_iter().map(|(_, value)| value);
        let mut next = || values.next().unwrap_or(Value::Null);
        let record = ImageRecord {
            image_id: next(),
            x_res: next(),
            y_res: next(),
            data_size: next().as_bytes().map_or(0, |bytes| bytes.len() as i64),
            filepath: next().to_string(),
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await?;
        file.write_all(record.to_string().as_bytes()).await?;
        file.flush().await?;

        info!(log = %log_path.display(), "Image record written");
        Ok(DownloadOutcome::Written(record))
    }
}
