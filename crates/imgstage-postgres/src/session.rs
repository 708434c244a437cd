//! Stage session: the single owner of the database connection.
//!
//! Every statement runs inside one open transaction that is started lazily
//! and ended by [`Session::commit`]. Image uploads queued with
//! [`Session::queue_upload`] are flushed after the transaction commits.

use indicatif::{ProgressBar, ProgressStyle};
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::{Column, Executor, Postgres, Transaction};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::image::ImageTable;
use crate::{Connection, PoolConfig, Result, Row, StageError, Value};

/// Default file that [`Session::download`] appends image records to.
pub const DEFAULT_DOWNLOAD_LOG: &str = "testOutput.txt";

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pool: PoolConfig,
    /// Layout of the images table used by upload/download
    pub images: ImageTable,
    /// File that download records are appended to
    pub download_log: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            images: ImageTable::default(),
            download_log: PathBuf::from(DEFAULT_DOWNLOAD_LOG),
        }
    }
}

impl SessionConfig {
    /// Create from environment variables.
    ///
    /// Reads `IMGSTAGE_IMAGES_TABLE`, `IMGSTAGE_DOWNLOAD_LOG` and
    /// `IMGSTAGE_CONNECT_TIMEOUT`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(table) = std::env::var("IMGSTAGE_IMAGES_TABLE") {
            config.images = ImageTable::named(table)?;
        }

        if let Ok(path) = std::env::var("IMGSTAGE_DOWNLOAD_LOG") {
            config.download_log = PathBuf::from(path);
        }

        if let Ok(timeout) = std::env::var("IMGSTAGE_CONNECT_TIMEOUT") {
            config.pool.connect_timeout = timeout.parse().map_err(|_| {
                StageError::Validation(format!(
                    "IMGSTAGE_CONNECT_TIMEOUT must be a number of seconds, got '{}'",
                    timeout
                ))
            })?;
        }

        Ok(config)
    }

    pub fn images_table(mut self, images: ImageTable) -> Self {
        self.images = images;
        self
    }

    pub fn download_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_log = path.into();
        self
    }
}

/// An image queued for upload on the next [`Session::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub remote_name: String,
}

/// Owns one connection, its open transaction and the pending-upload queue.
///
/// Methods take `&mut self`; a session is used by one task at a time and
/// assumes it is the only writer on the database.
pub struct Session {
    conn: Connection,
    txn: Option<Transaction<'static, Postgres>>,
    pending: VecDeque<PendingUpload>,
    config: SessionConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conn", &self.conn)
            .field("in_transaction", &self.txn.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Session {
    /// Connects to the database.
    pub async fn open(uri: &str, config: SessionConfig) -> Result<Self> {
        let conn = Connection::new(uri, config.pool.clone()).await?;
        Ok(Self {
            conn,
            txn: None,
            pending: VecDeque::new(),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connection inside the open transaction, beginning one if needed.
    pub(crate) async fn conn(&mut self) -> Result<&mut PgConnection> {
        if self.txn.is_none() {
            self.txn = Some(self.conn.pool().begin().await?);
            debug!("Transaction started");
        }
        match self.txn.as_mut() {
            Some(txn) => Ok(&mut **txn),
            None => Err(StageError::Internal("Transaction not open".to_string())),
        }
    }

    /// Executes a raw SQL string and returns its rows.
    ///
    /// The string may hold several `;`-separated statements. Statements that
    /// produce no result set contribute no rows. Nothing is visible to other
    /// connections until [`commit`](Self::commit).
    #[instrument(skip(self, statement), fields(sql_preview = %preview(statement)))]
    pub async fn execute(&mut self, statement: &str) -> Result<Vec<Row>> {
        let conn = self.conn().await?;
        let rows = sqlx::raw_sql(statement).fetch_all(conn).await?;
        debug!(rows = rows.len(), "Statement executed");
        rows.iter().map(Row::from_sqlx).collect()
    }

    /// Executes a parameterized statement.
    pub(crate) async fn fetch_with(&mut self, sql: &str, params: &[Value]) -> Result<Vec<PgRow>> {
        let mut args = PgArguments::default();
        for param in params {
            param.bind_to_arguments(&mut args)?;
        }
        debug!(sql_preview = %preview(sql), params = params.len(), "Executing statement");
        let conn = self.conn().await?;
        Ok(sqlx::query_with(sql, args).fetch_all(conn).await?)
    }

    /// Column names a query would return, without running it.
    pub(crate) async fn describe_columns(&mut self, sql: &str) -> Result<Vec<String>> {
        let conn = self.conn().await?;
        let described = conn.describe(sql).await?;
        Ok(described
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect())
    }

    /// Commits the open transaction, then flushes queued uploads in order.
    ///
    /// Each upload commits on its own. The first failing upload stops the
    /// flush and its error is returned: uploads flushed before it stay
    /// committed and leave the queue, the failed one and those after it
    /// remain queued.
    #[instrument(skip(self), fields(pending = self.pending.len()))]
    pub async fn commit(&mut self) -> Result<()> {
        self.commit_transaction().await?;

        if self.pending.is_empty() {
            return Ok(());
        }

        info!(count = self.pending.len(), "Flushing pending uploads");
        let progress = progress_bar(self.pending.len(), "uploading");
        while let Some(upload) = self.pending.front().cloned() {
            debug!(
                remote_name = %upload.remote_name,
                local_path = %upload.local_path.display(),
                "Uploading image"
            );
            if let Err(e) = self
                .upload(&upload.local_path, &upload.remote_path, &upload.remote_name)
                .await
            {
                progress.abandon();
                return Err(e);
            }
            self.pending.pop_front();
            progress.inc(1);
        }
        progress.finish_and_clear();
        info!("Pending uploads flushed");
        Ok(())
    }

    /// Commits the open transaction without touching the upload queue.
    pub(crate) async fn commit_transaction(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit().await?;
            debug!("Transaction committed");
        }
        Ok(())
    }

    /// Discards uncommitted statements. Queued uploads are kept.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.rollback().await?;
            debug!("Transaction rolled back");
        }
        Ok(())
    }

    /// Queues an image for upload on the next [`commit`](Self::commit).
    pub fn queue_upload(
        &mut self,
        local_path: impl AsRef<Path>,
        remote_path: impl Into<String>,
        remote_name: impl Into<String>,
    ) {
        self.pending.push_back(PendingUpload {
            local_path: local_path.as_ref().to_path_buf(),
            remote_path: remote_path.into(),
            remote_name: remote_name.into(),
        });
    }

    pub fn pending_uploads(&self) -> &VecDeque<PendingUpload> {
        &self.pending
    }

    /// Rolls back uncommitted work and closes the connection.
    pub async fn close(mut self) -> Result<()> {
        if !self.pending.is_empty() {
            warn!(count = self.pending.len(), "Closing session with unflushed uploads");
        }
        self.rollback().await?;
        self.conn.close().await
    }
}

/// Progress bar on stderr; hidden when stderr is not a terminal.
pub(crate) fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let style = ProgressStyle::with_template("{msg:>10} [{bar:40}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len as u64)
        .with_style(style)
        .with_message(message)
}

pub(crate) fn preview(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(100)
        .collect()
}
