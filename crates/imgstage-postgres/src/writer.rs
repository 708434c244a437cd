//! Row writer: single-row INSERTs inside the session transaction.

use std::path::PathBuf;
use tracing::{debug, info, instrument};

use crate::{row_values, QueryBuilder, Result, Session, StageError, TableSchema, Value};

/// INSERT builder for `table` with text casts for the columns that need them.
fn insert_builder(table: &str, schema: &TableSchema, values: &[(String, Value)]) -> Result<QueryBuilder> {
    schema
        .text_casts(values)
        .into_iter()
        .try_fold(QueryBuilder::new(table)?, |qb, (column, type_name)| {
            qb.cast(column, type_name)
        })
}

impl Session {
    /// Inserts one row into `table`.
    ///
    /// `values` is validated against the live schema first and normalized in
    /// place (see [`TableSchema::check`](crate::TableSchema::check)). The row
    /// becomes visible to other connections on the next
    /// [`commit`](Session::commit).
    #[instrument(skip(self, values), fields(columns = values.len()))]
    pub async fn insert(&mut self, table: &str, values: &mut [(String, Value)]) -> Result<()> {
        let schema = self.get_schema(table).await?;
        schema.check(values)?;

        let (sql, params) = insert_builder(table, &schema, values)?.build_insert(values)?;
        self.fetch_with(&sql, &params).await?;

        debug!("Row inserted");
        Ok(())
    }

    /// Inserts an image row whose bytes are read from the `filepath` entry
    /// of `values`, commits, and returns the generated `image_id_column`.
    ///
    /// The commit ends the open transaction but leaves queued uploads alone.
    ///
    /// # Errors
    ///
    /// * `StageError::Validation` - `values` has no filepath entry
    /// * `StageError::MissingFile` - the file does not exist; nothing is inserted
    /// * `StageError::Schema` - a key is not a column of `table`
    #[instrument(skip(self, values), fields(columns = values.len()))]
    pub async fn insert_with_image(
        &mut self,
        table: &str,
        values: &mut [(String, Value)],
        image_id_column: &str,
    ) -> Result<i64> {
        let filepath_column = self.config().images.filepath_column.clone();
        let data_column = self.config().images.data_column.clone();

        let local_path = values
            .iter()
            .find(|(name, _)| *name == filepath_column)
            .and_then(|(_, value)| value.as_str())
            .map(PathBuf::from)
            .ok_or_else(|| {
                StageError::Validation(format!(
                    "Image rows need a string '{}' entry",
                    filepath_column
                ))
            })?;

        if !local_path.is_file() {
            return Err(StageError::MissingFile(local_path));
        }
        let bytes = tokio::fs::read(&local_path).await?;

        let schema = self.get_schema(table).await?;
        schema.check(values)?;

        let mut row = values.to_vec();
        row.push((data_column, Value::Bytes(bytes)));

        let (sql, params) = insert_builder(table, &schema, &row)?
            .returning(image_id_column)?
            .build_insert(&row)?;
        let rows = self.fetch_with(&sql, &params).await?;

        let image_id = rows
            .first()
            .map(row_values)
            .transpose()?
            .and_then(|returned| returned.into_iter().next())
            .and_then(|(_, value)| value.as_i64())
            .ok_or_else(|| {
                StageError::Query(format!(
                    "INSERT into '{}' returned no integer '{}'",
                    table, image_id_column
                ))
            })?;

        self.commit_transaction().await?;

        info!(image_id, filepath = %local_path.display(), "Image row inserted");
        Ok(image_id)
    }
}
