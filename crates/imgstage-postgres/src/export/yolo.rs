//! YOLO layout: `images/<id>.<ext>` plus one `labels/<id>.txt` per image.

use indicatif::ProgressIterator;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ExportSummary;
use crate::session::progress_bar;
use crate::{Result, Row, StageError, Value};

/// Positions of the columns the exporter reads, resolved from the result's
/// column descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub image_id: usize,
    pub filepath: usize,
    pub image_data: Option<usize>,
    pub labels: Vec<usize>,
}

impl ColumnLayout {
    /// Resolves column names to positions.
    ///
    /// # Errors
    ///
    /// `StageError::InvalidColumn` naming the first requested column that is
    /// not in `columns`. The image data column is optional.
    pub fn resolve<S: AsRef<str>>(
        columns: &[String],
        label_columns: &[S],
        image_id_column: &str,
        filepath_column: &str,
        data_column: &str,
    ) -> Result<Self> {
        let index: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let position = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| StageError::InvalidColumn(name.to_string()))
        };

        let labels = label_columns
            .iter()
            .map(|name| position(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            image_id: position(image_id_column)?,
            filepath: position(filepath_column)?,
            image_data: index.get(data_column).copied(),
            labels,
        })
    }
}

/// All label lines of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLabels {
    /// Text form of the image id, used as the output file stem
    pub image_id: String,
    pub filepath: String,
    pub image_data: Option<Vec<u8>>,
    pub lines: Vec<String>,
}

impl ImageLabels {
    /// `<id>.<ext>`, taking the extension from the final dot segment of the
    /// source file name.
    ///
    /// A name that is only an extension (`.jpg`) still yields `jpg`.
    pub fn image_file_name(&self) -> String {
        let name = Path::new(&self.filepath)
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!("{}.{}", self.image_id, ext),
            _ => self.image_id.clone(),
        }
    }

    pub fn label_file_name(&self) -> String {
        format!("{}.txt", self.image_id)
    }

    /// Label file body: every line newline-terminated.
    pub fn label_text(&self) -> String {
        self.lines.iter().map(|line| format!("{}\n", line)).collect()
    }
}

/// Groups rows by image id in first-seen order.
///
/// The filepath and image bytes come from the first row of each image; each
/// row contributes one line of its label values joined by single spaces.
pub fn group_rows(rows: &[Row], layout: &ColumnLayout) -> Result<Vec<ImageLabels>> {
    let mut groups: Vec<ImageLabels> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let cell = |idx: usize| {
            row.get_index(idx).ok_or_else(|| {
                StageError::Internal(format!("Row has no column at position {}", idx))
            })
        };

        let image_id = cell(layout.image_id)?.to_string();
        let line = layout
            .labels
            .iter()
            .map(|&idx| cell(idx).map(Value::to_string))
            .collect::<Result<Vec<_>>>()?
            .join(" ");

        if let Some(&pos) = seen.get(&image_id) {
            groups[pos].lines.push(line);
            continue;
        }

        let image_data = match layout.image_data {
            Some(idx) => cell(idx)?.as_bytes().map(<[u8]>::to_vec),
            None => None,
        };
        seen.insert(image_id.clone(), groups.len());
        groups.push(ImageLabels {
            image_id,
            filepath: cell(layout.filepath)?.to_string(),
            image_data,
            lines: vec![line],
        });
    }

    Ok(groups)
}

/// Writes grouped images and labels under `output`.
///
/// Creates `images/` and `labels/` as needed. Label files are overwritten.
/// Image bytes come from the stored data when the result carried it,
/// otherwise the local file at the row's filepath is copied.
///
/// # Errors
///
/// `StageError::MissingFile` when an image has no stored data and its
/// filepath does not exist locally.
pub async fn materialize(groups: &[ImageLabels], output: &Path) -> Result<ExportSummary> {
    let images_dir = output.join("images");
    let labels_dir = output.join("labels");
    tokio::fs::create_dir_all(&images_dir).await?;
    tokio::fs::create_dir_all(&labels_dir).await?;

    info!(images = groups.len(), "Writing images");
    for group in groups.iter().progress_with(progress_bar(groups.len(), "images")) {
        let target = images_dir.join(group.image_file_name());
        match &group.image_data {
            Some(bytes) => tokio::fs::write(&target, bytes).await?,
            None => {
                let source = PathBuf::from(&group.filepath);
                if !source.is_file() {
                    return Err(StageError::MissingFile(source));
                }
                tokio::fs::copy(&source, &target).await?;
            }
        }
        debug!(image = %target.display(), "Image written");
    }

    info!("Writing labels");
    let mut label_lines = 0;
    for group in groups.iter().progress_with(progress_bar(groups.len(), "labels")) {
        tokio::fs::write(labels_dir.join(group.label_file_name()), group.label_text()).await?;
        label_lines += group.lines.len();
    }

    Ok(ExportSummary {
        images: groups.len(),
        label_lines,
        output: output.to_path_buf(),
    })
}
