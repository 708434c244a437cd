//! BDD100K label import.
//!
//! Reads the BDD100K frame-label JSON, stores each frame's image through
//! [`Session::insert_with_image`] and one label row per box with YOLO
//! normalized coordinates.

use anyhow::{Context, Result};
use imgstage_postgres::{Session, Value};
use indicatif::ProgressIterator;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_DATASET: &str = "bdd100k";

/// One frame of the label file.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub name: String,
    /// Absent for frames that were never annotated
    #[serde(default)]
    pub labels: Option<Vec<Annotation>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Annotation {
    pub category: String,
    /// Only box categories carry one; lanes and drivable areas use polygons
    #[serde(default)]
    pub box2d: Option<Box2d>,
}

/// Pixel-space corners.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Box2d {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Center and size as fractions of the image resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Box2d {
    pub fn normalize(&self, image_width: u32, image_height: u32) -> YoloBox {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        YoloBox {
            center_x: (self.x1 + self.x2) / (2.0 * w),
            center_y: (self.y1 + self.y2) / (2.0 * h),
            width: (self.x2 - self.x1).abs() / w,
            height: (self.y2 - self.y1).abs() / h,
        }
    }
}

/// Training class of a BDD100K category. Categories outside the four
/// trained classes are skipped.
pub fn class_id(category: &str) -> Option<i32> {
    match category {
        "pedestrian" => Some(0),
        "car" | "truck" | "bus" | "motor" => Some(1),
        "traffic light" => Some(2),
        "traffic sign" => Some(3),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Directory the frame names are relative to
    pub images_dir: PathBuf,
    pub images_table: String,
    pub labels_table: String,
    pub dataset: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub frames: usize,
    pub images: usize,
    pub labels: usize,
    /// Frames without labels or without an image file
    pub skipped: usize,
}

pub fn load_frames(path: &Path) -> Result<Vec<Frame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read label file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse label file {}", path.display()))
}

/// Label row for one annotation, or `None` when it is not a trained box.
pub fn label_row(
    annotation: &Annotation,
    image_id: i64,
    options: &ImportOptions,
) -> Option<Vec<(String, Value)>> {
    let class_id = class_id(&annotation.category)?;
    let yolo = annotation.box2d?.normalize(options.width, options.height);

    Some(vec![
        ("class_id".to_string(), Value::Int(class_id)),
        ("class".to_string(), Value::from(annotation.category.as_str())),
        ("center_norm_x".to_string(), Value::Double(yolo.center_x)),
        ("center_norm_y".to_string(), Value::Double(yolo.center_y)),
        ("width_norm".to_string(), Value::Double(yolo.width)),
        ("height_norm".to_string(), Value::Double(yolo.height)),
        ("image_id".to_string(), Value::BigInt(image_id)),
        ("dataset".to_string(), Value::from(options.dataset.as_str())),
    ])
}

/// Imports every labelled frame whose image exists, then commits.
#[instrument(skip(session, frames, options), fields(frames = frames.len()))]
pub async fn import(
    session: &mut Session,
    frames: &[Frame],
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        frames: frames.len(),
        ..Default::default()
    };

    for frame in frames.iter().progress_count(frames.len() as u64) {
        let Some(annotations) = &frame.labels else {
            summary.skipped += 1;
            continue;
        };

        let image_path = options.images_dir.join(&frame.name);
        if !image_path.is_file() {
            debug!(image = %image_path.display(), "Image file not found");
            summary.skipped += 1;
            continue;
        }

        let mut image = vec![
            ("x_res".to_string(), Value::Int(options.width as i32)),
            ("y_res".to_string(), Value::Int(options.height as i32)),
            (
                "filepath".to_string(),
                Value::String(image_path.to_string_lossy().into_owned()),
            ),
        ];
        let image_id = session
            .insert_with_image(&options.images_table, &mut image, "image_id")
            .await
            .with_context(|| format!("Failed to store image {}", frame.name))?;
        summary.images += 1;

        for annotation in annotations {
            let Some(mut row) = label_row(annotation, image_id, options) else {
                continue;
            };
            session
                .insert(&options.labels_table, &mut row)
                .await
                .with_context(|| format!("Failed to store label of {}", frame.name))?;
            summary.labels += 1;
        }
    }

    session.commit().await.context("Failed to commit imported labels")?;

    info!(
        images = summary.images,
        labels = summary.labels,
        skipped = summary.skipped,
        "BDD100K import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ImportOptions {
        ImportOptions {
            images_dir: PathBuf::from("bdd100k/images/10k/train"),
            images_table: "test_images".to_string(),
            labels_table: "test_bb_labels".to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    #[test]
    fn test_class_map() {
        assert_eq!(class_id("pedestrian"), Some(0));
        for vehicle in ["car", "truck", "bus", "motor"] {
            assert_eq!(class_id(vehicle), Some(1));
        }
        assert_eq!(class_id("traffic light"), Some(2));
        assert_eq!(class_id("traffic sign"), Some(3));
        assert_eq!(class_id("rider"), None);
        assert_eq!(class_id("lane"), None);
    }

    #[test]
    fn test_normalize_box() {
        let b = Box2d {
            x1: 320.0,
            y1: 180.0,
            x2: 960.0,
            y2: 540.0,
        };
        let yolo = b.normalize(1280, 720);
        assert_eq!(yolo.center_x, 0.5);
        assert_eq!(yolo.center_y, 0.5);
        assert_eq!(yolo.width, 0.5);
        assert_eq!(yolo.height, 0.5);

        // reversed corners give the same size
        let flipped = Box2d {
            x1: 960.0,
            y1: 540.0,
            x2: 320.0,
            y2: 180.0,
        };
        assert_eq!(flipped.normalize(1280, 720), yolo);
    }

    #[test]
    fn test_parse_frames() {
        let json = r#"[
            {"name": "a.jpg", "attributes": {"weather": "clear"}, "labels": [
                {"category": "car", "box2d": {"x1": 0.0, "y1": 0.0, "x2": 128.0, "y2": 72.0}},
                {"category": "lane", "poly2d": []}
            ]},
            {"name": "b.jpg"}
        ]"#;
        let frames: Vec<Frame> = serde_json::from_str(json).unwrap();
        assert_eq!(frames.len(), 2);

        let labels = frames[0].labels.as_ref().unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels[1].box2d.is_none());
        assert!(frames[1].labels.is_none());
    }

    #[test]
    fn test_label_row() {
        let annotation = Annotation {
            category: "traffic sign".to_string(),
            box2d: Some(Box2d {
                x1: 0.0,
                y1: 0.0,
                x2: 128.0,
                y2: 72.0,
            }),
        };
        let row = label_row(&annotation, 42, &options()).unwrap();
        let columns: Vec<_> = row.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            columns,
            vec![
                "class_id",
                "class",
                "center_norm_x",
                "center_norm_y",
                "width_norm",
                "height_norm",
                "image_id",
                "dataset"
            ]
        );
        assert_eq!(row[0].1, Value::Int(3));
        assert_eq!(row[2].1, Value::Double(0.05));
        assert_eq!(row[4].1, Value::Double(0.1));
        assert_eq!(row[6].1, Value::BigInt(42));
        assert_eq!(row[7].1, Value::from("bdd100k"));
    }

    #[test]
    fn test_label_row_skips_untrained() {
        let unknown = Annotation {
            category: "rider".to_string(),
            box2d: Some(Box2d {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 1.0,
            }),
        };
        assert!(label_row(&unknown, 1, &options()).is_none());

        let no_box = Annotation {
            category: "car".to_string(),
            box2d: None,
        };
        assert!(label_row(&no_box, 1, &options()).is_none());
    }

    #[test]
    fn test_load_frames_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"[{"name": "a.jpg", "labels": []}]"#).unwrap();

        let frames = load_frames(&path).unwrap();
        assert_eq!(frames[0].name, "a.jpg");
        assert!(load_frames(&dir.path().join("missing.json")).is_err());
    }
}
