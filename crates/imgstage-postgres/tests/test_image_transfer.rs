//! Integration tests for image upload, download records and queued uploads.
//!
//! These tests require a PostgreSQL database to be running.
//! Set DATABASE_URL and run with `--ignored`.

use imgstage_postgres::{DownloadOutcome, ImageTable, Session, SessionConfig, StageError, Value};
use std::path::Path;

async fn open_session(table: &str, download_log: &Path) -> Session {
    let uri = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/test_db".to_string());
    let config = SessionConfig::default()
        .images_table(ImageTable::named(table).unwrap())
        .download_log(download_log);
    Session::open(&uri, config).await.unwrap()
}

async fn create_images_table(session: &mut Session, table: &str) {
    session
        .execute(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                 image_id SERIAL PRIMARY KEY,
                 x_res INTEGER,
                 y_res INTEGER,
                 image_data BYTEA,
                 filepath TEXT
             )"
        ))
        .await
        .unwrap();
    session.commit().await.unwrap();
}

#[tokio::test]
#[ignore] // Only run with --ignored flag when database is available
async fn test_upload_then_download_record() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("records.txt");
    let mut session = open_session("it_images", &log).await;
    create_images_table(&mut session, "it_images").await;

    let frame = dir.path().join("a.jpg");
    std::fs::write(&frame, vec![7u8; 2048]).unwrap();
    session
        .upload(&frame, "remote/images", "a.jpg")
        .await
        .unwrap();

    let key = frame.to_str().unwrap();
    let outcome = session.download(key).await.unwrap();
    let record = match outcome {
        DownloadOutcome::Written(record) => record,
        DownloadOutcome::NotFound => panic!("Uploaded image should be found"),
    };
    assert_eq!(record.data_size, 2048);
    assert_eq!(record.x_res, Value::Null);
    assert_eq!(record.filepath, key);

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.starts_with("Image ID: "));
    assert!(text.contains("X Resolution: NULL\n"));
    assert!(text.contains("Image Data Size: 2048 bytes\n"));
    assert!(text.ends_with(&format!("Filepath: {}\n{}\n", key, "-".repeat(30))));

    // a second download appends
    session.download(key).await.unwrap();
    let text = std::fs::read_to_string(&log).unwrap();
    assert_eq!(text.matches("Image ID: ").count(), 2);

    session.execute("DROP TABLE it_images").await.unwrap();
    session.commit().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_download_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("records.txt");
    let mut session = open_session("it_images_miss", &log).await;
    create_images_table(&mut session, "it_images_miss").await;

    let outcome = session.download("does/not/exist.jpg").await.unwrap();
    assert_eq!(outcome, DownloadOutcome::NotFound);
    assert!(!log.exists());

    session.execute("DROP TABLE it_images_miss").await.unwrap();
    session.commit().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_upload_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open_session("it_images_nofile", &dir.path().join("log.txt")).await;
    create_images_table(&mut session, "it_images_nofile").await;

    let err = session
        .upload(&dir.path().join("gone.jpg"), "remote", "gone.jpg")
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::MissingFile(_)));

    session.execute("DROP TABLE it_images_nofile").await.unwrap();
    session.commit().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_queued_uploads_flush_on_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open_session("it_images_queue", &dir.path().join("log.txt")).await;
    create_images_table(&mut session, "it_images_queue").await;

    let first = dir.path().join("first.jpg");
    let second = dir.path().join("second.jpg");
    std::fs::write(&first, b"first").unwrap();
    std::fs::write(&second, b"second").unwrap();

    session.queue_upload(&first, "remote", "first.jpg");
    session.queue_upload(dir.path().join("missing.jpg"), "remote", "missing.jpg");
    session.queue_upload(&second, "remote", "second.jpg");
    assert_eq!(session.pending_uploads().len(), 3);

    // the missing file stops the flush; it and everything after stay queued
    let err = session.commit().await.unwrap_err();
    assert!(matches!(err, StageError::MissingFile(_)));
    let pending: Vec<_> = session
        .pending_uploads()
        .iter()
        .map(|upload| upload.remote_name.as_str())
        .collect();
    assert_eq!(pending, vec!["missing.jpg", "second.jpg"]);

    let rows = session
        .execute("SELECT filepath FROM it_images_queue")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("filepath").unwrap(),
        &Value::from(first.to_str().unwrap())
    );

    // the drop commits before the flush trips over the missing file again
    session.execute("DROP TABLE it_images_queue").await.unwrap();
    assert!(session.commit().await.is_err());
    assert_eq!(session.pending_uploads().len(), 2);
}
