//! Persisted buffer files under damage and across event types

use sluice_codec::{CodecContext, ContentFormat, FileHeader};
use sluice_core::{AccessEvent, Level, LoggingEvent};
use sluice_storage::{EventFileConfig, EventFileReader, EventFileWriter, StorageError};
use tempfile::TempDir;

fn event(i: usize) -> LoggingEvent {
    LoggingEvent {
        timestamp: Some(1_700_000_000_000 + i as i64),
        ..LoggingEvent::new("damage", Level::Warn, format!("record {}", i))
    }
}

#[tokio::test]
async fn test_truncated_tail_is_dropped_and_overwritten() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("damaged.sluice");
    let codecs = CodecContext::new();
    let config = EventFileConfig::default().with_format(ContentFormat::Json);

    let writer = EventFileWriter::<LoggingEvent>::create(&path, config.clone(), &codecs)
        .await
        .unwrap();
    for i in 0..3 {
        writer.append(&event(i)).await.unwrap();
    }
    writer.close().await.unwrap();

    // Chop the last record in half.
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let mut reader = EventFileReader::<LoggingEvent>::open(&path, &codecs)
        .await
        .unwrap();
    let replayed = reader.read_all().await.unwrap();
    assert_eq!(replayed, vec![event(0), event(1)]);

    let writer = EventFileWriter::<LoggingEvent>::open(&path, config, &codecs)
        .await
        .unwrap();
    assert_eq!(writer.records(), 2);
    writer.append(&event(3)).await.unwrap();
    writer.close().await.unwrap();

    let mut reader = EventFileReader::<LoggingEvent>::open(&path, &codecs)
        .await
        .unwrap();
    assert_eq!(
        reader.read_all().await.unwrap(),
        vec![event(0), event(1), event(3)]
    );
}

#[tokio::test]
async fn test_undecodable_record_is_skipped() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("garbage.sluice");
    let codecs = CodecContext::new();

    // Header for JSON records, then one valid record, one garbage record, one valid record.
    let mut bytes = FileHeader::new(sluice_codec::ContentType::Logging, ContentFormat::Json, false)
        .to_bytes()
        .to_vec();
    for payload in [
        serde_json::to_vec(&event(0)).unwrap(),
        b"{not json".to_vec(),
        serde_json::to_vec(&event(2)).unwrap(),
    ] {
        bytes.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        bytes.extend_from_slice(&payload);
    }
    std::fs::write(&path, bytes).unwrap();

    let mut reader = EventFileReader::<LoggingEvent>::open(&path, &codecs)
        .await
        .unwrap();
    assert_eq!(reader.read_all().await.unwrap(), vec![event(0), event(2)]);
    assert_eq!(reader.records(), 3);
    assert_eq!(reader.skipped(), 1);
}

#[tokio::test]
async fn test_reader_checks_content_type() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("access.sluice");
    let codecs = CodecContext::new();

    let writer = EventFileWriter::<AccessEvent>::create(&path, EventFileConfig::default(), &codecs)
        .await
        .unwrap();
    writer
        .append(&AccessEvent {
            status_code: Some(200),
            ..Default::default()
        })
        .await
        .unwrap();
    writer.close().await.unwrap();

    let wrong = EventFileReader::<LoggingEvent>::open(&path, &codecs).await;
    assert!(matches!(wrong, Err(StorageError::InvalidHeader(_))));

    let mut right = EventFileReader::<AccessEvent>::open(&path, &codecs)
        .await
        .unwrap();
    assert_eq!(right.read_all().await.unwrap()[0].status_code, Some(200));
}

#[tokio::test]
async fn test_not_an_event_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("plain.txt");
    std::fs::write(&path, b"just some text, not a buffer file").unwrap();

    let result = EventFileReader::<LoggingEvent>::open(&path, &CodecContext::new()).await;
    assert!(matches!(result, Err(StorageError::InvalidHeader(_))));
}
