//! Replaying persisted buffer files through a producer

use std::path::PathBuf;
use std::sync::Arc;

use sluice_codec::{CodecContext, ContentFormat};
use sluice_core::{AccessEvent, EventWrapper, Level, LoggingEvent};
use sluice_ingest::{FileSource, IngestError, ProducerState};
use sluice_storage::{CircularBuffer, EventFileConfig, EventFileWriter, StorageError};
use tempfile::TempDir;

fn event(i: usize) -> LoggingEvent {
    LoggingEvent {
        timestamp: Some(1_700_000_000_000 + i as i64),
        ..LoggingEvent::new("replay", Level::Error, format!("failure {}", i))
    }
}

async fn write_file(dir: &TempDir, name: &str, config: EventFileConfig, count: usize) -> PathBuf {
    let path = dir.path().join(name);
    let writer = EventFileWriter::<LoggingEvent>::create(&path, config, &CodecContext::new())
        .await
        .unwrap();
    for i in 0..count {
        writer.append(&event(i)).await.unwrap();
    }
    writer.close().await.unwrap();
    path
}

#[tokio::test]
async fn test_replay_compressed_xml_file() {
    let dir = TempDir::new().unwrap();
    let config = EventFileConfig::default()
        .with_format(ContentFormat::Xml)
        .with_compression(true);
    let path = write_file(&dir, "app.sluice", config, 4).await;

    let buffer = Arc::new(CircularBuffer::<EventWrapper<LoggingEvent>>::new(100));
    let source = FileSource::<LoggingEvent>::open(&path, &CodecContext::new(), buffer.clone())
        .await
        .unwrap();
    assert_eq!(source.header().content_format().unwrap(), ContentFormat::Xml);
    assert!(source.header().compressed());
    assert_eq!(source.source().identifier, "app.sluice");

    source.start().unwrap();
    source.join().await.unwrap();

    assert_eq!(source.state(), ProducerState::Closed);
    let items = buffer.snapshot();
    assert_eq!(items.len(), 5);
    let replayed: Vec<_> = items.iter().filter_map(|w| w.event.clone()).collect();
    assert_eq!(replayed, (0..4).map(event).collect::<Vec<_>>());
    assert_eq!(items[4].local_id(), 5);
    assert!(items[4].is_terminal());
    assert_eq!(source.stats().events, 4);
}

#[tokio::test]
async fn test_truncated_file_ends_in_failure_after_valid_records() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "cut.sluice", EventFileConfig::default(), 3).await;
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

    let buffer = Arc::new(CircularBuffer::<EventWrapper<LoggingEvent>>::new(100));
    let source = FileSource::<LoggingEvent>::open(&path, &CodecContext::new(), buffer.clone())
        .await
        .unwrap();
    source.start().unwrap();
    source.join().await.unwrap();

    assert_eq!(source.state(), ProducerState::Failed);
    let items = buffer.snapshot();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1].event, Some(event(1)));
    assert!(items[2].is_terminal());
}

#[tokio::test]
async fn test_wrong_event_type_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "logging.sluice", EventFileConfig::default(), 1).await;

    let buffer = Arc::new(CircularBuffer::<EventWrapper<AccessEvent>>::new(10));
    let result = FileSource::<AccessEvent>::open(&path, &CodecContext::new(), buffer).await;
    assert!(matches!(
        result,
        Err(IngestError::Storage(StorageError::InvalidHeader(_)))
    ));
}

#[tokio::test]
async fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let buffer = Arc::new(CircularBuffer::<EventWrapper<LoggingEvent>>::new(10));
    let result =
        FileSource::<LoggingEvent>::open(dir.path().join("nope.sluice"), &CodecContext::new(), buffer)
            .await;
    assert!(matches!(result, Err(IngestError::Io(_))));
}
