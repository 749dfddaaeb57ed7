//! Integration tests for the recorder lifecycle.

use std::time::Duration;
use streamtap_core::{
    ChannelPublisher, ChannelSubscription, FileSegmentStore, InMemorySegmentStore,
    LifecycleState, Recorder, RecorderConfig, SegmentStore, ShutdownHandle, ShutdownSignal,
};
use tempfile::tempdir;

fn config() -> RecorderConfig {
    RecorderConfig::new()
        .topic("tt_data")
        .max_segment_size(1024)
        .stats_interval(Duration::from_secs(1))
}

fn memory_recorder(
    config: RecorderConfig,
) -> (
    Recorder<ChannelSubscription>,
    ChannelPublisher,
    InMemorySegmentStore,
) {
    let store = InMemorySegmentStore::new();
    let (publisher, subscription) = ChannelSubscription::new(64);
    let recorder = Recorder::start(config, Box::new(store.clone()), subscription).unwrap();
    (recorder, publisher, store)
}

#[tokio::test(start_paused = true)]
async fn stats_report_interval_then_idle() {
    let (recorder, publisher, _store) = memory_recorder(config());
    let mut snapshots = recorder.subscribe_stats();
    let shutdown = ShutdownHandle::new();

    for payload in ["aa", "bbbb", "cccccc"] {
        publisher.publish("tt_data", payload).await.unwrap();
    }
    let task = tokio::spawn(recorder.run(shutdown.clone()));

    let first = snapshots.recv().await.unwrap();
    assert_eq!((first.messages, first.bytes), (3, 12));
    assert_eq!(first.segment_size, 12);

    let second = snapshots.recv().await.unwrap();
    assert_eq!((second.messages, second.bytes), (0, 0));
    assert_eq!(second.segment_size, 12);

    shutdown.trigger(ShutdownSignal::SigInt);
    let summary = task.await.unwrap();
    assert_eq!(summary.messages_recorded, 3);
    drop(publisher);
}

#[tokio::test]
async fn shutdown_under_load_closes_every_segment_once() {
    let (recorder, publisher, store) = memory_recorder(config().max_segment_size(100));
    let shutdown = ShutdownHandle::new();
    let states = recorder.state_watcher();

    let producer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            for i in 0u32.. {
                if i == 5_000 {
                    shutdown.trigger(ShutdownSignal::SigTerm);
                }
                let payload = format!("message-{i}");
                if publisher.publish("tt_data", payload).await.is_err() {
                    break;
                }
            }
        })
    };

    let summary = recorder.run(shutdown).await;
    producer.await.unwrap();

    assert_eq!(*states.borrow(), LifecycleState::Stopped);
    assert_eq!(summary.messages_dropped, 0);
    assert_eq!(summary.segments_opened, summary.segments_closed);

    let segments = store.segments();
    assert!(segments.len() > 1);
    let total: u64 = segments.iter().map(|(_, b)| b.data().len() as u64).sum();
    assert_eq!(total, summary.bytes_written);
    for (name, backend) in &segments {
        assert!(backend.is_closed(), "segment {name} left open");
        assert_eq!(backend.close_count(), 1, "segment {name} closed twice");
    }
}

#[tokio::test]
async fn second_trigger_is_ignored() {
    let (recorder, _publisher, store) = memory_recorder(config());
    let shutdown = ShutdownHandle::new();

    assert!(shutdown.trigger(ShutdownSignal::SigInt));
    assert!(!shutdown.trigger(ShutdownSignal::SigTerm));

    let summary = recorder.run(shutdown.clone()).await;
    assert_eq!(shutdown.signal(), Some(ShutdownSignal::SigInt));
    assert_eq!(summary.segments_closed, 1);
    assert_eq!(store.backend(0).unwrap().close_count(), 1);
}

#[tokio::test]
async fn write_failure_continues_in_new_segment() {
    let (recorder, publisher, store) = memory_recorder(config());
    store.backend(0).unwrap().fail_next_appends(1);

    publisher.publish("tt_data", "lost").await.unwrap();
    publisher.publish("tt_data", "kept").await.unwrap();
    drop(publisher);

    let summary = recorder.run(ShutdownHandle::new()).await;
    assert_eq!(summary.messages_dropped, 1);
    assert_eq!(summary.messages_recorded, 1);

    let first = store.backend(0).unwrap();
    let second = store.backend(1).unwrap();
    assert!(first.data().is_empty());
    assert_eq!(first.close_count(), 1);
    assert_eq!(second.data(), b"kept");
}

#[tokio::test]
async fn receive_errors_and_foreign_topics_do_not_stop_recording() {
    let (recorder, publisher, store) = memory_recorder(config());

    publisher.publish("tt_data", "one").await.unwrap();
    publisher.fail("connection reset").await.unwrap();
    publisher.publish("other", "skipped").await.unwrap();
    publisher.publish("tt_data.sub", "two").await.unwrap();
    drop(publisher);

    let summary = recorder.run(ShutdownHandle::new()).await;
    assert_eq!(summary.receive_errors, 1);
    assert_eq!(summary.messages_filtered, 1);
    assert_eq!(store.backend(0).unwrap().data(), b"onetwo");
}

#[tokio::test]
async fn records_to_disk_and_resumes_numbering() {
    let dir = tempdir().unwrap();
    let config = config().output_dir(dir.path()).max_segment_size(8);

    let (publisher, subscription) = ChannelSubscription::new(16);
    let store = FileSegmentStore::new(dir.path());
    let recorder = Recorder::start(config.clone(), Box::new(store.clone()), subscription).unwrap();
    for payload in ["0000", "1111", "2222", "3333", "4444"] {
        publisher.publish("tt_data", payload).await.unwrap();
    }
    drop(publisher);
    recorder.run(ShutdownHandle::new()).await;

    let listed = store.list().unwrap();
    let layout: Vec<(u64, u64)> = listed
        .iter()
        .map(|info| (info.name.sequence(), info.size))
        .collect();
    assert_eq!(layout, vec![(0, 8), (1, 8), (2, 4)]);

    let mut contents = Vec::new();
    for info in &listed {
        let path = info.path.as_ref().unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("data_") && file_name.ends_with(".bin"));
        contents.extend(std::fs::read(path).unwrap());
    }
    assert_eq!(contents, b"00001111222233334444");

    // A second run into the same directory continues the numbering.
    let (_publisher, subscription) = ChannelSubscription::new(1);
    let recorder = Recorder::start(config, Box::new(store.clone()), subscription).unwrap();
    assert_eq!(recorder.active_segment().unwrap().sequence(), 3);
}

#[tokio::test]
async fn unusable_output_dir_fails_start() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let (_publisher, subscription) = ChannelSubscription::new(1);
    let result = Recorder::start(
        config().output_dir(&blocker),
        Box::new(FileSegmentStore::new(&blocker)),
        subscription,
    );
    assert!(result.is_err());
}
