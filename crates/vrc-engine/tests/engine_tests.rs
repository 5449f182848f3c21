//! Engine integration tests against the in-process backend.

mod common;

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use common::{dir_entries, write_fake_video, FakeBackend, TranscodeMode};
use vrc_engine::{
    Action, CancelHandle, EngineConfig, InvocationOptions, MediaBackend, Recompressor,
};

const MB: usize = 1_000_000;

fn settings(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("settings must be an object"),
    }
}

fn engine(backend: Arc<FakeBackend>) -> Recompressor {
    Recompressor::with_backend(EngineConfig::default(), backend)
}

#[tokio::test]
async fn test_small_within_bounds_passes_through_byte_identical() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out/result.mp4");
    write_fake_video(&input, 640, 480, 2 * MB);

    let backend = Arc::new(FakeBackend::new());
    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&progress);
    let options = InvocationOptions::default().with_progress(move |f| seen.lock().unwrap().push(f));

    let result = engine(Arc::clone(&backend))
        .process_video_with(&input, &output, &Map::new(), options)
        .await
        .unwrap();

    assert_eq!(result.action, Action::Passthrough);
    assert_eq!(result.output_path, output);
    assert_eq!(result.final_info.size_bytes, result.original_info.size_bytes);
    assert_eq!((result.final_info.width, result.final_info.height), (640, 480));
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
    assert_eq!(backend.transcode_count(), 0);
    assert_eq!(progress.lock().unwrap().last().copied(), Some(1.0));
    assert_eq!(dir_entries(output.parent().unwrap()), vec!["result.mp4"]);
}

#[tokio::test]
async fn test_passthrough_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 320, 240, 100_000);

    let engine = engine(Arc::new(FakeBackend::new()));
    let first = engine.process_video(&input, &output, &Map::new()).await.unwrap();
    let first_bytes = std::fs::read(&output).unwrap();
    let second = engine.process_video(&input, &output, &Map::new()).await.unwrap();

    assert_eq!(first.action, second.action);
    assert_eq!(first.final_info, second.final_info);
    assert_eq!(std::fs::read(&output).unwrap(), first_bytes);
    assert_ne!(first.invocation_id, second.invocation_id);
}

#[tokio::test]
async fn test_full_hd_is_recompressed_within_bounds() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);

    let backend = Arc::new(FakeBackend::new());
    let engine = engine(Arc::clone(&backend));
    let result = engine.process_video(&input, &output, &Map::new()).await.unwrap();

    assert_eq!(result.action, Action::Recompress);
    assert_eq!((result.final_info.width, result.final_info.height), (1280, 720));
    assert!(result.final_info.size_bytes < result.original_info.size_bytes);
    assert!(result.processing_time_ms >= 0.0);

    let produced = assert_ok!(backend.probe(&output).await);
    assert!(produced.width <= 1280 && produced.height <= 720);

    let job = backend.last_job().unwrap();
    assert_eq!((job.width, job.height), (1280, 720));
    assert_ne!(job.output, output, "FFmpeg must write to a staging file");
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4", "out.mp4"]);
}

#[tokio::test]
async fn test_large_file_within_bounds_is_recompressed() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 640, 480, 6 * MB);

    let result = engine(Arc::new(FakeBackend::new()))
        .process_video(&input, &output, &Map::new())
        .await
        .unwrap();

    assert_eq!(result.action, Action::Recompress);
    assert_eq!((result.final_info.width, result.final_info.height), (640, 480));
}

#[tokio::test]
async fn test_threshold_comes_from_config() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 640, 480, 2 * MB);

    let config = EngineConfig {
        size_threshold_bytes: MB as u64,
        ..EngineConfig::default()
    };
    let result = Recompressor::with_backend(config, Arc::new(FakeBackend::new()))
        .process_video(&input, &output, &Map::new())
        .await
        .unwrap();

    assert_eq!(result.action, Action::Recompress);
}

#[tokio::test]
async fn test_settings_reach_the_transcoder() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 1080, 1920, 3 * MB);

    let backend = Arc::new(FakeBackend::new());
    let result = engine(Arc::clone(&backend))
        .process_video(
            &input,
            &output,
            &settings(json!({
                "maxWidth": "720",
                "maxHeight": 1280,
                "videoCodec": "hevc",
                "quality": 0.5,
                "optimizeForNetwork": true,
                "somethingElse": [1, 2, 3]
            })),
        )
        .await
        .unwrap();

    assert_eq!((result.final_info.width, result.final_info.height), (720, 1280));
    let job = backend.last_job().unwrap();
    assert_eq!(job.settings.video_codec.as_str(), "hevc");
    assert!(job.settings.optimize_for_network);
    assert_eq!(job.settings.effective_video_bitrate(), 400_000);
}

#[tokio::test]
async fn test_invalid_settings_produce_no_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out/out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);

    let backend = Arc::new(FakeBackend::new());
    let err = assert_err!(
        engine(Arc::clone(&backend))
            .process_video(&input, &output, &settings(json!({"quality": "abc"})))
            .await
    );

    assert_eq!(err.code(), "INVALID_SETTINGS");
    assert!(err.to_string().contains("quality"));
    assert!(!output.exists());
    assert!(dir_entries(&dir.path().join("out")).is_empty());
    assert_eq!(backend.transcode_count(), 0);
}

#[tokio::test]
async fn test_unit_dimension_bound_rejected_before_transcoding() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);

    let backend = Arc::new(FakeBackend::new());
    let err = assert_err!(
        engine(Arc::clone(&backend))
            .process_video(&input, &output, &settings(json!({"maxHeight": 1})))
            .await
    );

    assert_eq!(err.code(), "INVALID_SETTINGS");
    assert!(err.to_string().contains("maxHeight"));
    assert_eq!(backend.transcode_count(), 0);
    assert!(!output.exists());
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4"]);
}

#[tokio::test]
async fn test_rejects_out_of_range_settings() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    write_fake_video(&input, 640, 480, 1_000);
    let engine = engine(Arc::new(FakeBackend::new()));

    for bad in [
        json!({"maxWidth": 0}),
        json!({"videoBitrate": -5}),
        json!({"quality": 1.5}),
        json!({"videoCodec": "vp9"}),
        json!({"optimizeForNetwork": "maybe"}),
    ] {
        let err = engine
            .process_video(&input, dir.path().join("out.mp4"), &settings(bad.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SETTINGS", "{bad}");
    }
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4"]);
}

#[tokio::test]
async fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let err = engine(Arc::new(FakeBackend::new()))
        .process_video(dir.path().join("nope.mp4"), dir.path().join("out.mp4"), &Map::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FILE_NOT_FOUND");
    assert_eq!(dir_entries(dir.path()), Vec::<String>::new());
}

#[tokio::test]
async fn test_unreadable_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, b"just some text").unwrap();

    let err = engine(Arc::new(FakeBackend::new()))
        .process_video(&input, dir.path().join("out.mp4"), &Map::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "UNREADABLE_MEDIA");
    assert_eq!(dir_entries(dir.path()), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_transcode_failure_leaves_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);

    let err = engine(Arc::new(FakeBackend::new().with_mode(TranscodeMode::Fail)))
        .process_video(&input, &output, &Map::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "TRANSCODE_ERROR");
    assert!(err.to_string().contains("Conversion failed!"));
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4"]);
}

#[tokio::test]
async fn test_out_of_bounds_output_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);

    let err = engine(Arc::new(FakeBackend::new().with_mode(TranscodeMode::IgnoreScale)))
        .process_video(&input, &output, &Map::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "TRANSCODE_ERROR");
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4"]);
}

#[tokio::test]
async fn test_existing_output_survives_failure() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);
    std::fs::write(&output, b"previous result").unwrap();

    let err = engine(Arc::new(FakeBackend::new().with_mode(TranscodeMode::Fail)))
        .process_video(&input, &output, &Map::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "TRANSCODE_ERROR");
    assert_eq!(std::fs::read(&output).unwrap(), b"previous result");
}

#[tokio::test]
async fn test_cancel_mid_recompress_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    let out_dir = dir.path().join("out");
    let output = out_dir.join("out.mp4");
    write_fake_video(&input, 1920, 1080, 8 * MB);

    let backend = Arc::new(FakeBackend::new().with_delay(Duration::from_secs(30)));
    let engine = engine(Arc::clone(&backend));
    let cancel = CancelHandle::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        engine.process_video_with(
            &input,
            &output,
            &Map::new(),
            InvocationOptions::default().with_cancel(cancel.signal()),
        ),
    )
    .await
    .expect("cancellation should be prompt")
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.code(), "CANCELLED");
    assert_eq!(backend.transcode_count(), 1);
    assert!(dir_entries(&out_dir).is_empty());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    write_fake_video(&input, 640, 480, 1_000);

    let cancel = CancelHandle::new();
    cancel.cancel();

    let backend = Arc::new(FakeBackend::new());
    let err = engine(Arc::clone(&backend))
        .process_video_with(
            &input,
            dir.path().join("out.mp4"),
            &Map::new(),
            InvocationOptions::default().with_cancel(cancel.signal()),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4"]);
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::new().with_delay(Duration::from_millis(50)));
    let engine = engine(Arc::clone(&backend));

    let mut handles = Vec::new();
    for i in 0..4 {
        let input = dir.path().join(format!("in{i}.mp4"));
        let output = dir.path().join(format!("out{i}.mp4"));
        write_fake_video(&input, 1920, 1080, 8 * MB);

        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.process_video(&input, &output, &Map::new()).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.action, Action::Recompress);
        assert!(result.output_path.exists());
    }
    assert_eq!(backend.transcode_count(), 4);
    assert!(backend.max_parallel() > 1);
}

#[tokio::test]
async fn test_analyze_and_capabilities() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.mp4");
    write_fake_video(&input, 1280, 720, 5_000);

    let engine = engine(Arc::new(FakeBackend::new()));
    let info = engine.analyze_video(&input).await.unwrap();
    assert_eq!((info.width, info.height), (1280, 720));
    assert_eq!(info.size_bytes, 5_000);
    assert_eq!(dir_entries(dir.path()), vec!["in.mp4"]);

    let caps = engine.capabilities();
    assert_eq!(caps.engine, "vrc (fake)");
    assert!(caps.video_codecs.contains(&"hevc".to_string()));
}
