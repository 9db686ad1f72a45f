use super::*;
use crate::error::ClassifierError;
use crate::filename::VideoPath;
use crate::geometry::Polygon;
use crate::testing::{person, FakeVideo, FakeVideoOpener, ScriptedClassifier};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    incoming: PathBuf,
    outputs: OutputPaths,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let incoming = root.path().join("incoming");
        let outputs = OutputPaths {
            accepted: root.path().join("accepted"),
            rejected: root.path().join("rejected"),
            latest_detection: root.path().join("latest"),
            dead_letter: root.path().join("rejected/dead-letter"),
        };
        for dir in [
            &incoming,
            &outputs.accepted,
            &outputs.rejected,
            &outputs.latest_detection,
            &outputs.dead_letter,
        ] {
            fs::create_dir_all(dir).unwrap();
        }
        Self {
            _root: root,
            incoming,
            outputs,
        }
    }

    fn video(&self, file_name: &str) -> QueueEntry {
        let path = self.incoming.join(file_name);
        fs::write(&path, b"not really a video").unwrap();
        VideoPath::from_path(&path).unwrap()
    }

    fn processor(
        &self,
        classifier: ScriptedClassifier,
        opener: FakeVideoOpener,
    ) -> (VideoProcessor, Arc<ScriptedClassifier>) {
        let classifier = Arc::new(classifier);
        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let registry = CameraRegistry::new(vec![
            Camera::new("Garden", 0.55, None),
            Camera::new(
                "Side",
                0.5,
                Some(Polygon::from(vec![(0, 0), (100, 0), (100, 100), (0, 100)])),
            ),
        ])
        .unwrap();
        let decider = AdmissionDecider::new(["person"], 15, retry.clone(), Arc::new(opener));
        let processor = VideoProcessor::new(
            registry,
            decider,
            Arc::clone(&classifier) as Arc<dyn DetectionClient>,
            SnapshotWriter::new(true, false),
            self.outputs.clone(),
            retry,
        );
        (processor, classifier)
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn frames(total: u64) -> FakeVideoOpener {
    FakeVideoOpener::new(FakeVideo::Frames(total))
}

#[test]
fn test_person_on_frame_16_accepts_and_archives_snapshots() {
    let fx = Fixture::new();
    let (processor, classifier) = fx.processor(
        ScriptedClassifier::new()
            .then_detections(vec![])
            .then_detections(vec![person(0.90, 2, 2, 6, 6)]),
        frames(60),
    );

    let outcome = processor.process(&fx.video("Garden_00_20210511082721.mp4"));

    match &outcome {
        ProcessOutcome::Accepted {
            target,
            snapshots_written,
            snapshots_failed,
        } => {
            assert_eq!(
                *target,
                fx.outputs.accepted.join("2021-05-11 08-27-21 (Garden).mp4")
            );
            assert_eq!(*snapshots_written, 2);
            assert_eq!(*snapshots_failed, 0);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
    assert_eq!(classifier.thresholds(), vec![0.55, 0.55]);
    assert!(outcome.target().is_some_and(Path::exists));
    assert!(Fixture::files(&fx.incoming).is_empty());
    assert_eq!(
        Fixture::files(&fx.outputs.accepted),
        vec![
            "2021-05-11 08-27-21 (Garden).jpg",
            "2021-05-11 08-27-21 (Garden).mp4"
        ]
    );
    assert_eq!(
        Fixture::files(&fx.outputs.latest_detection),
        vec!["garden.jpg"]
    );
    assert_eq!(processor.stats().snapshot().accepted, 1);
}

#[test]
fn test_latest_snapshot_is_replaced_by_next_acceptance() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(
        ScriptedClassifier::new().otherwise(Ok(crate::detection::DetectionResponse::new(vec![
            person(0.9, 1, 1, 4, 4),
        ]))),
        frames(15),
    );
    fs::write(fx.outputs.latest_detection.join("garden.jpg"), b"old").unwrap();

    assert!(processor
        .process(&fx.video("Garden_00_20210101000000.mp4"))
        .is_accepted());
    assert!(processor
        .process(&fx.video("Garden_00_20210101000100.mp4"))
        .is_accepted());

    let latest = fs::read(fx.outputs.latest_detection.join("garden.jpg")).unwrap();
    assert_eq!(&latest[..2], &[0xFF, 0xD8]);
    assert_eq!(Fixture::files(&fx.outputs.accepted).len(), 4);
}

#[test]
fn test_detection_outside_roi_rejects_without_snapshot() {
    let fx = Fixture::new();
    let (processor, classifier) = fx.processor(
        ScriptedClassifier::new().otherwise(Ok(crate::detection::DetectionResponse::new(vec![
            person(0.95, 200, 200, 300, 300),
        ]))),
        frames(45),
    );

    let outcome = processor.process(&fx.video("Side_01_20210511082721.mp4"));

    assert!(matches!(outcome, ProcessOutcome::Rejected { .. }));
    assert_eq!(classifier.calls(), 3);
    assert_eq!(
        Fixture::files(&fx.outputs.rejected),
        vec!["2021-05-11 08-27-21 (Side).mp4"]
    );
    assert!(Fixture::files(&fx.outputs.latest_detection).is_empty());
    assert!(Fixture::files(&fx.outputs.accepted).is_empty());
}

#[test]
fn test_unknown_camera_is_error_routed_under_original_name() {
    let fx = Fixture::new();
    let (processor, classifier) = fx.processor(ScriptedClassifier::new(), frames(30));

    let outcome = processor.process(&fx.video("Unknown_00_20210511082721.mp4"));

    match &outcome {
        ProcessOutcome::ErrorRouted { target, reason } => {
            assert_eq!(
                *target,
                fx.outputs.rejected.join("Unknown_00_20210511082721.mp4")
            );
            assert!(reason.contains("Unknown"));
        }
        other => panic!("expected error routing, got {:?}", other),
    }
    assert_eq!(classifier.calls(), 0);
    assert_eq!(processor.stats().snapshot().error_routed, 1);
}

#[test]
fn test_unparseable_name_is_error_routed() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(ScriptedClassifier::new(), frames(30));

    let outcome = processor.process(&fx.video("holiday clip.mp4"));

    assert!(matches!(outcome, ProcessOutcome::ErrorRouted { .. }));
    assert_eq!(Fixture::files(&fx.outputs.rejected), vec!["holiday clip.mp4"]);
}

#[test]
fn test_undecodable_video_is_rejected() {
    let fx = Fixture::new();
    let (processor, classifier) = fx.processor(
        ScriptedClassifier::new(),
        frames(30).with_video("Garden_00_20210511082721.mp4", FakeVideo::Unreadable),
    );

    let outcome = processor.process(&fx.video("Garden_00_20210511082721.mp4"));

    assert!(matches!(outcome, ProcessOutcome::Rejected { .. }));
    assert_eq!(classifier.calls(), 0);
    assert_eq!(
        Fixture::files(&fx.outputs.rejected),
        vec!["2021-05-11 08-27-21 (Garden).mp4"]
    );
}

#[test]
fn test_unavailable_classifier_dead_letters() {
    let fx = Fixture::new();
    let (processor, classifier) = fx.processor(
        ScriptedClassifier::new().otherwise(Err(ClassifierError::Request {
            details: "connection refused".to_string(),
        })),
        frames(30),
    );

    let outcome = processor.process(&fx.video("Garden_00_20210511082721.mp4"));

    match &outcome {
        ProcessOutcome::DeadLettered { target, reason } => {
            assert_eq!(
                *target,
                fx.outputs.dead_letter.join("Garden_00_20210511082721.mp4")
            );
            assert!(reason.contains("connection refused"));
        }
        other => panic!("expected dead letter, got {:?}", other),
    }
    assert_eq!(classifier.calls(), 2);
    assert!(Fixture::files(&fx.incoming).is_empty());
}

#[test]
fn test_existing_target_dead_letters_and_keeps_both_files() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(ScriptedClassifier::new(), frames(15));
    let existing = fx.outputs.rejected.join("2021-05-11 08-27-21 (Garden).mp4");
    fs::write(&existing, b"earlier").unwrap();

    let outcome = processor.process(&fx.video("Garden_00_20210511082721.mp4"));

    assert!(matches!(outcome, ProcessOutcome::DeadLettered { .. }));
    assert_eq!(fs::read(&existing).unwrap(), b"earlier");
    assert_eq!(
        Fixture::files(&fx.outputs.dead_letter),
        vec!["Garden_00_20210511082721.mp4"]
    );
}

#[test]
fn test_video_is_stranded_when_no_move_succeeds() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(ScriptedClassifier::new(), frames(15));
    fs::write(
        fx.outputs.rejected.join("2021-05-11 08-27-21 (Garden).mp4"),
        b"earlier",
    )
    .unwrap();
    fs::write(
        fx.outputs.dead_letter.join("Garden_00_20210511082721.mp4"),
        b"earlier",
    )
    .unwrap();

    let entry = fx.video("Garden_00_20210511082721.mp4");
    let outcome = processor.process(&entry);

    assert!(matches!(outcome, ProcessOutcome::Stranded { .. }));
    assert!(outcome.target().is_none());
    assert!(entry.full_path().exists());
    assert_eq!(processor.stats().snapshot().stranded, 1);
}

#[test]
fn test_snapshot_failure_does_not_undo_acceptance() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(
        ScriptedClassifier::new().then_detections(vec![person(0.9, 1, 1, 4, 4)]),
        frames(1),
    );
    fs::remove_dir(&fx.outputs.latest_detection).unwrap();

    let outcome = processor.process(&fx.video("Garden_00_20210511082721.mp4"));

    match outcome {
        ProcessOutcome::Accepted {
            target,
            snapshots_written,
            snapshots_failed,
        } => {
            assert!(target.exists());
            assert_eq!(snapshots_written, 1);
            assert_eq!(snapshots_failed, 1);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
    assert_eq!(processor.stats().snapshot().snapshot_failures, 1);
}

#[test]
fn test_missing_file_is_skipped() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(ScriptedClassifier::new(), frames(15));
    let entry = VideoPath::new(&fx.incoming, "Garden_00_20210511082721", "mp4");

    let outcome = processor.process(&entry);
    assert!(matches!(outcome, ProcessOutcome::Vanished));
    assert!(outcome.target().is_none());
    let stats = processor.stats().snapshot();
    assert_eq!(stats.vanished, 1);
    assert_eq!(stats.processed(), 0);
}

#[test]
fn test_panic_dead_letters_video_and_processor_keeps_going() {
    let fx = Fixture::new();
    let (processor, _) = fx.processor(
        ScriptedClassifier::new(),
        frames(15).with_video("Garden_00_20210511082721.mp4", FakeVideo::Panics),
    );

    let outcome = processor.process(&fx.video("Garden_00_20210511082721.mp4"));
    match &outcome {
        ProcessOutcome::DeadLettered { target, reason } => {
            assert_eq!(
                *target,
                fx.outputs.dead_letter.join("Garden_00_20210511082721.mp4")
            );
            assert!(reason.contains("decoder crashed"));
        }
        other => panic!("expected dead-letter, got {:?}", other),
    }

    let next = processor.process(&fx.video("Garden_00_20210511082722.mp4"));
    assert!(matches!(next, ProcessOutcome::Rejected { .. }));
    let stats = processor.stats().snapshot();
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(stats.rejected, 1);
}
