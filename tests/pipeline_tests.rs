// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the frame pipeline stages

use ircam::backends::camera::{Frame, Framerate};
use ircam::config::ClassifierConfig;
use ircam::constants::ColorMode;
use ircam::media::colormap;
use ircam::pipelines::photo::{EncodingQuality, ImageSnapshotWriter};
use ircam::pipelines::video::{EncoderFactory, RecordingSession, Y4mEncoderFactory};
use ircam::pipelines::{Illumination, IlluminationClassifier, SnapshotWriter};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ircam-pipeline-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_classifier_scenario() {
    let mut classifier = IlluminationClassifier::new(ClassifierConfig::default());
    let tags: Vec<Illumination> = [
        50.0, 180.0, 52.0, 182.0, 49.0, 179.0, 51.0, 181.0, 53.0, 183.0,
    ]
    .into_iter()
    .map(|mean| classifier.observe(mean))
    .collect();

    use Illumination::*;
    assert_eq!(
        tags,
        vec![Unknown, Illum, Raw, Illum, Raw, Illum, Raw, Illum, Raw, Illum]
    );
}

#[test]
fn test_classifier_steady_stream_stays_unknown() {
    let mut classifier = IlluminationClassifier::new(ClassifierConfig::default());
    for mean in [90.0, 91.0, 89.5, 90.5, 90.0] {
        assert_eq!(classifier.observe(mean), Illumination::Unknown);
    }
}

#[test]
fn test_snapshot_and_recording_to_disk() {
    let dir = temp_dir();
    let epoch = Instant::now();
    let frames: Vec<_> = (0..3u64)
        .map(|i| {
            let captured_at = epoch + Duration::from_millis(i * 100);
            let gray = Frame::gray8(8, 6, vec![(i * 60) as u8; 48], captured_at, i);
            colormap::apply(&gray, ColorMode::Green)
        })
        .collect();

    let mut writer = ImageSnapshotWriter::new(EncodingQuality::High);
    let photo = writer.write(&frames[0], &dir.join("photos/shot.jpg")).unwrap();
    let decoded = image::open(&photo).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 6));

    let factory = Y4mEncoderFactory;
    let video = dir.join(format!("clip.{}", factory.extension()));
    let mut session =
        RecordingSession::start(&factory, &video, 8, 6, Framerate::from_int(10), 30).unwrap();
    for frame in &frames {
        session.accept(frame).unwrap();
    }
    let summary = session.stop().unwrap();
    assert_eq!(summary.frames_written, 3);

    let bytes = std::fs::read(&video).unwrap();
    assert!(bytes.starts_with(b"YUV4MPEG2 W8 H6 F10:1"));
    let frame_markers = bytes.windows(6).filter(|w| w == b"FRAME\n").count();
    assert_eq!(frame_markers, 3);

    let _ = std::fs::remove_dir_all(&dir);
}
