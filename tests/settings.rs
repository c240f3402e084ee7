//! Settings persistence.

use progressive_tracer::core::{DirectionalLight, ResizePolicy};
use progressive_tracer::{Error, TracerSettings};

#[test]
fn test_save_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let settings = TracerSettings {
        bounces: 5,
        kernel: Some("kernels/custom.wgsl".into()),
        environment: Some("sky.exr".into()),
        light: Some(DirectionalLight {
            direction: [0.0, -1.0, 0.0],
            intensity: 2.5,
        }),
        resize_policy: ResizePolicy::Preserve,
        max_samples: Some(512),
        jitter_seed: Some(99),
        ..Default::default()
    };
    settings.save_to(&path).unwrap();

    let loaded = TracerSettings::load_from(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_load_clamps_bounces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "bounces": 64, "exposure": 0.0 }"#).unwrap();

    let loaded = TracerSettings::load_from(&path).unwrap();
    assert_eq!(loaded.bounces, 15);
    assert_eq!(loaded.exposure, 1.0);
}

#[test]
fn test_invalid_json_is_settings_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ bounces: nope").unwrap();

    let err = TracerSettings::load_from(&path).unwrap_err();
    match err {
        Error::Settings { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TracerSettings::load_from(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_frame_driver_from_settings() {
    use progressive_tracer::core::*;
    use progressive_tracer::util::Vec3;

    struct NullTarget(Extent);
    impl AccumulationTarget for NullTarget {
        fn extent(&self) -> Extent {
            self.0
        }
    }
    #[derive(Default)]
    struct NullBackend {
        offsets: Vec<progressive_tracer::util::Vec2>,
    }
    impl FrameBackend for NullBackend {
        type Target = NullTarget;
        fn allocate_target(&mut self, extent: Extent) -> progressive_tracer::Result<NullTarget> {
            Ok(NullTarget(extent))
        }
        fn release_target(&mut self, _: NullTarget) {}
        fn dispatch(&mut self, _: &NullTarget, p: &FrameParameters, _: DispatchGrid) -> progressive_tracer::Result<()> {
            self.offsets.push(p.pixel_offset);
            Ok(())
        }
        fn composite(&mut self, _: &NullTarget, _: BlendWeight) -> progressive_tracer::Result<()> {
            Ok(())
        }
        fn submit(&mut self) -> progressive_tracer::Result<()> {
            Ok(())
        }
    }

    let settings = TracerSettings {
        bounces: 3,
        jitter_seed: Some(1234),
        max_samples: Some(2),
        ..Default::default()
    };
    let camera = CameraState::look_at(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0, 1.0);

    let run = || {
        let mut d = settings.frame_driver(NullBackend::default(), EnvironmentHandle(1));
        for _ in 0..4 {
            d.render_frame(&camera, Extent::new(16, 16)).unwrap();
        }
        assert_eq!(d.config().max_bounces, 3);
        assert_eq!(d.sample_count(), 2);
        d.backend().offsets.clone()
    };
    // Same seed, same jitter sequence
    assert_eq!(run(), run());
}
