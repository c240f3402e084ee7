//! End-to-end rendering on a real adapter. Run with `--ignored` on a machine with a GPU.

use progressive_tracer::core::{AccumulationTarget, CameraState, Extent, FrameBackend};
use progressive_tracer::gpu::DISPLAY_FORMAT;
use progressive_tracer::gpu::{GpuContext, WgpuBackend};
use progressive_tracer::util::Vec3;
use progressive_tracer::{Error, TracerSettings};

fn camera(extent: Extent) -> CameraState {
    CameraState::orbit(Vec3::new(0.0, 1.0, 0.0), 8.0, 20.0, 15.0, 45.0, extent.aspect())
}

#[test]
#[ignore = "needs a GPU adapter"]
fn test_render_and_read_back() {
    let settings = TracerSettings {
        jitter_seed: Some(3),
        ..Default::default()
    };
    let backend = WgpuBackend::new(GpuContext::headless().unwrap(), &settings).unwrap();
    let environment = backend.environment_handle();
    let mut driver = settings.frame_driver(backend, environment);

    // Not a multiple of the tile size
    let extent = Extent::new(37, 21);
    for k in 0..4 {
        let report = driver.render_frame(&camera(extent), extent).unwrap();
        assert_eq!(report.sample_index, k);
    }

    let target = driver.target().unwrap();
    assert_eq!(target.extent(), extent);
    assert_eq!(target.display_format(), DISPLAY_FORMAT);
    let image = driver.backend().read_display(target).unwrap();
    assert_eq!(image.dimensions(), (37, 21));
    assert!(image.pixels().all(|p| p.0.iter().all(|c| c.is_finite())));
    assert!(image.pixels().any(|p| p.0[0] + p.0[1] + p.0[2] > 0.0), "image is black");
}

#[test]
#[ignore = "needs a GPU adapter"]
fn test_invalid_kernel_reports_compilation_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.wgsl");
    std::fs::write(&path, "@compute @workgroup_size(8, 8, 1) fn main() { let x = ; }").unwrap();

    let settings = TracerSettings {
        kernel: Some(path),
        ..Default::default()
    };
    let result = WgpuBackend::new(GpuContext::headless().unwrap(), &settings);
    assert!(matches!(result, Err(Error::KernelCompilation(_))));
}

#[test]
#[ignore = "needs a GPU adapter"]
fn test_missing_environment_is_missing_collaborator() {
    let settings = TracerSettings {
        environment: Some("/nonexistent/sky.exr".into()),
        ..Default::default()
    };
    let result = WgpuBackend::new(GpuContext::headless().unwrap(), &settings);
    assert!(matches!(result, Err(Error::MissingCollaborator(_))));
}

#[test]
#[ignore = "needs a GPU adapter"]
fn test_oversized_target_is_allocation_error() {
    let mut backend = WgpuBackend::new(GpuContext::headless().unwrap(), &TracerSettings::default()).unwrap();
    let limit = backend.context().max_extent();
    let err = backend.allocate_target(Extent::new(limit + 1, 1)).err().unwrap();
    assert!(matches!(err, Error::ResourceAllocation { .. }));
    assert!(err.is_transient());
}

/// Writes 1.0 for the first 2048 samples and 0.0 afterwards.
const STEP_KERNEL: &str = r#"
struct FrameUniform {
    camera_to_world: mat4x4<f32>,
    inverse_projection: mat4x4<f32>,
    pixel_offset: vec2<f32>,
    bounces: u32,
    sample_index: u32,
    light_direction: vec3<f32>,
    light_intensity: f32,
}

@group(0) @binding(0) var<uniform> frame: FrameUniform;
@group(0) @binding(3) var output: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let v = select(0.0, 1.0, frame.sample_index < 2048u);
    textureStore(output, vec2<i32>(id.xy), vec4<f32>(v, v, v, 1.0));
}
"#;

#[test]
#[ignore = "needs a GPU adapter"]
fn test_running_mean_stays_exact_over_many_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("step.wgsl");
    std::fs::write(&path, STEP_KERNEL).unwrap();

    let settings = TracerSettings {
        kernel: Some(path),
        jitter_seed: Some(7),
        ..Default::default()
    };
    let backend = WgpuBackend::new(GpuContext::headless().unwrap(), &settings).unwrap();
    let environment = backend.environment_handle();
    let mut driver = settings.frame_driver(backend, environment);

    let extent = Extent::new(8, 8);
    for _ in 0..4096 {
        driver.render_frame(&camera(extent), extent).unwrap();
    }
    assert_eq!(driver.sample_count(), 4096);

    let image = driver.backend().read_display(driver.target().unwrap()).unwrap();
    for p in image.pixels() {
        assert!((p.0[0] - 0.5).abs() < 1e-3, "mean drifted to {}", p.0[0]);
    }
}

#[test]
#[ignore = "needs a GPU adapter"]
fn test_oversized_environment_is_allocation_error() {
    let limit = GpuContext::headless().unwrap().max_extent();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.exr");
    let sky = image::Rgba32FImage::from_pixel(limit + 1, 1, image::Rgba([0.5, 0.6, 0.9, 1.0]));
    image::DynamicImage::ImageRgba32F(sky).save(&path).unwrap();

    let settings = TracerSettings {
        environment: Some(path),
        ..Default::default()
    };
    let result = WgpuBackend::new(GpuContext::headless().unwrap(), &settings);
    assert!(matches!(result, Err(Error::ResourceAllocation { .. })));
}
