//! Per-frame orchestration of the progressive renderer.
//!
//! ## Usage
//! ```ignore
//! let mut driver = FrameDriver::new(backend, DriverConfig::default());
//! loop {
//!     let camera = CameraState::look_at(eye, target, Vec3::Y, 60.0, aspect);
//!     driver.render_frame(&camera, Extent::new(width, height))?;
//!     // present driver.backend() display image
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::{
    AccumulationState, AccumulationTarget, BlendWeight, CameraState, DirectionalLight, DispatchGrid,
    EnvironmentHandle, Extent, FrameBackend, FrameParameters, JitterSource, PoseSnapshot,
    RandomJitter, SampleCounter, SnapshotDetector, TransformChangeDetector, MAX_BOUNCES,
};
use crate::util::{Error, Result};

/// What happens to the sample counter when the output resolution changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    /// Restart convergence; the new display image starts blank.
    #[default]
    Reset,
    /// Keep counting. The first samples after a resize are blended against a
    /// blank display with small weights, so the image fades in.
    Preserve,
}

/// Driver configuration, normally built from [`TracerSettings`](crate::settings::TracerSettings).
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    pub max_bounces: u32,
    pub resize_policy: ResizePolicy,
    /// Stop dispatching once this many samples are accumulated.
    pub max_samples: Option<u32>,
    pub light: Option<DirectionalLight>,
    pub environment: EnvironmentHandle,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_bounces: 8,
            resize_policy: ResizePolicy::Reset,
            max_samples: None,
            light: None,
            environment: EnvironmentHandle::default(),
        }
    }
}

/// Outcome of one [`FrameDriver::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Counter value the frame was dispatched and blended with.
    pub sample_index: u32,
    /// Whether the kernel ran (false once converged).
    pub dispatched: bool,
    /// Whether accumulation restarted this frame.
    pub reset: bool,
    /// Whether the target was (re)allocated this frame.
    pub reallocated: bool,
    pub grid: Option<DispatchGrid>,
}

/// Drives one progressive rendering step per displayed frame.
///
/// Owns the backend, the accumulation target and the sample counter. The
/// counter changes only through this type's methods.
pub struct FrameDriver<B: FrameBackend, D = SnapshotDetector, J = RandomJitter> {
    backend: B,
    target: Option<B::Target>,
    samples: SampleCounter,
    detector: D,
    jitter: J,
    config: DriverConfig,
}

impl<B: FrameBackend> FrameDriver<B> {
    /// Driver with exact snapshot change detection and OS-seeded jitter.
    pub fn new(backend: B, config: DriverConfig) -> Self {
        Self::with_parts(backend, config, SnapshotDetector::new(), RandomJitter::from_entropy())
    }
}

impl<B, D, J> FrameDriver<B, D, J>
where
    B: FrameBackend,
    D: TransformChangeDetector,
    J: JitterSource,
{
    pub fn with_parts(backend: B, mut config: DriverConfig, detector: D, jitter: J) -> Self {
        config.max_bounces = config.max_bounces.min(MAX_BOUNCES);
        Self {
            backend,
            target: None,
            samples: SampleCounter::new(),
            detector,
            jitter,
            config,
        }
    }

    pub fn state(&self) -> AccumulationState {
        match self.target {
            None => AccumulationState::Uninitialized,
            Some(_) => AccumulationState::Accumulating(self.samples.count()),
        }
    }

    /// Samples blended since the last reset.
    pub fn sample_count(&self) -> u32 {
        self.samples.count()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Change detector, e.g. to [`mark`](super::DirtyFlag::mark) a host-tracked change.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn target(&self) -> Option<&B::Target> {
        self.target.as_ref()
    }

    /// True once the configured sample cap is reached.
    pub fn is_converged(&self) -> bool {
        self.config
            .max_samples
            .is_some_and(|max| self.samples.count() >= max)
    }

    /// Capture the kernel inputs for this frame.
    ///
    /// Draws a fresh jitter offset on every call, so call it once per frame,
    /// right before [`dispatch_kernel`](Self::dispatch_kernel).
    pub fn prepare_parameters(&mut self, camera: &CameraState) -> FrameParameters {
        FrameParameters {
            camera_to_world: camera.camera_to_world,
            inverse_projection: camera.inverse_projection(),
            pixel_offset: self.jitter.next_offset(),
            max_bounces: self.config.max_bounces,
            sample_index: self.samples.count(),
            environment: self.config.environment,
            light: self.config.light,
        }
    }

    /// Make sure a target of exactly `extent` exists.
    ///
    /// Returns true if a target was allocated. The stale target is released
    /// before the new one is allocated; if allocation fails the driver is left
    /// without a target and the next call retries. The sample counter is not
    /// touched here; [`render_frame`](Self::render_frame) applies the
    /// [`ResizePolicy`].
    pub fn ensure_accumulation_target(&mut self, extent: Extent) -> Result<bool> {
        if extent.is_empty() {
            return Err(Error::EmptyExtent {
                width: extent.width,
                height: extent.height,
            });
        }
        if self.target.as_ref().is_some_and(|t| t.extent() == extent) {
            return Ok(false);
        }

        if let Some(stale) = self.target.take() {
            tracing::info!(from = %stale.extent(), to = %extent, "resizing accumulation target");
            self.backend.release_target(stale);
        } else {
            tracing::info!(extent = %extent, "allocating accumulation target");
        }

        let target = self.backend.allocate_target(extent).inspect_err(|e| {
            tracing::warn!(extent = %extent, error = %e, "accumulation target allocation failed");
        })?;
        debug_assert_eq!(target.extent(), extent);
        self.target = Some(target);
        Ok(true)
    }

    /// Record one kernel dispatch covering the current target.
    pub fn dispatch_kernel(&mut self, params: &FrameParameters) -> Result<DispatchGrid> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| Error::missing("accumulation target (ensure_accumulation_target not called)"))?;
        let grid = DispatchGrid::for_extent(target.extent());
        self.backend.dispatch(target, params, grid)?;
        Ok(grid)
    }

    /// Blend the target into the display image with weight `1/(count+1)`,
    /// submit the frame, then count the sample.
    pub fn accumulate_and_present(&mut self) -> Result<BlendWeight> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| Error::missing("accumulation target (ensure_accumulation_target not called)"))?;
        let weight = self.samples.weight();
        self.backend.composite(target, weight)?;
        self.backend.submit()?;
        self.samples.advance();
        Ok(weight)
    }

    /// The observed transform differs from the previous frame's: restart
    /// convergence.
    pub fn on_transform_changed(&mut self) {
        if self.samples.count() > 0 {
            tracing::debug!(discarded = self.samples.count(), "transform changed, resetting accumulation");
        }
        self.samples.reset();
    }

    /// Swap the environment the kernel samples. Restarts accumulation if the
    /// handle differs.
    pub fn set_environment(&mut self, handle: EnvironmentHandle) {
        if self.config.environment != handle {
            self.config.environment = handle;
            self.samples.reset();
        }
    }

    /// Change the bounce limit (clamped to 0..=15). Restarts accumulation if it
    /// differs.
    pub fn set_max_bounces(&mut self, bounces: u32) {
        let bounces = bounces.min(MAX_BOUNCES);
        if self.config.max_bounces != bounces {
            self.config.max_bounces = bounces;
            self.samples.reset();
        }
    }

    pub fn set_light(&mut self, light: Option<DirectionalLight>) {
        if self.config.light != light {
            self.config.light = light;
            self.samples.reset();
        }
    }

    /// Change the convergence cap; accumulated samples are kept.
    pub fn set_max_samples(&mut self, max_samples: Option<u32>) {
        self.config.max_samples = max_samples;
    }

    /// Render one progressive step for `camera` at `extent`.
    ///
    /// A failed allocation aborts the frame and leaves the driver
    /// uninitialized; calling again next frame retries. Dispatch and submit
    /// failures propagate without counting the sample.
    pub fn render_frame(&mut self, camera: &CameraState, extent: Extent) -> Result<FrameReport> {
        if extent.is_empty() {
            return Err(Error::EmptyExtent {
                width: extent.width,
                height: extent.height,
            });
        }

        let mut reset = false;
        if self.detector.observe(&PoseSnapshot::from(camera)) {
            self.on_transform_changed();
            reset = true;
        }

        let reallocated = self.ensure_accumulation_target(extent)?;
        if reallocated && self.config.resize_policy == ResizePolicy::Reset && self.samples.count() > 0 {
            self.samples.reset();
            reset = true;
        }

        let sample_index = self.samples.count();
        if self.is_converged() {
            return Ok(FrameReport {
                sample_index,
                dispatched: false,
                reset,
                reallocated,
                grid: None,
            });
        }

        let params = self.prepare_parameters(camera);
        let grid = self.dispatch_kernel(&params)?;
        self.accumulate_and_present()?;

        tracing::trace!(sample = sample_index, grid_x = grid.x, grid_y = grid.y, "frame dispatched");

        Ok(FrameReport {
            sample_index,
            dispatched: true,
            reset,
            reallocated,
            grid: Some(grid),
        })
    }

    /// Release the target. The driver can keep rendering afterwards; the next
    /// frame allocates again.
    pub fn shutdown(&mut self) {
        if let Some(target) = self.target.take() {
            tracing::debug!(extent = %target.extent(), "releasing accumulation target");
            self.backend.release_target(target);
        }
        self.samples.reset();
        self.detector.clear();
    }
}

impl<B: FrameBackend, D, J> Drop for FrameDriver<B, D, J> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            self.backend.release_target(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec2};

    #[derive(Debug)]
    struct Target(Extent);

    impl AccumulationTarget for Target {
        fn extent(&self) -> Extent {
            self.0
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        allocations: u32,
        releases: u32,
        dispatches: u32,
        composites: Vec<BlendWeight>,
    }

    impl FrameBackend for CountingBackend {
        type Target = Target;

        fn allocate_target(&mut self, extent: Extent) -> Result<Target> {
            self.allocations += 1;
            Ok(Target(extent))
        }

        fn release_target(&mut self, _target: Target) {
            self.releases += 1;
        }

        fn dispatch(&mut self, _: &Target, _: &FrameParameters, _: DispatchGrid) -> Result<()> {
            self.dispatches += 1;
            Ok(())
        }

        fn composite(&mut self, _: &Target, weight: BlendWeight) -> Result<()> {
            self.composites.push(weight);
            Ok(())
        }

        fn submit(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn driver() -> FrameDriver<CountingBackend, SnapshotDetector, impl FnMut() -> Vec2> {
        FrameDriver::with_parts(
            CountingBackend::default(),
            DriverConfig::default(),
            SnapshotDetector::new(),
            || Vec2::splat(0.5),
        )
    }

    fn camera() -> CameraState {
        CameraState::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }

    #[test]
    fn test_initial_state() {
        let d = driver();
        assert_eq!(d.state(), AccumulationState::Uninitialized);
        assert_eq!(d.sample_count(), 0);
    }

    #[test]
    fn test_ensure_target_is_idempotent() {
        let mut d = driver();
        assert!(d.ensure_accumulation_target(Extent::new(64, 32)).unwrap());
        assert!(!d.ensure_accumulation_target(Extent::new(64, 32)).unwrap());
        assert_eq!(d.backend().allocations, 1);
        assert_eq!(d.backend().releases, 0);

        assert!(d.ensure_accumulation_target(Extent::new(32, 32)).unwrap());
        assert_eq!(d.backend().allocations, 2);
        assert_eq!(d.backend().releases, 1);
        assert_eq!(d.target().unwrap().extent(), Extent::new(32, 32));
    }

    #[test]
    fn test_ensure_target_does_not_reset_counter() {
        let mut d = driver();
        for _ in 0..3 {
            d.render_frame(&camera(), Extent::new(8, 8)).unwrap();
        }
        d.ensure_accumulation_target(Extent::new(16, 16)).unwrap();
        assert_eq!(d.sample_count(), 3);
    }

    #[test]
    fn test_dispatch_without_target_fails() {
        let mut d = driver();
        let params = d.prepare_parameters(&camera());
        assert!(matches!(d.dispatch_kernel(&params), Err(Error::MissingCollaborator(_))));
        assert!(d.accumulate_and_present().is_err());
        assert_eq!(d.sample_count(), 0);
    }

    #[test]
    fn test_bounces_clamped() {
        let mut d = driver();
        d.set_max_bounces(40);
        assert_eq!(d.config().max_bounces, MAX_BOUNCES);
        let p = d.prepare_parameters(&camera());
        assert_eq!(p.max_bounces, 15);
    }

    #[test]
    fn test_environment_swap_resets() {
        let mut d = driver();
        for _ in 0..4 {
            d.render_frame(&camera(), Extent::new(8, 8)).unwrap();
        }
        d.set_environment(EnvironmentHandle(0));
        assert_eq!(d.sample_count(), 4, "same handle is a no-op");
        d.set_environment(EnvironmentHandle(9));
        assert_eq!(d.sample_count(), 0);
    }

    #[test]
    fn test_shutdown_releases_target() {
        let mut d = driver();
        d.render_frame(&camera(), Extent::new(8, 8)).unwrap();
        d.shutdown();
        assert_eq!(d.state(), AccumulationState::Uninitialized);
        assert_eq!(d.backend().releases, 1);
        d.shutdown();
        assert_eq!(d.backend().releases, 1);
    }

    #[test]
    fn test_empty_extent_rejected() {
        let mut d = driver();
        let err = d.render_frame(&camera(), Extent::new(0, 720)).unwrap_err();
        assert!(matches!(err, Error::EmptyExtent { width: 0, height: 720 }));
        assert_eq!(d.backend().allocations, 0);
    }
}
