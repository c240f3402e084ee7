//! Camera/scene transform change detection.
//!
//! The driver asks a [`TransformChangeDetector`] once per frame whether the
//! observed pose differs from the previous frame's. A change restarts
//! accumulation. Detection is frame-to-frame: a camera that moves away and
//! comes back still triggers a reset on every frame it moved, and a single
//! frame of movement triggers exactly one reset.

use glam::Mat4;

use super::CameraState;
use crate::util::max_abs_diff;

/// Snapshot of everything that invalidates accumulated samples when it moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub camera_to_world: Mat4,
    pub projection: Mat4,
}

impl From<&CameraState> for PoseSnapshot {
    fn from(camera: &CameraState) -> Self {
        Self {
            camera_to_world: camera.camera_to_world,
            projection: camera.projection,
        }
    }
}

impl PoseSnapshot {
    /// Largest element-wise delta across both matrices.
    pub fn max_delta(&self, other: &Self) -> f32 {
        max_abs_diff(&self.camera_to_world, &other.camera_to_world)
            .max(max_abs_diff(&self.projection, &other.projection))
    }
}

/// Decides whether this frame's pose invalidates the accumulation.
pub trait TransformChangeDetector {
    /// Observe the current pose. Returns true if it changed since the
    /// previous observation. Implementations record the pose so that the
    /// next call compares against it.
    fn observe(&mut self, pose: &PoseSnapshot) -> bool;

    /// Forget the recorded pose.
    fn clear(&mut self) {}
}

/// Compares against the previous frame's snapshot.
///
/// With zero tolerance any delta, however small, counts as a change.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDetector {
    previous: Option<PoseSnapshot>,
    tolerance: f32,
}

impl SnapshotDetector {
    /// Exact comparison.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore element deltas up to `tolerance` (float noise from camera rigs).
    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            previous: None,
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn previous(&self) -> Option<&PoseSnapshot> {
        self.previous.as_ref()
    }
}

impl TransformChangeDetector for SnapshotDetector {
    fn observe(&mut self, pose: &PoseSnapshot) -> bool {
        let changed = match &self.previous {
            // Nothing to compare on the first frame; the counter is already 0.
            None => false,
            Some(prev) => prev.max_delta(pose) > self.tolerance,
        };
        if changed {
            tracing::debug!(
                delta = self.previous.as_ref().map_or(0.0, |p| p.max_delta(pose)),
                "transform changed"
            );
        }
        self.previous = Some(*pose);
        changed
    }

    fn clear(&mut self) {
        self.previous = None;
    }
}

/// Host-maintained dirty flag, for engines that track "has changed" themselves.
///
/// Call [`DirtyFlag::mark`] whenever the host moves the camera; the next
/// observation consumes the flag.
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag {
    dirty: bool,
}

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl TransformChangeDetector for DirtyFlag {
    fn observe(&mut self, _pose: &PoseSnapshot) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn clear(&mut self) {
        self.dirty = false;
    }
}

impl<F> TransformChangeDetector for F
where
    F: FnMut(&PoseSnapshot) -> bool,
{
    fn observe(&mut self, pose: &PoseSnapshot) -> bool {
        self(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn pose_at(x: f32) -> PoseSnapshot {
        PoseSnapshot {
            camera_to_world: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            projection: Mat4::IDENTITY,
        }
    }

    #[test]
    fn test_first_observation_is_not_a_change() {
        let mut d = SnapshotDetector::new();
        assert!(!d.observe(&pose_at(0.0)));
        assert!(d.previous().is_some());
    }

    #[test]
    fn test_one_move_one_reset() {
        let mut d = SnapshotDetector::new();
        let seq = [0.0, 0.0, 1.0, 1.0, 1.0];
        let changes: Vec<bool> = seq.iter().map(|&x| d.observe(&pose_at(x))).collect();
        assert_eq!(changes, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_return_to_previous_pose_is_a_change() {
        let mut d = SnapshotDetector::new();
        d.observe(&pose_at(0.0));
        assert!(d.observe(&pose_at(1.0)));
        assert!(d.observe(&pose_at(0.0)));
    }

    #[test]
    fn test_tiny_delta_counts_without_tolerance() {
        let mut d = SnapshotDetector::new();
        d.observe(&pose_at(0.0));
        assert!(d.observe(&pose_at(1e-6)));

        let mut tolerant = SnapshotDetector::with_tolerance(1e-4);
        tolerant.observe(&pose_at(0.0));
        assert!(!tolerant.observe(&pose_at(1e-6)));
        assert!(tolerant.observe(&pose_at(1.0)));
    }

    #[test]
    fn test_projection_change_detected() {
        let mut d = SnapshotDetector::new();
        let mut p = pose_at(0.0);
        d.observe(&p);
        p.projection = Mat4::from_scale(Vec3::splat(2.0));
        assert!(d.observe(&p));
    }

    #[test]
    fn test_non_finite_pose_is_a_change() {
        let mut d = SnapshotDetector::with_tolerance(1e-4);
        d.observe(&pose_at(0.0));
        assert!(d.observe(&pose_at(f32::NAN)));
        assert!(d.observe(&pose_at(0.0)));
    }

    #[test]
    fn test_dirty_flag_consumed_once() {
        let mut flag = DirtyFlag::new();
        assert!(!flag.observe(&pose_at(0.0)));
        flag.mark();
        assert!(flag.is_dirty());
        assert!(flag.observe(&pose_at(0.0)));
        assert!(!flag.observe(&pose_at(0.0)));
    }

    #[test]
    fn test_closure_predicate() {
        let mut frame = 0;
        let mut every_third = |_: &PoseSnapshot| {
            frame += 1;
            frame % 3 == 0
        };
        let hits = (0..9).filter(|_| every_third.observe(&pose_at(0.0))).count();
        assert_eq!(hits, 3);
    }
}
