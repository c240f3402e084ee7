//! Error types for the progressive tracer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for frame orchestration and GPU setup.
#[derive(Error, Debug)]
pub enum Error {
    /// Accumulation target or display image could not be (re)allocated.
    /// The frame is aborted; the next frame retries.
    #[error("Failed to allocate {width}x{height} accumulation target: {reason}")]
    ResourceAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// Kernel program, environment texture or composite resource not assigned or not found
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(String),

    /// Kernel source failed WGSL validation
    #[error("Kernel compilation failed: {0}")]
    KernelCompilation(String),

    /// Output extent has zero area
    #[error("Output extent {width}x{height} has zero area")]
    EmptyExtent { width: u32, height: u32 },

    /// No usable GPU adapter
    #[error("No suitable GPU adapter: {0}")]
    NoAdapter(String),

    /// Device request failed
    #[error("Device request failed: {0}")]
    RequestDevice(String),

    /// Validation error raised while submitting a frame's commands
    #[error("Frame submission failed: {0}")]
    Submission(String),

    /// Reading the display image back to host memory failed
    #[error("Readback failed: {0}")]
    Readback(String),

    /// Settings file could not be parsed
    #[error("Invalid settings in {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a missing-collaborator error from a description.
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingCollaborator(what.into())
    }

    /// Create an allocation error for the given extent.
    pub fn allocation(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::ResourceAllocation {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Whether the error only affects the current frame.
    ///
    /// Transient errors leave the driver in a state where the next
    /// `render_frame` retries; everything else is a configuration or
    /// device problem that will not go away by itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ResourceAllocation { .. } | Self::EmptyExtent { .. }
        )
    }
}

/// Result type alias for tracer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::allocation(1920, 1080, "out of memory");
        let msg = e.to_string();
        assert!(msg.contains("1920x1080"));
        assert!(msg.contains("out of memory"));

        let e = Error::missing("kernel program");
        assert!(e.to_string().contains("kernel program"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::allocation(1, 1, "oom").is_transient());
        assert!(Error::EmptyExtent { width: 0, height: 4 }.is_transient());
        assert!(!Error::missing("kernel").is_transient());
        assert!(!Error::KernelCompilation("bad".into()).is_transient());
    }
}
