use thiserror::Error;

/// Errors raised while materializing or drawing the packed scene.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("GPU adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequestFailed(String),

    #[error("{label} buffer of {size} bytes exceeds the device limit of {limit} bytes")]
    BufferTooLarge {
        label: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("{label} count of the packed scene exceeds 32-bit offsets")]
    LayoutOverflow { label: &'static str },

    #[error("Out of memory while allocating {label} buffer ({size} bytes)")]
    OutOfMemory { label: &'static str, size: u64 },

    #[error("Render pipeline creation failed: {0}")]
    RenderPipelineError(String),

    #[error("Scene buffers are not materialized for the current configuration")]
    NotClean,
}
