//! Error type shared by every fallible operation in the pipeline.

use crate::frame::{Stage, TargetId};

/// Errors surfaced by GPU setup and frame sequencing.
///
/// Capability and completeness problems found while allocating targets are
/// *not* errors: they are logged and collected in a
/// [`CompletenessReport`](crate::CompletenessReport) so rendering can continue.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No GPU adapter matched the request.
    #[error("no suitable GPU adapter found: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to create a logical device.
    #[error("failed to create device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The window surface could not be created.
    #[error("failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// A built-in WGSL program failed to parse during reflection.
    #[error("shader '{label}' failed to parse: {message}")]
    Shader { label: String, message: String },

    /// A stage ran before one of its inputs was produced this frame.
    #[error("{stage:?} stage requires {missing:?}, which has not been written this frame")]
    StageOutOfOrder { stage: Stage, missing: TargetId },

    /// More scene-geometry textures were supplied than there are slots.
    #[error("{given} scene textures supplied but only {max} slots are bound")]
    TooManySceneTextures { given: usize, max: usize },

    /// An image could not be decoded into a texture.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
