//! Error taxonomy for chart and series construction.
//!
//! Every variant is construction-time and fatal: it means the deployed shader
//! sources or the device cannot satisfy the geometry contract. Runtime paths
//! (`ingest`, `merge`, geometry builds, `draw` on an initialized chart) never
//! produce these for well-typed input.

use crate::render::Stage;

/// Fatal chart/series initialization error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("failed to compile {stage} stage: {log}")]
    ShaderCompile { stage: Stage, log: String },

    #[error("failed to link shading program: {log}")]
    ProgramLink { log: String },

    #[error("uniform `{name}` not found in shading program")]
    UniformNotFound { name: String },

    #[error("attribute `{name}` not found in shading program")]
    AttributeNotFound { name: String },

    #[error("uniform `{name}` has {found} components, {expected} were written")]
    UniformType { name: String, expected: u32, found: u32 },

    #[error("failed to create `{label}` buffer of {size} bytes: {reason}")]
    BufferCreation {
        label: &'static str,
        size: u64,
        reason: String,
    },

    #[error("upload of {count} vertices at offset {offset} exceeds buffer capacity {capacity}")]
    UploadOutOfRange {
        offset: usize,
        count: usize,
        capacity: usize,
    },
}
