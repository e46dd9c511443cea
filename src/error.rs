//! Error type shared by the batching and drawing code.
//!
//! None of these are fatal: a failed draw abandons one batch or one shape for
//! the current frame and is logged at the boundary that caught it.

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Binding failed for {resource}: {reason}")]
    BindingFailed {
        resource: &'static str,
        reason: String,
    },

    #[error("Shader program unavailable: {0}")]
    MissingProgram(String),

    #[error("Buffer creation failed: {0}")]
    BufferCreation(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Batch is full ({capacity} paths)")]
    BatchFull { capacity: usize },

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl RenderError {
    pub fn binding<T: ToString>(resource: &'static str, reason: T) -> Self {
        RenderError::BindingFailed {
            resource,
            reason: reason.to_string(),
        }
    }

    pub fn buffer<T: ToString>(msg: T) -> Self {
        RenderError::BufferCreation(msg.to_string())
    }

    pub fn geometry<T: ToString>(msg: T) -> Self {
        RenderError::InvalidGeometry(msg.to_string())
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
