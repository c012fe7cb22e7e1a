//! Error types for the proxy host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("target plugin not found: {0}")]
    TargetNotFound(String),

    #[error("target '{target_id}' could not be constructed: {message}")]
    TargetConstruction { target_id: String, message: String },

    #[error("context '{context}' could not be applied: {message}")]
    ContextApplication { context: String, message: String },

    #[error("target '{target_id}' failed to render: {message}")]
    Render { target_id: String, message: String },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProxyError {
    /// Short, stable name of the failing operation, used as a diagnostics field.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::TargetNotFound(_) | Self::TargetConstruction { .. } => "resolve",
            Self::ContextApplication { .. } => "apply_contexts",
            Self::Render { .. } => "build",
            Self::InvalidSettings(_) => "settings",
            Self::Serialization(_) => "serialize",
        }
    }
}

/// Result type for proxy host operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_error_names_target() {
        let err = ProxyError::TargetConstruction {
            target_id: "views_block:recent".into(),
            message: "missing display".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("views_block:recent"));
        assert!(msg.contains("missing display"));
        assert_eq!(err.operation(), "resolve");
    }

    #[test]
    fn operations_are_distinct_per_stage() {
        let ctx = ProxyError::ContextApplication {
            context: "node".into(),
            message: "bad type".into(),
        };
        let render = ProxyError::Render {
            target_id: "x".into(),
            message: "boom".into(),
        };
        assert_eq!(ctx.operation(), "apply_contexts");
        assert_eq!(render.operation(), "build");
    }
}
