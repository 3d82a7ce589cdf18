/// Convenience result type used across fxpipe.
pub type FxResult<T> = Result<T, FxError>;

/// Top-level error taxonomy used by pipeline APIs.
///
/// Unit-level failures (`EffectFailure`, `DeviceError`) are contained by the execution path
/// selector and only reach this type when a job is configured to abort on them.
#[derive(thiserror::Error, Debug)]
pub enum FxError {
    /// Invalid user-provided data (parameters, chain indices, configuration, frame sizes).
    #[error("validation error: {0}")]
    Validation(String),

    /// The input stream could not be decoded.
    #[error("media read error: {0}")]
    MediaRead(String),

    /// One effect in a chain failed for one unit.
    #[error("effect '{effect}' failed: {cause}")]
    EffectApplication {
        /// Name of the failing effect.
        effect: String,
        /// Failure description reported by the effect.
        cause: String,
    },

    /// The compute device failed and the failure was not recovered.
    #[error("device execution error: {0}")]
    DeviceExecution(String),

    /// An external decoder/encoder process exited unsuccessfully.
    #[error("{tool} exited with {}: {stderr}", exit_label(.exit_code))]
    ExternalTool {
        /// Program that was invoked.
        tool: String,
        /// Process exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// Errors when serializing or deserializing presets and configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FxError {
    /// Build a [`FxError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FxError::MediaRead`] value.
    pub fn media_read(msg: impl Into<String>) -> Self {
        Self::MediaRead(msg.into())
    }

    /// Build a [`FxError::DeviceExecution`] value.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::DeviceExecution(msg.into())
    }

    /// Build a [`FxError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`FxError::EffectApplication`] value.
    pub fn effect(effect: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::EffectApplication {
            effect: effect.into(),
            cause: cause.into(),
        }
    }

    /// Build a [`FxError::ExternalTool`] value from a finished process.
    pub fn external_tool(
        tool: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            exit_code,
            stderr: stderr.into().trim().to_string(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
