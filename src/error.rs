use thiserror::Error;

/// Failure taxonomy for the chat service.
///
/// Every downstream failure is caught at the orchestration boundary and mapped
/// to one of these kinds with the original cause kept for diagnostics. Only
/// `ServiceNotReady` is meaningful to callers (back off and retry); everything
/// else surfaces as a generic failure.
///
/// Retrieval returning no matches and ingestion finding no valid sections are
/// successful outcomes and never appear here.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or invalid startup configuration. Fatal — the process refuses
    /// to start rather than limping along without a credential.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No tool session exists (still starting up, or shut down). Retryable.
    #[error("tool session not established")]
    ServiceNotReady,

    /// The completion API call failed after its bounded retries.
    #[error("completion call failed: {cause}")]
    UpstreamModel { cause: anyhow::Error },

    /// A tool invocation failed downstream of the bridge.
    #[error("tool '{tool}' failed: {cause}")]
    ToolExecution {
        tool: String,
        cause: anyhow::Error,
    },

    /// The model emitted a tool call whose argument payload did not decode.
    /// Treated as an upstream protocol violation, never silently defaulted.
    #[error("malformed arguments for tool '{tool}'")]
    MalformedToolArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ChatError {
    /// Whether the caller should retry after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::ServiceNotReady)
    }
}
