use crate::scenario::types::ScenarioState;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Every way a harness run can fail. Nothing here is retried: a setup or
/// deployment error aborts the run, a decode error means the harness and the
/// deployed contracts disagree about the event schema.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("environment setup failed: {0}")]
    Setup(String),

    #[error("failed to deploy {artifact}: {source}")]
    Deployment {
        artifact: String,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("malformed response from {context}: {source}")]
    MalformedResponse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing field at logs[{log}].events[{event}].attributes[{attribute}]{}", expected_key.as_ref().map(|k| format!(" (expected key `{k}`)")).unwrap_or_default())]
    MissingField {
        log: usize,
        event: usize,
        attribute: usize,
        expected_key: Option<String>,
    },

    #[error("missing `{key}` attribute in `{event_type}` event")]
    MissingAttribute { event_type: String, key: String },

    #[error("transaction {txhash} failed with code {code} ({codespace}): {raw_log}")]
    TransactionFailed {
        txhash: String,
        code: u32,
        codespace: String,
        raw_log: String,
    },

    #[error("relay not observed on {chain_id} after {polls} polls of {blocks_per_poll} blocks")]
    RelayTimeout {
        chain_id: String,
        polls: u32,
        blocks_per_poll: u64,
    },

    #[error("{chain_id} rejected the swap in tx {txhash}, ack {}", ack.as_deref().unwrap_or("<none>"))]
    SwapRejected {
        chain_id: String,
        txhash: String,
        ack: Option<String>,
    },

    #[error("relayer reported no channel for chain {chain_id}")]
    NoChannelEstablished { chain_id: String },

    #[error("address is {len} bytes, at most 64 can be encoded")]
    AddressTooLong { len: usize },

    #[error("malformed encoded address: {0}")]
    MalformedAddress(String),

    #[error("vault connection on channel {channel_id} is not registered in both directions")]
    AsymmetricConnection { channel_id: String },

    #[error("command `{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("query failed: {0}")]
    Query(String),

    #[error("invalid harness config: {0}")]
    Config(String),

    #[error("scenario exceeded its {0:?} deadline")]
    ScenarioTimeout(Duration),

    #[error("cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: ScenarioState, to: ScenarioState },

    #[error("transition {from:?} -> {to:?} failed: {source}")]
    Transition {
        from: ScenarioState,
        to: ScenarioState,
        #[source]
        source: Box<HarnessError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn deployment(artifact: impl Into<String>, source: HarnessError) -> Self {
        HarnessError::Deployment { artifact: artifact.into(), source: Box::new(source) }
    }

    pub fn malformed(context: impl Into<String>, source: serde_json::Error) -> Self {
        HarnessError::MalformedResponse { context: context.into(), source }
    }

    /// Unwraps `Transition` and `Deployment` layers down to the error that
    /// actually stopped the run.
    pub fn root(&self) -> &HarnessError {
        match self {
            HarnessError::Transition { source, .. } => source.root(),
            HarnessError::Deployment { source, .. } => source.root(),
            other => other,
        }
    }
}
