use thiserror::Error;

use crate::processor::FlowKey;

/// Flow table or expiry bookkeeping went wrong. These are defects, not input
/// problems: a terminated flow must never be reachable again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow {key} was already finalized")]
    AlreadyFinalized { key: FlowKey },

    #[error("packet delivered to terminated flow {key}")]
    UpdateAfterTerminate { key: FlowKey },
}

/// A captured frame that could not be turned into a packet record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame carries no IP header")]
    NotIp,

    #[error("unsupported link type {0}")]
    UnsupportedLink(i32),
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
