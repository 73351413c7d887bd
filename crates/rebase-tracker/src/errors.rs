use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("no relay endpoints configured")]
    NoEndpoints,

    #[error("invalid vaa: {0}")]
    InvalidVaa(String),

    #[error("unsupported vaa version {0}")]
    UnsupportedVaaVersion(u8),

    #[error("invalid emitter address {address}: {reason}")]
    InvalidEmitterAddress { address: String, reason: String },

    #[error("gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}
