//! Error types for BrirForge
//!
//! The numeric core never fails: degenerate input yields fallback values.
//! These errors belong to the validation layer wrapped around it.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrirError {
    #[error("Sample rate mismatch for {speaker}: left={left}Hz, right={right}Hz")]
    SampleRateMismatch {
        speaker: String,
        left: u32,
        right: u32,
    },

    #[error("Mixed sample rates in channel map: expected {expected}Hz, got {actual}Hz")]
    MixedSampleRates { expected: u32, actual: u32 },

    #[error("Channel map is empty")]
    EmptyChannelMap,

    #[error("Unknown speaker: {0}")]
    UnknownSpeaker(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type BrirResult<T> = Result<T, BrirError>;
