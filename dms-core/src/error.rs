// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

use thiserror::Error;

/// Errors produced by the DMS core.
///
/// The four variants map to the four failure domains of the system:
/// broken cartridge/device images, malformed SysEx traffic, a device
/// that stops answering, and bad user-supplied selections.
#[derive(Debug, Error)]
pub enum DmsError {
    /// A raw buffer failed structural validation (bad magic, checksum
    /// mismatch, out-of-range pointer, offset mismatch). Always fatal
    /// to the decode attempt; no partially populated store is exposed.
    #[error("data format error: {0}")]
    DataFormat(String),

    /// A single SysEx message was malformed or did not match the
    /// expected device. Fatal to that message only.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No matching device reply arrived within the retry budget.
    #[error("transport timeout: {0}")]
    TransportTimeout(String),

    /// Invalid user-supplied selection, surfaced for correction.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DmsError {
    pub fn is_data_format(&self) -> bool {
        matches!(self, DmsError::DataFormat(_))
    }
}

pub type Result<T> = std::result::Result<T, DmsError>;
