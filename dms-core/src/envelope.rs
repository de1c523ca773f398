// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! AMPL/FREQ envelope block handling.
//!
//! The envelope blocks carry a micro-program whose instruction format
//! is only partially reverse engineered, so the payload is kept as a
//! verbatim byte buffer. Decoding into structured instructions is a
//! known gap in the format documentation.

use core::fmt;

/// Raw AMPL (amplitude envelope) record size in bytes.
pub const AMPL_SIZE: usize = 44;

/// Raw FREQ (frequency envelope) record size in bytes.
pub const FREQ_SIZE: usize = 32;

/// Which of the two envelope programs a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Ampl,
    Freq,
}

impl EnvelopeKind {
    /// Fixed record size for this envelope kind.
    pub fn size(self) -> usize {
        match self {
            EnvelopeKind::Ampl => AMPL_SIZE,
            EnvelopeKind::Freq => FREQ_SIZE,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeKind::Ampl => write!(f, "AMPL"),
            EnvelopeKind::Freq => write!(f, "FREQ"),
        }
    }
}

/// Envelope block, preserved as its raw micro-program bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    block: u8,
    kind: EnvelopeKind,
    data: Vec<u8>,
}

impl Envelope {
    pub fn dissect(block: u8, kind: EnvelopeKind, raw: &[u8]) -> Self {
        debug_assert!(raw.len() >= kind.size());
        Envelope {
            block,
            kind,
            data: raw[..kind.size()].to_vec(),
        }
    }

    /// Writes the envelope program back verbatim.
    pub fn update(&self, raw: &mut [u8]) {
        debug_assert!(raw.len() >= self.data.len());
        raw[..self.data.len()].copy_from_slice(&self.data);
    }

    pub fn block(&self) -> u8 {
        self.block
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_verbatim() {
        let raw: Vec<u8> = (0..AMPL_SIZE as u8).collect();
        let env = Envelope::dissect(128, EnvelopeKind::Ampl, &raw);
        assert_eq!(env.data(), &raw[..]);
        let mut out = vec![0u8; AMPL_SIZE];
        env.update(&mut out);
        assert_eq!(out, raw);
    }

    #[test]
    fn kind_sizes() {
        assert_eq!(EnvelopeKind::Ampl.size(), 44);
        assert_eq!(EnvelopeKind::Freq.size(), 32);
        let raw = vec![0xee; FREQ_SIZE];
        let env = Envelope::dissect(129, EnvelopeKind::Freq, &raw);
        assert_eq!(env.data().len(), FREQ_SIZE);
    }
}
