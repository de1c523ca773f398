// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! VCF (voltage controlled filter) block codec.
//!
//! The VCF block keeps the filter mode, audio routing, noise and
//! filter-envelope configuration.

use core::fmt;

/// Raw VCF record size in bytes.
pub const VCF_SIZE: usize = 10;

/// Noise generator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseType {
    Wind,
    Patch,
    Flute,
    Invalid,
}

impl NoiseType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => NoiseType::Wind,
            1 => NoiseType::Patch,
            2 => NoiseType::Flute,
            _ => NoiseType::Invalid,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            NoiseType::Wind => 0,
            NoiseType::Patch => 1,
            NoiseType::Flute => 2,
            NoiseType::Invalid => 3,
        }
    }
}

impl fmt::Display for NoiseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseType::Wind => write!(f, "Wind"),
            NoiseType::Patch => write!(f, "Patch"),
            NoiseType::Flute => write!(f, "Flute"),
            NoiseType::Invalid => write!(f, ""),
        }
    }
}

/// Filter envelope mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    T1,
    T1T2,
    T1RT2,
    Rotor,
}

impl EnvelopeMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => EnvelopeMode::T1,
            1 => EnvelopeMode::T1T2,
            2 => EnvelopeMode::T1RT2,
            _ => EnvelopeMode::Rotor,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            EnvelopeMode::T1 => 0,
            EnvelopeMode::T1T2 => 1,
            EnvelopeMode::T1RT2 => 2,
            EnvelopeMode::Rotor => 3,
        }
    }
}

impl fmt::Display for EnvelopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeMode::T1 => write!(f, "T1 only"),
            EnvelopeMode::T1T2 => write!(f, "T1->T2"),
            EnvelopeMode::T1RT2 => write!(f, "T1->Release->T2"),
            EnvelopeMode::Rotor => write!(f, "Rotor"),
        }
    }
}

/// Decoded VCF block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vcf {
    block: u8,

    /// Left VCF output enabled.
    pub left: bool,
    /// Right VCF output enabled.
    pub right: bool,
    /// Filter mode, false = band pass, true = low pass.
    pub low_pass: bool,
    /// True for a 4-pole filter, false for 2-pole.
    pub four_poles: bool,
    /// WersiVoice VCF output enabled.
    pub wv_out: bool,
    pub noise: bool,
    pub distortion: bool,
    /// Filter cutoff frequency.
    pub frequency: i8,
    /// Filter quality (resonance).
    pub quality: u8,
    pub noise_type: NoiseType,
    /// Retrigger filter envelopes on a new note.
    pub retrigger: bool,
    pub env_mode: EnvelopeMode,
    /// Filter frequency tracks played notes.
    pub tracking: bool,
    pub t1_time: u8,
    pub t2_time: u8,
    pub t1_intensity: i8,
    pub t1_offset: i8,
    pub t2_intensity: i8,
    pub t2_offset: i8,
    /// Unattributed bits, preserved for round-trip fidelity.
    pub unknown_bits: u8,
}

impl Vcf {
    /// Decodes a VCF block from its 10-byte raw form.
    pub fn dissect(block: u8, raw: &[u8]) -> Self {
        debug_assert!(raw.len() >= VCF_SIZE);

        Vcf {
            block,
            left: raw[0] & 0x01 != 0,
            right: raw[0] & 0x02 != 0,
            low_pass: raw[0] & 0x04 != 0,
            four_poles: raw[0] & 0x08 != 0,
            wv_out: raw[0] & 0x10 != 0,
            noise: raw[0] & 0x20 != 0,
            distortion: raw[0] & 0x40 != 0,
            // Bit 7 unknown
            frequency: raw[1] as i8,
            quality: raw[2],
            // Bits 0-1 unknown
            noise_type: NoiseType::from_bits((raw[3] & 0x0c) >> 2),
            retrigger: raw[3] & 0x10 != 0,
            env_mode: EnvelopeMode::from_bits((raw[3] & 0x60) >> 5),
            tracking: raw[3] & 0x80 != 0,
            t1_time: raw[4],
            t2_time: raw[5],
            t1_intensity: raw[6] as i8,
            t1_offset: raw[7] as i8,
            t2_intensity: raw[8] as i8,
            t2_offset: raw[9] as i8,
            unknown_bits: (raw[3] & 0x03) | (raw[0] & 0x80),
        }
    }

    /// Writes the VCF back into its 10-byte raw form.
    pub fn update(&self, raw: &mut [u8]) {
        debug_assert!(raw.len() >= VCF_SIZE);

        raw[0] = (self.left as u8)
            | (self.right as u8) << 1
            | (self.low_pass as u8) << 2
            | (self.four_poles as u8) << 3
            | (self.wv_out as u8) << 4
            | (self.noise as u8) << 5
            | (self.distortion as u8) << 6
            | (self.unknown_bits & 0x80);
        raw[1] = self.frequency as u8;
        raw[2] = self.quality;
        raw[3] = (self.unknown_bits & 0x03)
            | self.noise_type.to_bits() << 2
            | (self.retrigger as u8) << 4
            | self.env_mode.to_bits() << 5
            | (self.tracking as u8) << 7;
        raw[4] = self.t1_time;
        raw[5] = self.t2_time;
        raw[6] = self.t1_intensity as u8;
        raw[7] = self.t1_offset as u8;
        raw[8] = self.t2_intensity as u8;
        raw[9] = self.t2_offset as u8;
    }

    pub fn block(&self) -> u8 {
        self.block
    }
}
