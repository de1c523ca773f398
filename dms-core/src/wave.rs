// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! WAVE block codec.
//!
//! A WAVE block carries per-register waveform tables (bass, tenor,
//! alto, soprano) and, in its 212-byte form, additional fixed-formant
//! data. Shorter blocks simply omit the trailing registers; absent
//! regions decode as zeros and are not written back.

/// Size of a WAVE block with fixed-formant data.
pub const WAVE_FIXED_SIZE: usize = 212;

/// Size of a WAVE block without fixed-formant data.
pub const WAVE_RELATIVE_SIZE: usize = 177;

/// Decoded WAVE block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    block: u8,
    size: usize,

    /// Wave output level, 7 bits.
    pub level: u8,
    /// True if the wave uses fixed formants (bit 7 of byte 0; also
    /// selects the 212-byte form on MK1 cartridges).
    pub fixed_formants: bool,
    pub bass: [u8; 64],
    pub tenor: [u8; 64],
    pub alto: [u8; 32],
    pub soprano: [u8; 16],
    pub fixed_formant_data: [u8; 35],
}

impl Wave {
    /// Decodes a WAVE block; the register set present is derived from
    /// the raw size (16 to 212 bytes).
    pub fn dissect(block: u8, raw: &[u8]) -> Self {
        let size = raw.len();

        let mut wave = Wave {
            block,
            size,
            level: raw[0] & 0x7f,
            fixed_formants: raw[0] & 0x80 != 0,
            bass: [0; 64],
            tenor: [0; 64],
            alto: [0; 32],
            soprano: [0; 16],
            fixed_formant_data: [0; 35],
        };

        if size > 64 {
            wave.bass.copy_from_slice(&raw[1..65]);
        }
        if size > 128 {
            wave.tenor.copy_from_slice(&raw[65..129]);
        }
        if size > 160 {
            wave.alto.copy_from_slice(&raw[129..161]);
        }
        if size > 176 {
            wave.soprano.copy_from_slice(&raw[161..177]);
        }
        if size > 211 {
            wave.fixed_formant_data.copy_from_slice(&raw[177..212]);
        }

        wave
    }

    /// Writes the WAVE block back; only the regions covered by the
    /// block's size are touched.
    pub fn update(&self, raw: &mut [u8]) {
        debug_assert!(raw.len() >= self.size);

        raw[0] = (self.level & 0x7f) | (self.fixed_formants as u8) << 7;
        if self.size > 64 {
            raw[1..65].copy_from_slice(&self.bass);
        }
        if self.size > 128 {
            raw[65..129].copy_from_slice(&self.tenor);
        }
        if self.size > 160 {
            raw[129..161].copy_from_slice(&self.alto);
        }
        if self.size > 176 {
            raw[161..177].copy_from_slice(&self.soprano);
        }
        if self.size > 211 {
            raw[177..212].copy_from_slice(&self.fixed_formant_data);
        }
    }

    pub fn block(&self) -> u8 {
        self.block
    }

    /// Raw encoded size of this block in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}
