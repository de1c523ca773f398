// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! ICB (instrument control block) codec.
//!
//! The ICB pulls together all elements of a sound by addressing VCF,
//! AMPL, FREQ and WAVE blocks. Audio routing and general sound
//! controls are also configured here.

use core::fmt;
use static_assertions::const_assert_eq;

/// Raw ICB record size in bytes.
pub const ICB_SIZE: usize = 16;

/// Length of the fixed-width voice name field.
pub const ICB_NAME_LEN: usize = 6;

const_assert_eq!(ICB_SIZE, 10 + ICB_NAME_LEN);

/// WersiVoice mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WvMode {
    RotorSlow,
    RotorFast,
    Flanger,
    Strings,
    Chorus,
    /// Unassigned mode value (5..=7), carried verbatim so the byte
    /// survives re-encoding.
    Invalid(u8),
}

impl WvMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => WvMode::RotorSlow,
            1 => WvMode::RotorFast,
            2 => WvMode::Flanger,
            3 => WvMode::Strings,
            4 => WvMode::Chorus,
            other => WvMode::Invalid(other),
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            WvMode::RotorSlow => 0,
            WvMode::RotorFast => 1,
            WvMode::Flanger => 2,
            WvMode::Strings => 3,
            WvMode::Chorus => 4,
            WvMode::Invalid(bits) => bits & 7,
        }
    }
}

impl fmt::Display for WvMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WvMode::RotorSlow => write!(f, "Rotor slow"),
            WvMode::RotorFast => write!(f, "Rotor fast"),
            WvMode::Flanger => write!(f, "Flanger"),
            WvMode::Strings => write!(f, "Strings"),
            WvMode::Chorus => write!(f, "Chorus"),
            WvMode::Invalid(_) => write!(f, ""),
        }
    }
}

/// Decoded instrument control block.
///
/// Address fields are either 0 (unset) or the block address of a
/// record of the matching kind in the same store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icb {
    block: u8,

    /// Next ICB address for layering, 0 on the last one.
    pub next_icb: u8,
    pub vcf_block: u8,
    pub ampl_block: u8,
    pub freq_block: u8,
    pub wave_block: u8,
    /// Left slave output enabled.
    pub left: bool,
    /// Right slave output enabled.
    pub right: bool,
    /// Disables the slave low pass when set.
    pub bright: bool,
    /// VCF slave output enabled.
    pub vcf_out: bool,
    /// WersiVoice slave output enabled.
    pub wv_out: bool,
    /// Transpose in semitones.
    pub transpose: i8,
    /// Detune (inverted).
    pub detune: i8,
    pub wv_mode: WvMode,
    pub wv_left: bool,
    pub wv_right: bool,
    /// WersiVoice feedback flat.
    pub wv_fb_flat: bool,
    /// WersiVoice feedback deep.
    pub wv_fb_deep: bool,
    /// Fixed-width voice name, space padded, not NUL terminated.
    pub name: [u8; ICB_NAME_LEN],
    /// Bits not attributed to a known field, preserved verbatim so
    /// records survive a decode/encode round trip.
    pub unknown_bits: u32,
}

impl Icb {
    /// Decodes an ICB from its 16-byte raw form. Every field is read
    /// eagerly; the caller has already validated the buffer region.
    pub fn dissect(block: u8, raw: &[u8]) -> Self {
        debug_assert!(raw.len() >= ICB_SIZE);

        let mut name = [0u8; ICB_NAME_LEN];
        name.copy_from_slice(&raw[10..16]);

        Icb {
            block,
            next_icb: raw[0],
            vcf_block: raw[1],
            ampl_block: raw[2],
            freq_block: raw[3],
            wave_block: raw[4],
            // Byte 5 unknown, bit 7 = fixed pitch?
            left: raw[6] & 0x01 != 0,
            right: raw[6] & 0x02 != 0,
            bright: raw[6] & 0x04 != 0,
            vcf_out: raw[6] & 0x08 != 0,
            wv_out: raw[6] & 0x10 != 0,
            transpose: raw[7] as i8,
            detune: raw[8] as i8,
            wv_mode: WvMode::from_bits(raw[9]),
            wv_left: raw[9] & 0x08 != 0,
            wv_right: raw[9] & 0x10 != 0,
            wv_fb_flat: raw[9] & 0x40 != 0,
            wv_fb_deep: raw[9] & 0x80 != 0,
            name,
            unknown_bits: raw[5] as u32
                | (((raw[6] & 0xe0) as u32) << 3)
                | (((raw[9] & 0x20) as u32) << 7),
        }
    }

    /// Writes the ICB back into its 16-byte raw form, the exact
    /// inverse of [`Icb::dissect`] including unknown bits.
    pub fn update(&self, raw: &mut [u8]) {
        debug_assert!(raw.len() >= ICB_SIZE);

        raw[0] = self.next_icb;
        raw[1] = self.vcf_block;
        raw[2] = self.ampl_block;
        raw[3] = self.freq_block;
        raw[4] = self.wave_block;
        raw[5] = (self.unknown_bits & 0xff) as u8;
        raw[6] = (self.left as u8)
            | (self.right as u8) << 1
            | (self.bright as u8) << 2
            | (self.vcf_out as u8) << 3
            | (self.wv_out as u8) << 4
            | ((self.unknown_bits >> 3) & 0xe0) as u8;
        raw[7] = self.transpose as u8;
        raw[8] = self.detune as u8;
        raw[9] = self.wv_mode.to_bits()
            | (self.wv_left as u8) << 3
            | (self.wv_right as u8) << 4
            | ((self.unknown_bits >> 7) & 0x20) as u8
            | (self.wv_fb_flat as u8) << 6
            | (self.wv_fb_deep as u8) << 7;
        raw[10..16].copy_from_slice(&self.name);
    }

    pub fn block(&self) -> u8 {
        self.block
    }

    /// Voice name with trailing padding removed, for display.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> [u8; ICB_SIZE] {
        [
            0x00, 0x81, 0x82, 0x83, 0x84, // links
            0xa5, // unknown byte 5
            0xff, // all flags plus unknown bits 5-7
            0xf4, // transpose -12
            0x03, // detune 3
            0xeb, // wv: mode 3, left, unknown bit 5, fb flat+deep
            b'P', b'I', b'A', b'N', b'O', b' ',
        ]
    }

    #[test]
    fn dissect_extracts_all_fields() {
        let icb = Icb::dissect(129, &sample_raw());
        assert_eq!(icb.next_icb, 0);
        assert_eq!(icb.vcf_block, 0x81);
        assert_eq!(icb.ampl_block, 0x82);
        assert_eq!(icb.freq_block, 0x83);
        assert_eq!(icb.wave_block, 0x84);
        assert!(icb.left && icb.right && icb.bright && icb.vcf_out && icb.wv_out);
        assert_eq!(icb.transpose, -12);
        assert_eq!(icb.detune, 3);
        assert_eq!(icb.wv_mode, WvMode::Strings);
        assert!(icb.wv_left);
        assert!(!icb.wv_right);
        assert!(icb.wv_fb_flat && icb.wv_fb_deep);
        assert_eq!(icb.name_str(), "PIANO");
        // byte 5, bits 5-7 of byte 6, bit 5 of byte 9
        assert_eq!(icb.unknown_bits, 0xa5 | (0xe0 << 3) | (0x20 << 7));
    }

    #[test]
    fn round_trip_preserves_every_bit() {
        let raw = sample_raw();
        let icb = Icb::dissect(129, &raw);
        let mut out = [0u8; ICB_SIZE];
        icb.update(&mut out);
        assert_eq!(out, raw);
        assert_eq!(Icb::dissect(129, &out), icb);
    }

    #[test]
    fn name_keeps_raw_padding() {
        let mut raw = sample_raw();
        raw[10..16].copy_from_slice(b"AB    ");
        let icb = Icb::dissect(130, &raw);
        assert_eq!(&icb.name, b"AB    ");
        assert_eq!(icb.name_str(), "AB");
        let mut out = [0u8; ICB_SIZE];
        icb.update(&mut out);
        assert_eq!(&out[10..16], b"AB    ");
    }

    #[test]
    fn wv_mode_names() {
        assert_eq!(WvMode::from_bits(0).to_string(), "Rotor slow");
        assert_eq!(WvMode::from_bits(4).to_string(), "Chorus");
        assert_eq!(WvMode::from_bits(7), WvMode::Invalid(7));
        assert_eq!(WvMode::Invalid(7).to_string(), "");
    }

    #[test]
    fn unassigned_wv_mode_values_survive_round_trip() {
        for mode in [5u8, 6, 7] {
            let mut raw = sample_raw();
            raw[9] = (raw[9] & !0x07) | mode;
            let icb = Icb::dissect(129, &raw);
            assert_eq!(icb.wv_mode, WvMode::Invalid(mode));
            let mut out = [0u8; ICB_SIZE];
            icb.update(&mut out);
            assert_eq!(out, raw);
        }
    }
}
