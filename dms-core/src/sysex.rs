// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! Wersi SysEx wire codec.
//!
//! Every raw payload byte travels as two SysEx bytes, one per nibble.
//! Each nibble byte carries a 2-bit type tag identifying the logical
//! field it belongs to (data, length, address or block type) and a
//! marker bit distinguishing the low-nibble byte of a pair, so a
//! decoder can detect torn or misaligned messages without any framing
//! beyond the usual F0..F7.

use crate::error::{DmsError, Result};

pub const SYSEX_START: u8 = 0xf0;
pub const SYSEX_END: u8 = 0xf7;

/// Vendor byte Wersi uses in outgoing messages.
pub const VENDOR_WERSI: u8 = 0x25;

/// Alternate vendor byte seen in replies from some devices.
pub const VENDOR_WERSI_ALT: u8 = 0x3b;

/// Device ID of the MK1/EX20 family.
pub const MK1_DEVICE_ID: u8 = 1;

/// Device ID of the DX10/DX5/EX10R family.
pub const DX10_DEVICE_ID: u8 = 2;

/// Fixed message header length: F0, vendor, device, then the three
/// nibble-encoded fields (type, address, length).
pub const HEADER_LEN: usize = 9;

// Nibble type tags.
const TAG_DATA: u8 = 0;
const TAG_LENGTH: u8 = 1;
const TAG_ADDRESS: u8 = 2;
const TAG_TYPE: u8 = 3;

// Marker bit set on the low-nibble byte of each pair.
const LOW_NIBBLE: u8 = 0x10;

/// Block type discriminants carried in the type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    /// Request a block from the instrument.
    RequestBlock = b'r',
    /// Control instrument switches.
    SwitchControl = b's',
    /// Write to the transform buffer (32 big-endian 16-bit words).
    TransformBuffer = b't',
    /// Instrument control block, 16 bytes.
    IcBlock = b'i',
    /// VCF block, 10 bytes.
    VcfBlock = b'v',
    /// FREQ block, 32 bytes.
    FreqBlock = b'f',
    /// AMPL block, 44 bytes.
    AmplBlock = b'a',
    /// FIXWAVE block, 212 bytes.
    FixWaveBlock = b'q',
    /// RELWAVE block, 177 bytes.
    RelWaveBlock = b'w',
}

impl BlockType {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'r' => Ok(BlockType::RequestBlock),
            b's' => Ok(BlockType::SwitchControl),
            b't' => Ok(BlockType::TransformBuffer),
            b'i' => Ok(BlockType::IcBlock),
            b'v' => Ok(BlockType::VcfBlock),
            b'f' => Ok(BlockType::FreqBlock),
            b'a' => Ok(BlockType::AmplBlock),
            b'q' => Ok(BlockType::FixWaveBlock),
            b'w' => Ok(BlockType::RelWaveBlock),
            _ => Err(DmsError::Protocol(format!(
                "invalid Wersi SysEx message: unknown block type 0x{byte:02x}"
            ))),
        }
    }
}

/// A decoded block message: type, block address and raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub block_type: BlockType,
    pub address: u8,
    pub data: Vec<u8>,
}

// Splits a byte into its nibble pair, low-nibble byte first.
fn byte_to_sysex(tag: u8, byte: u8) -> [u8; 2] {
    [
        (tag << 5) | LOW_NIBBLE | (byte & 0x0f),
        (tag << 5) | (byte >> 4),
    ]
}

// Reassembles a byte from its nibble pair, validating the tag and
// marker bits of both halves.
fn byte_from_sysex(tag: u8, lo: u8, hi: u8) -> Result<u8> {
    if lo & 0xf0 != (tag << 5) | LOW_NIBBLE || hi & 0xf0 != tag << 5 {
        return Err(DmsError::Protocol("invalid Wersi SysEx data".into()));
    }
    Ok((lo & 0x0f) | (hi & 0x0f) << 4)
}

/// Encodes a block message for the given device ID.
///
/// The result is `HEADER_LEN + 2 * data.len() + 1` bytes: the header,
/// one nibble pair per payload byte and the trailing F7.
pub fn to_sysex(device: u8, message: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 2 * message.data.len() + 1);
    out.push(SYSEX_START);
    out.push(VENDOR_WERSI);
    out.push(device);
    out.extend_from_slice(&byte_to_sysex(TAG_TYPE, message.block_type as u8));
    out.extend_from_slice(&byte_to_sysex(TAG_ADDRESS, message.address));
    out.extend_from_slice(&byte_to_sysex(TAG_LENGTH, message.data.len() as u8));
    for &byte in &message.data {
        out.extend_from_slice(&byte_to_sysex(TAG_DATA, byte));
    }
    out.push(SYSEX_END);
    out
}

/// Decodes a Wersi SysEx message, validating the framing, the vendor
/// byte, the device ID and the tag bits of every nibble pair.
pub fn from_sysex(device: u8, raw: &[u8]) -> Result<Message> {
    if raw.len() < HEADER_LEN + 1
        || raw[0] != SYSEX_START
        || !matches!(raw[1], VENDOR_WERSI | VENDOR_WERSI_ALT)
        || raw[2] != device
    {
        return Err(DmsError::Protocol("invalid Wersi SysEx message".into()));
    }

    let block_type = BlockType::from_byte(byte_from_sysex(TAG_TYPE, raw[3], raw[4])?)?;
    let address = byte_from_sysex(TAG_ADDRESS, raw[5], raw[6])?;
    let length = byte_from_sysex(TAG_LENGTH, raw[7], raw[8])? as usize;

    if raw.len() != HEADER_LEN + 2 * length + 1 || raw[raw.len() - 1] != SYSEX_END {
        return Err(DmsError::Protocol("invalid Wersi SysEx message".into()));
    }

    let mut data = Vec::with_capacity(length);
    for pair in raw[HEADER_LEN..HEADER_LEN + 2 * length].chunks_exact(2) {
        data.push(byte_from_sysex(TAG_DATA, pair[0], pair[1])?);
    }

    Ok(Message {
        block_type,
        address,
        data,
    })
}
