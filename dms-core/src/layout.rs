// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! Address arithmetic and checksum rules shared by the dissectors.
//!
//! The block-address bases and the skip-one-past-index-10 rule are the
//! most error-prone pieces of the whole format family, so they live
//! here as named functions rather than inline arithmetic.

/// MK1/EX20 cartridge image size in bytes.
pub const MK1_CARTRIDGE_SIZE: usize = 16384;

/// End of the MK1 checksummed region; the 16-bit checksum itself is
/// stored big-endian at this offset.
pub const MK1_CHECKSUM_OFFSET: usize = 0x3ffe;

/// First ICB block address on an MK1 cartridge (bit 7 marks the
/// cartridge address range, ICBs count from 1).
pub const MK1_ICB_BASE: u8 = 129;

/// Base address for VCF/AMPL/FREQ/WAVE blocks on an MK1 cartridge.
pub const MK1_SATELLITE_BASE: u8 = 128;

/// Number of instruments guaranteed to be present on an MK1 cartridge.
pub const MK1_GUARANTEED_ICBS: usize = 20;

/// Valid DX10/DX5 cartridge image sizes (presets only / with rhythms).
pub const DX10_CARTRIDGE_SIZES: [usize; 2] = [8192, 16384];

/// Seed for the DX10 preset/instrument checksum.
pub const DX10_CHECKSUM_SEED: u16 = 0x3131;

/// End of the DX10 preset/instrument region; checksum 1 is stored
/// big-endian here, immediately after the FREQ blocks.
pub const DX10_CHECKSUM1_OFFSET: usize = 0x0f64;

/// Start of the DX10 rhythm/sequence region (16 KiB images only).
pub const DX10_RHYTHM_START: usize = 0x2000;

/// End of the DX10 rhythm/sequence region; checksum 2 is stored
/// big-endian here.
pub const DX10_CHECKSUM2_OFFSET: usize = 0x3ffe;

/// Offset one past the last WAVE block in a DX10 cartridge.
pub const DX10_WAVE_REGION_END: usize = 0x1ff6;

/// Bytes of preset data preceding the instrument blocks in a DX10
/// cartridge (8 presets of 250 bytes each).
pub const DX10_PRESET_BYTES: usize = 8 * 250;

/// DX10/EX10R device RAM image size in bytes.
pub const DX10_DEVICE_SIZE: usize = 6180;

/// ICB block address base in a DX10 cartridge.
pub const DX10_CARTRIDGE_ICB_BASE: u8 = 194;

/// VCF/AMPL/FREQ/WAVE block address base in a DX10 cartridge.
pub const DX10_CARTRIDGE_SATELLITE_BASE: u8 = 193;

/// ICB block address base in DX10 device RAM.
pub const DX10_DEVICE_ICB_BASE: u8 = 66;

/// VCF/AMPL/FREQ/WAVE block address base in DX10 device RAM.
pub const DX10_DEVICE_SATELLITE_BASE: u8 = 65;

/// Offset between cartridge-space and device-space block addressing.
/// Applied when moving a cartridge voice bank into device memory.
pub const CARTRIDGE_TO_DEVICE_OFFSET: u8 = 128;

/// Number of ICB/AMPL/FREQ/WAVE blocks in a DX10-family bank.
pub const DX10_BANK_BLOCKS: usize = 20;

/// Number of VCF blocks in a DX10-family bank.
pub const DX10_BANK_VCFS: usize = 10;

/// Block address for the `index`-th block of a DX10-family sequence
/// starting at `base`. One address is skipped after the first ten
/// blocks, so e.g. base 194 yields 194..=203 then 205..=214.
pub fn block_addr(base: u8, index: usize) -> u8 {
    let mut addr = base + index as u8;
    if index >= 10 {
        addr += 1;
    }
    addr
}

/// Big-endian 16-bit read at `offset`. Caller guarantees bounds.
pub fn be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Big-endian 16-bit write at `offset`. Caller guarantees bounds.
pub fn put_be16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Wrapping 16-bit byte sum over `data[range]` starting from `seed`.
pub fn byte_sum(data: &[u8], range: std::ops::Range<usize>, seed: u16) -> u16 {
    data[range]
        .iter()
        .fold(seed, |sum, &b| sum.wrapping_add(b as u16))
}

/// Checksum value that makes `sum + checksum == 0 (mod 2^16)`.
pub fn counter_sum(sum: u16) -> u16 {
    0u16.wrapping_sub(sum)
}

/// Verifies a summed region against its stored big-endian checksum.
/// The region sum plus the stored value must be 0 modulo 2^16.
pub fn verify_checksum(
    data: &[u8],
    range: std::ops::Range<usize>,
    seed: u16,
    checksum_offset: usize,
) -> bool {
    let sum = byte_sum(data, range, seed);
    sum.wrapping_add(be16(data, checksum_offset)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_addr_skips_one_past_index_ten() {
        let addrs: Vec<u8> = (0..20).map(|i| block_addr(194, i)).collect();
        assert_eq!(addrs[..10], (194..=203).collect::<Vec<u8>>()[..]);
        assert_eq!(addrs[10..], (205..=214).collect::<Vec<u8>>()[..]);
        assert!(!addrs.contains(&204));

        assert_eq!(block_addr(65, 0), 65);
        assert_eq!(block_addr(65, 9), 74);
        assert_eq!(block_addr(65, 10), 76);
        assert_eq!(block_addr(66, 19), 86);
    }

    #[test]
    fn checksum_counter_sum_cancels() {
        let mut data = vec![0u8; 64];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i * 7) as u8;
        }
        let sum = byte_sum(&data, 0..62, 0);
        put_be16(&mut data, 62, counter_sum(sum));
        assert!(verify_checksum(&data, 0..62, 0, 62));

        // Any single-byte mutation in the summed region must break it.
        data[17] = data[17].wrapping_add(1);
        assert!(!verify_checksum(&data, 0..62, 0, 62));
    }

    #[test]
    fn seeded_checksum() {
        let mut data = vec![3u8; 32];
        let sum = byte_sum(&data, 0..30, DX10_CHECKSUM_SEED);
        put_be16(&mut data, 30, counter_sum(sum));
        assert!(verify_checksum(&data, 0..30, DX10_CHECKSUM_SEED, 30));
        assert!(!verify_checksum(&data, 0..30, 0, 30));
    }
}
