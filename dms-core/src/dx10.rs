// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! DX10/DX5 cartridge dissector.
//!
//! Unlike the MK1 format there are no pointer tables: 8 presets of
//! 250 bytes are followed by fixed-count runs of ICB, VCF, AMPL and
//! FREQ records, the presets/instruments checksum, then the WAVE
//! records. 16 KiB images append a rhythm/sequence region with its
//! own checksum.

use log::debug;

use crate::envelope::{AMPL_SIZE, Envelope, EnvelopeKind, FREQ_SIZE};
use crate::error::{DmsError, Result};
use crate::icb::{ICB_SIZE, Icb};
use crate::layout::{
    DX10_BANK_BLOCKS, DX10_BANK_VCFS, DX10_CARTRIDGE_ICB_BASE, DX10_CARTRIDGE_SATELLITE_BASE,
    DX10_CARTRIDGE_SIZES, DX10_CHECKSUM_SEED, DX10_CHECKSUM1_OFFSET, DX10_CHECKSUM2_OFFSET,
    DX10_PRESET_BYTES, DX10_RHYTHM_START, DX10_WAVE_REGION_END, block_addr, byte_sum, counter_sum,
    put_be16, verify_checksum,
};
use crate::store::{BlockMap, InstrumentStore};
use crate::vcf::{VCF_SIZE, Vcf};
use crate::wave::{WAVE_FIXED_SIZE, Wave};

fn invalid(msg: impl std::fmt::Display) -> DmsError {
    DmsError::DataFormat(format!("invalid DX10/DX5 cartridge: {msg}"))
}

// Decodes all blocks at their fixed offsets. The two cursor checks
// catch any drift between the record sizes and the format layout.
fn dissect_dx10(data: &[u8]) -> Result<BlockMap> {
    if !DX10_CARTRIDGE_SIZES.contains(&data.len()) {
        return Err(invalid("invalid raw data size"));
    }

    if !verify_checksum(
        data,
        0..DX10_CHECKSUM1_OFFSET,
        DX10_CHECKSUM_SEED,
        DX10_CHECKSUM1_OFFSET,
    ) {
        return Err(invalid(
            "checksum verification for presets/instruments failed",
        ));
    }
    if data.len() > DX10_CARTRIDGE_SIZES[0]
        && !verify_checksum(
            data,
            DX10_RHYTHM_START..DX10_CHECKSUM2_OFFSET,
            0,
            DX10_CHECKSUM2_OFFSET,
        )
    {
        return Err(invalid("checksum verification for rhythms/sequences failed"));
    }

    let mut blocks = BlockMap::default();
    let mut idx = DX10_PRESET_BYTES;

    for i in 0..DX10_BANK_BLOCKS {
        let addr = block_addr(DX10_CARTRIDGE_ICB_BASE, i);
        blocks
            .icb
            .insert(addr, Icb::dissect(addr, &data[idx..idx + ICB_SIZE]));
        idx += ICB_SIZE;
    }

    for i in 0..DX10_BANK_VCFS {
        let addr = DX10_CARTRIDGE_SATELLITE_BASE + i as u8;
        blocks
            .vcf
            .insert(addr, Vcf::dissect(addr, &data[idx..idx + VCF_SIZE]));
        idx += VCF_SIZE;
    }

    for i in 0..DX10_BANK_BLOCKS {
        let addr = block_addr(DX10_CARTRIDGE_SATELLITE_BASE, i);
        blocks.ampl.insert(
            addr,
            Envelope::dissect(addr, EnvelopeKind::Ampl, &data[idx..idx + AMPL_SIZE]),
        );
        idx += AMPL_SIZE;
    }

    for i in 0..DX10_BANK_BLOCKS {
        let addr = block_addr(DX10_CARTRIDGE_SATELLITE_BASE, i);
        blocks.freq.insert(
            addr,
            Envelope::dissect(addr, EnvelopeKind::Freq, &data[idx..idx + FREQ_SIZE]),
        );
        idx += FREQ_SIZE;
    }

    if idx != DX10_CHECKSUM1_OFFSET {
        return Err(invalid(
            "something went wrong extracting ICB, VCF, AMPL and FREQ",
        ));
    }
    idx += 2;

    for i in 0..DX10_BANK_BLOCKS {
        let addr = block_addr(DX10_CARTRIDGE_SATELLITE_BASE, i);
        blocks
            .wave
            .insert(addr, Wave::dissect(addr, &data[idx..idx + WAVE_FIXED_SIZE]));
        idx += WAVE_FIXED_SIZE;
    }

    if idx != DX10_WAVE_REGION_END {
        return Err(invalid("something went wrong extracting WAVE"));
    }

    debug!(
        "DX10 cartridge dissected: {} ICBs, {} VCFs, {} WAVEs",
        blocks.icb.len(),
        blocks.vcf.len(),
        blocks.wave.len()
    );
    Ok(blocks)
}

/// A DX10/DX5 cartridge image and the records decoded from it.
#[derive(Debug)]
pub struct Dx10Cartridge {
    data: Vec<u8>,
    blocks: BlockMap,
}

impl Dx10Cartridge {
    /// Takes ownership of a raw 8 or 16 KiB cartridge image and
    /// dissects it.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let blocks = dissect_dx10(&data)?;
        Ok(Dx10Cartridge { data, blocks })
    }

    /// Consumes the cartridge, returning the raw image.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl InstrumentStore for Dx10Cartridge {
    fn dissect(&mut self) -> Result<()> {
        self.blocks = dissect_dx10(&self.data)?;
        Ok(())
    }

    /// Writes every record back to its fixed offset and regenerates
    /// the presets/instruments checksum. The WAVE region is not
    /// covered by either checksum, and the rhythm region is never
    /// touched.
    fn update(&mut self) -> Result<()> {
        let mut idx = DX10_PRESET_BYTES;

        for i in 0..DX10_BANK_BLOCKS {
            let addr = block_addr(DX10_CARTRIDGE_ICB_BASE, i);
            if let Some(icb) = self.blocks.icb.get(&addr) {
                icb.update(&mut self.data[idx..idx + ICB_SIZE]);
            }
            idx += ICB_SIZE;
        }
        for i in 0..DX10_BANK_VCFS {
            let addr = DX10_CARTRIDGE_SATELLITE_BASE + i as u8;
            if let Some(vcf) = self.blocks.vcf.get(&addr) {
                vcf.update(&mut self.data[idx..idx + VCF_SIZE]);
            }
            idx += VCF_SIZE;
        }
        for i in 0..DX10_BANK_BLOCKS {
            let addr = block_addr(DX10_CARTRIDGE_SATELLITE_BASE, i);
            if let Some(ampl) = self.blocks.ampl.get(&addr) {
                ampl.update(&mut self.data[idx..idx + AMPL_SIZE]);
            }
            idx += AMPL_SIZE;
        }
        for i in 0..DX10_BANK_BLOCKS {
            let addr = block_addr(DX10_CARTRIDGE_SATELLITE_BASE, i);
            if let Some(freq) = self.blocks.freq.get(&addr) {
                freq.update(&mut self.data[idx..idx + FREQ_SIZE]);
            }
            idx += FREQ_SIZE;
        }

        let sum = byte_sum(&self.data, 0..DX10_CHECKSUM1_OFFSET, DX10_CHECKSUM_SEED);
        put_be16(&mut self.data, DX10_CHECKSUM1_OFFSET, counter_sum(sum));
        idx += 2;

        for i in 0..DX10_BANK_BLOCKS {
            let addr = block_addr(DX10_CARTRIDGE_SATELLITE_BASE, i);
            if let Some(wave) = self.blocks.wave.get(&addr) {
                wave.update(&mut self.data[idx..idx + WAVE_FIXED_SIZE]);
            }
            idx += WAVE_FIXED_SIZE;
        }

        Ok(())
    }

    fn num_icbs(&self) -> usize {
        // Ten primary instruments; the second run of ICBs holds layers.
        10
    }

    fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    fn blocks_mut(&mut self) -> &mut BlockMap {
        &mut self.blocks
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::layout::be16;

    pub(crate) fn sample_image(size: usize) -> Vec<u8> {
        let mut data = vec![0u8; size];

        let mut idx = DX10_PRESET_BYTES;
        for i in 0..DX10_BANK_BLOCKS {
            let raw = &mut data[idx..idx + ICB_SIZE];
            raw[1] = 193; // VCF link
            raw[10..16].copy_from_slice(b"DX    ");
            raw[10] = b'A' + i as u8;
            idx += ICB_SIZE;
        }
        idx += DX10_BANK_VCFS * VCF_SIZE
            + DX10_BANK_BLOCKS * AMPL_SIZE
            + DX10_BANK_BLOCKS * FREQ_SIZE;
        assert_eq!(idx, DX10_CHECKSUM1_OFFSET);
        idx += 2;
        for _ in 0..DX10_BANK_BLOCKS {
            data[idx] = 0x80 | 0x42;
            idx += WAVE_FIXED_SIZE;
        }
        assert_eq!(idx, DX10_WAVE_REGION_END);

        let sum = byte_sum(&data, 0..DX10_CHECKSUM1_OFFSET, DX10_CHECKSUM_SEED);
        put_be16(&mut data, DX10_CHECKSUM1_OFFSET, counter_sum(sum));
        if size > DX10_CARTRIDGE_SIZES[0] {
            let sum = byte_sum(&data, DX10_RHYTHM_START..DX10_CHECKSUM2_OFFSET, 0);
            put_be16(&mut data, DX10_CHECKSUM2_OFFSET, counter_sum(sum));
        }
        data
    }

    #[test]
    fn dissects_both_image_sizes() {
        for size in DX10_CARTRIDGE_SIZES {
            let cart = Dx10Cartridge::new(sample_image(size)).unwrap();
            let blocks = cart.blocks();
            assert_eq!(blocks.icb_count(), 20);

            // Address 204 is skipped between the two runs of ten.
            let addrs: Vec<u8> = blocks.iter_icbs().map(|(a, _)| a).collect();
            assert!(addrs.contains(&203) && addrs.contains(&205));
            assert!(!addrs.contains(&204));

            assert_eq!(blocks.icb(194).unwrap().name_str(), "A");
            assert_eq!(blocks.vcf(193).iter().count(), 1);
            assert!(blocks.vcf(203).is_none());
            assert_eq!(blocks.ampl(193).unwrap().data().len(), AMPL_SIZE);
            assert_eq!(blocks.wave(193).unwrap().size(), WAVE_FIXED_SIZE);
            assert_eq!(blocks.wave(193).unwrap().level, 0x42);
        }
    }

    #[test]
    fn rejects_bad_sizes_and_checksums() {
        let err = Dx10Cartridge::new(vec![0u8; 4096]).unwrap_err();
        assert!(err.to_string().contains("invalid raw data size"));

        let mut image = sample_image(8192);
        image[100] = image[100].wrapping_add(1);
        let err = Dx10Cartridge::new(image).unwrap_err();
        assert!(
            err.to_string()
                .contains("checksum verification for presets/instruments failed")
        );

        // Rhythm checksum only applies to 16 KiB images.
        let mut image = sample_image(16384);
        image[0x2100] = image[0x2100].wrapping_add(1);
        let err = Dx10Cartridge::new(image).unwrap_err();
        assert!(
            err.to_string()
                .contains("checksum verification for rhythms/sequences failed")
        );
    }

    #[test]
    fn update_regenerates_instrument_checksum() {
        let mut cart = Dx10Cartridge::new(sample_image(8192)).unwrap();
        let icb = cart.blocks_mut().icb_mut(205).unwrap();
        icb.detune = 7;
        let vcf = cart.blocks_mut().vcf_mut(195).unwrap();
        vcf.quality = 9;
        cart.update().unwrap();

        assert!(verify_checksum(
            cart.data(),
            0..DX10_CHECKSUM1_OFFSET,
            DX10_CHECKSUM_SEED,
            DX10_CHECKSUM1_OFFSET
        ));
        let stored = be16(cart.data(), DX10_CHECKSUM1_OFFSET);
        assert_ne!(stored, 0);

        let reread = Dx10Cartridge::new(cart.into_data()).unwrap();
        assert_eq!(reread.blocks().icb(205).unwrap().detune, 7);
        assert_eq!(reread.blocks().vcf(195).unwrap().quality, 9);
    }
}
