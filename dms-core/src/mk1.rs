// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! MK1/EX20 cartridge dissector.
//!
//! MK1 cartridges are pointer based: a 12-byte header holds the
//! big-endian offsets of five pointer tables (ICB, VCF, AMPL, FREQ,
//! WAVE), each table entry holding the offset of one record. The set
//! of blocks present is discovered while walking the ICBs, whose link
//! fields raise the upper bound for every satellite kind.

use log::debug;

use crate::envelope::{AMPL_SIZE, Envelope, EnvelopeKind, FREQ_SIZE};
use crate::error::{DmsError, Result};
use crate::icb::{ICB_SIZE, Icb};
use crate::layout::{
    MK1_CARTRIDGE_SIZE, MK1_CHECKSUM_OFFSET, MK1_GUARANTEED_ICBS, MK1_ICB_BASE, MK1_SATELLITE_BASE,
    be16, byte_sum, counter_sum, put_be16, verify_checksum,
};
use crate::store::{BlockMap, InstrumentStore};
use crate::vcf::{VCF_SIZE, Vcf};
use crate::wave::{WAVE_FIXED_SIZE, WAVE_RELATIVE_SIZE, Wave};

// Header offsets of the five pointer-table pointers.
const ICB_TABLE_PTR: usize = 2;
const VCF_TABLE_PTR: usize = 4;
const AMPL_TABLE_PTR: usize = 6;
const FREQ_TABLE_PTR: usize = 8;
const WAVE_TABLE_PTR: usize = 10;

fn invalid(msg: impl std::fmt::Display) -> DmsError {
    DmsError::DataFormat(format!("invalid MK1 cartridge: {msg}"))
}

// Resolves one pointer-table entry to a record offset, rejecting
// offsets that reach into the checksum trailer.
fn table_entry(data: &[u8], table: u16, index: usize, what: &str) -> Result<usize> {
    let entry = table as usize + 2 * index;
    if entry + 2 > MK1_CHECKSUM_OFFSET {
        return Err(invalid(format!("invalid {what} table")));
    }
    let offset = be16(data, entry) as usize;
    if offset >= MK1_CHECKSUM_OFFSET {
        return Err(invalid(format!("invalid {what} pointer")));
    }
    Ok(offset)
}

fn record_slice<'a>(data: &'a [u8], offset: usize, size: usize, what: &str) -> Result<&'a [u8]> {
    data.get(offset..offset + size)
        .ok_or_else(|| invalid(format!("{what} record at 0x{offset:04x} is out of bounds")))
}

// Reads and bounds-checks one of the five table pointers from the
// header.
fn table_ptr(data: &[u8], offset: usize, what: &str) -> Result<u16> {
    let ptr = be16(data, offset);
    if ptr as usize >= MK1_CHECKSUM_OFFSET {
        return Err(invalid(format!("invalid {what} table pointer")));
    }
    Ok(ptr)
}

struct Tables {
    icb: u16,
    vcf: u16,
    ampl: u16,
    freq: u16,
    wave: u16,
}

fn read_tables(data: &[u8]) -> Result<Tables> {
    Ok(Tables {
        icb: table_ptr(data, ICB_TABLE_PTR, "ICB")?,
        vcf: table_ptr(data, VCF_TABLE_PTR, "VCF")?,
        ampl: table_ptr(data, AMPL_TABLE_PTR, "AMPL")?,
        freq: table_ptr(data, FREQ_TABLE_PTR, "FREQ")?,
        wave: table_ptr(data, WAVE_TABLE_PTR, "WAVE")?,
    })
}

// Walks the pointer tables and decodes every reachable block. Builds
// a fresh map so a failure part-way leaves the caller's state alone.
fn dissect_mk1(data: &[u8]) -> Result<BlockMap> {
    if be16(data, 0) != 0xffff {
        return Err(invalid("first two bytes need to be 0xff"));
    }
    if !verify_checksum(data, 0..MK1_CHECKSUM_OFFSET, 0, MK1_CHECKSUM_OFFSET) {
        return Err(invalid("checksum verification failed"));
    }

    let tables = read_tables(data)?;
    let mut blocks = BlockMap::default();

    // The first 20 ICBs are always present; link fields can raise the
    // ICB bound and establish how many satellite blocks exist. The
    // walk runs in usize so a link of 255 cannot wrap the counter.
    let mut current = MK1_ICB_BASE as usize;
    let mut max_icb = current + MK1_GUARANTEED_ICBS - 1;
    let mut max_vcf = 0u8;
    let mut max_ampl = 0u8;
    let mut max_freq = 0u8;
    let mut max_wave = 0u8;

    while current <= max_icb {
        let index = current - MK1_ICB_BASE as usize;
        let offset = table_entry(data, tables.icb, index, "ICB")?;
        let icb = Icb::dissect(current as u8, record_slice(data, offset, ICB_SIZE, "ICB")?);
        max_icb = max_icb.max(icb.next_icb as usize);
        max_vcf = max_vcf.max(icb.vcf_block);
        max_ampl = max_ampl.max(icb.ampl_block);
        max_freq = max_freq.max(icb.freq_block);
        max_wave = max_wave.max(icb.wave_block);
        blocks.icb.insert(current as u8, icb);
        current += 1;
    }
    debug!(
        "MK1 ICB walk done: {} ICBs, satellite bounds vcf={max_vcf} ampl={max_ampl} freq={max_freq} wave={max_wave}",
        blocks.icb.len()
    );

    for current in MK1_SATELLITE_BASE..max_vcf {
        let index = (current - MK1_SATELLITE_BASE) as usize;
        let offset = table_entry(data, tables.vcf, index, "VCF")?;
        let vcf = Vcf::dissect(current, record_slice(data, offset, VCF_SIZE, "VCF")?);
        blocks.vcf.insert(current, vcf);
    }

    for current in MK1_SATELLITE_BASE..max_ampl {
        let index = (current - MK1_SATELLITE_BASE) as usize;
        let offset = table_entry(data, tables.ampl, index, "AMPL")?;
        let ampl = Envelope::dissect(
            current,
            EnvelopeKind::Ampl,
            record_slice(data, offset, AMPL_SIZE, "AMPL")?,
        );
        blocks.ampl.insert(current, ampl);
    }

    for current in MK1_SATELLITE_BASE..max_freq {
        let index = (current - MK1_SATELLITE_BASE) as usize;
        let offset = table_entry(data, tables.freq, index, "FREQ")?;
        let freq = Envelope::dissect(
            current,
            EnvelopeKind::Freq,
            record_slice(data, offset, FREQ_SIZE, "FREQ")?,
        );
        blocks.freq.insert(current, freq);
    }

    for current in MK1_SATELLITE_BASE..max_wave {
        let index = (current - MK1_SATELLITE_BASE) as usize;
        let offset = table_entry(data, tables.wave, index, "WAVE")?;
        // Bit 7 of the first record byte selects the 212-byte fixed
        // formant form over the 177-byte relative form.
        let size = if data[offset] & 0x80 != 0 {
            WAVE_FIXED_SIZE
        } else {
            WAVE_RELATIVE_SIZE
        };
        let wave = Wave::dissect(current, record_slice(data, offset, size, "WAVE")?);
        blocks.wave.insert(current, wave);
    }

    Ok(blocks)
}

/// An MK1/EX20 cartridge image and the records decoded from it.
#[derive(Debug)]
pub struct Mk1Cartridge {
    data: Vec<u8>,
    blocks: BlockMap,
}

impl Mk1Cartridge {
    /// Takes ownership of a raw 16 KiB cartridge image and dissects
    /// it.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() != MK1_CARTRIDGE_SIZE {
            return Err(invalid("invalid raw data size"));
        }
        let blocks = dissect_mk1(&data)?;
        Ok(Mk1Cartridge { data, blocks })
    }

    /// Consumes the cartridge, returning the raw image.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl InstrumentStore for Mk1Cartridge {
    fn dissect(&mut self) -> Result<()> {
        self.blocks = dissect_mk1(&self.data)?;
        Ok(())
    }

    /// Writes every record back to its pointed-to location and
    /// regenerates the cartridge checksum.
    fn update(&mut self) -> Result<()> {
        let tables = read_tables(&self.data)?;

        for (&addr, icb) in &self.blocks.icb {
            let index = (addr - MK1_ICB_BASE) as usize;
            let offset = table_entry(&self.data, tables.icb, index, "ICB")?;
            record_slice(&self.data, offset, ICB_SIZE, "ICB")?;
            icb.update(&mut self.data[offset..offset + ICB_SIZE]);
        }
        for (&addr, vcf) in &self.blocks.vcf {
            let index = (addr - MK1_SATELLITE_BASE) as usize;
            let offset = table_entry(&self.data, tables.vcf, index, "VCF")?;
            record_slice(&self.data, offset, VCF_SIZE, "VCF")?;
            vcf.update(&mut self.data[offset..offset + VCF_SIZE]);
        }
        for (&addr, ampl) in &self.blocks.ampl {
            let index = (addr - MK1_SATELLITE_BASE) as usize;
            let offset = table_entry(&self.data, tables.ampl, index, "AMPL")?;
            record_slice(&self.data, offset, AMPL_SIZE, "AMPL")?;
            ampl.update(&mut self.data[offset..offset + AMPL_SIZE]);
        }
        for (&addr, freq) in &self.blocks.freq {
            let index = (addr - MK1_SATELLITE_BASE) as usize;
            let offset = table_entry(&self.data, tables.freq, index, "FREQ")?;
            record_slice(&self.data, offset, FREQ_SIZE, "FREQ")?;
            freq.update(&mut self.data[offset..offset + FREQ_SIZE]);
        }
        for (&addr, wave) in &self.blocks.wave {
            let index = (addr - MK1_SATELLITE_BASE) as usize;
            let offset = table_entry(&self.data, tables.wave, index, "WAVE")?;
            let size = wave.size();
            record_slice(&self.data, offset, size, "WAVE")?;
            wave.update(&mut self.data[offset..offset + size]);
        }

        let sum = byte_sum(&self.data, 0..MK1_CHECKSUM_OFFSET, 0);
        put_be16(&mut self.data, MK1_CHECKSUM_OFFSET, counter_sum(sum));
        Ok(())
    }

    fn num_icbs(&self) -> usize {
        MK1_GUARANTEED_ICBS
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

    const ICB_TABLE: u16 = 0x0100;
    const VCF_TABLE: u16 = 0x0200;
    const AMPL_TABLE: u16 = 0x0280;
    const FREQ_TABLE: u16 = 0x0300;
    const WAVE_TABLE: u16 = 0x0380;

    const ICB_DATA: u16 = 0x0400;
    const VCF_DATA: u16 = 0x0600;
    const AMPL_DATA: u16 = 0x0700;
    const FREQ_DATA: u16 = 0x0750;
    const WAVE_DATA: u16 = 0x0800;

    // Builds a minimal valid image: 20 ICBs, two VCFs, one AMPL, one
    // FREQ, one fixed and one relative WAVE.
    pub(crate) fn sample_image() -> Vec<u8> {
        let mut data = vec![0u8; MK1_CARTRIDGE_SIZE];
        put_be16(&mut data, 0, 0xffff);
        put_be16(&mut data, ICB_TABLE_PTR, ICB_TABLE);
        put_be16(&mut data, VCF_TABLE_PTR, VCF_TABLE);
        put_be16(&mut data, AMPL_TABLE_PTR, AMPL_TABLE);
        put_be16(&mut data, FREQ_TABLE_PTR, FREQ_TABLE);
        put_be16(&mut data, WAVE_TABLE_PTR, WAVE_TABLE);

        for i in 0..20u16 {
            let offset = ICB_DATA + i * ICB_SIZE as u16;
            put_be16(&mut data, (ICB_TABLE + i * 2) as usize, offset);
            let raw = &mut data[offset as usize..offset as usize + ICB_SIZE];
            raw[1] = 130; // VCF link, satellites 128 and 129 exist
            raw[2] = 129; // AMPL
            raw[3] = 129; // FREQ
            raw[4] = 130; // WAVE
            raw[10..16].copy_from_slice(b"VOICE ");
            raw[15] = b'0' + (i % 10) as u8;
        }

        for i in 0..2u16 {
            let offset = VCF_DATA + i * VCF_SIZE as u16;
            put_be16(&mut data, (VCF_TABLE + i * 2) as usize, offset);
            data[offset as usize] = 0x03; // left + right
        }

        put_be16(&mut data, AMPL_TABLE as usize, AMPL_DATA);
        put_be16(&mut data, FREQ_TABLE as usize, FREQ_DATA);

        // WAVE 128 fixed form, WAVE 129 relative form.
        put_be16(&mut data, WAVE_TABLE as usize, WAVE_DATA);
        put_be16(
            &mut data,
            WAVE_TABLE as usize + 2,
            WAVE_DATA + WAVE_FIXED_SIZE as u16,
        );
        data[WAVE_DATA as usize] = 0x80 | 0x20;
        data[WAVE_DATA as usize + WAVE_FIXED_SIZE] = 0x15;

        let sum = byte_sum(&data, 0..MK1_CHECKSUM_OFFSET, 0);
        put_be16(&mut data, MK1_CHECKSUM_OFFSET, counter_sum(sum));
        data
    }

    #[test]
    fn dissects_sample_image() {
        let cart = Mk1Cartridge::new(sample_image()).unwrap();
        let blocks = cart.blocks();

        // No address gap on MK1; 20 contiguous ICBs from 129.
        assert_eq!(blocks.icb_count(), 20);
        let addrs: Vec<u8> = blocks.iter_icbs().map(|(a, _)| a).collect();
        assert_eq!(addrs, (129..=148).collect::<Vec<u8>>());

        let icb = blocks.icb(129).unwrap();
        assert_eq!(icb.vcf_block, 130);
        assert_eq!(icb.name_str(), "VOICE0");

        assert!(blocks.vcf(128).is_some());
        assert!(blocks.vcf(129).is_some());
        assert!(blocks.vcf(130).is_none());
        assert!(blocks.ampl(128).is_some());
        assert!(blocks.freq(128).is_some());
        assert_eq!(blocks.wave(128).unwrap().size(), WAVE_FIXED_SIZE);
        assert!(blocks.wave(128).unwrap().fixed_formants);
        assert_eq!(blocks.wave(129).unwrap().size(), WAVE_RELATIVE_SIZE);
        assert_eq!(blocks.wave(129).unwrap().level, 0x15);
    }

    #[test]
    fn update_writes_back_and_fixes_checksum() {
        let mut cart = Mk1Cartridge::new(sample_image()).unwrap();
        let icb = cart.blocks_mut().icb_mut(130).unwrap();
        icb.transpose = -12;
        icb.name.copy_from_slice(b"EDITED");
        cart.update().unwrap();

        assert!(verify_checksum(
            cart.data(),
            0..MK1_CHECKSUM_OFFSET,
            0,
            MK1_CHECKSUM_OFFSET
        ));

        let reread = Mk1Cartridge::new(cart.into_data()).unwrap();
        let icb = reread.blocks().icb(130).unwrap();
        assert_eq!(icb.transpose, -12);
        assert_eq!(icb.name_str(), "EDITED");
    }

    #[test]
    fn rejects_bad_header_and_checksum() {
        let err = Mk1Cartridge::new(vec![0u8; 100]).unwrap_err();
        assert!(err.to_string().contains("invalid MK1 cartridge"));

        let mut image = sample_image();
        image[0] = 0;
        assert!(Mk1Cartridge::new(image).is_err());

        let mut image = sample_image();
        image[0x1000] = image[0x1000].wrapping_add(1);
        let err = Mk1Cartridge::new(image).unwrap_err();
        assert!(err.to_string().contains("checksum verification failed"));
        assert!(err.is_data_format());
    }

    #[test]
    fn rejects_out_of_range_table_pointer() {
        let mut image = sample_image();
        put_be16(&mut image, ICB_TABLE_PTR, 0x3ffe);
        let sum = byte_sum(&image, 0..MK1_CHECKSUM_OFFSET, 0);
        put_be16(&mut image, MK1_CHECKSUM_OFFSET, counter_sum(sum));
        let err = Mk1Cartridge::new(image).unwrap_err();
        assert!(err.to_string().contains("invalid ICB table pointer"));
    }
}
