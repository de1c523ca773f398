// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! Instrument store: decoded block records keyed by block address.
//!
//! A store owns one raw buffer (cartridge image or device RAM mirror)
//! and the records decoded from it. Block addresses are 8-bit and the
//! numeric ranges overlap across record kinds, so each kind gets its
//! own map; an address valid for one kind may be absent for another,
//! which is a normal lookup outcome.

use std::collections::BTreeMap;

use crate::envelope::Envelope;
use crate::error::{DmsError, Result};
use crate::icb::Icb;
use crate::layout::CARTRIDGE_TO_DEVICE_OFFSET;
use crate::vcf::Vcf;
use crate::wave::Wave;

/// The five per-kind block maps of a store.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    pub(crate) icb: BTreeMap<u8, Icb>,
    pub(crate) vcf: BTreeMap<u8, Vcf>,
    pub(crate) ampl: BTreeMap<u8, Envelope>,
    pub(crate) freq: BTreeMap<u8, Envelope>,
    pub(crate) wave: BTreeMap<u8, Wave>,
}

impl BlockMap {
    pub fn icb(&self, block: u8) -> Option<&Icb> {
        self.icb.get(&block)
    }

    pub fn vcf(&self, block: u8) -> Option<&Vcf> {
        self.vcf.get(&block)
    }

    pub fn ampl(&self, block: u8) -> Option<&Envelope> {
        self.ampl.get(&block)
    }

    pub fn freq(&self, block: u8) -> Option<&Envelope> {
        self.freq.get(&block)
    }

    pub fn wave(&self, block: u8) -> Option<&Wave> {
        self.wave.get(&block)
    }

    pub fn icb_mut(&mut self, block: u8) -> Option<&mut Icb> {
        self.icb.get_mut(&block)
    }

    pub fn vcf_mut(&mut self, block: u8) -> Option<&mut Vcf> {
        self.vcf.get_mut(&block)
    }

    /// The externally visible instrument list: the ICB map in
    /// ascending block-address order. VCF/AMPL/FREQ/WAVE blocks are
    /// satellite data reached through an ICB's block pointers.
    pub fn iter_icbs(&self) -> impl Iterator<Item = (u8, &Icb)> {
        self.icb.iter().map(|(&addr, icb)| (addr, icb))
    }

    pub fn icb_count(&self) -> usize {
        self.icb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icb.is_empty()
            && self.vcf.is_empty()
            && self.ampl.is_empty()
            && self.freq.is_empty()
            && self.wave.is_empty()
    }
}

/// Common interface of cartridge and device stores.
///
/// A store is either undissected (buffer attached, no records) or
/// dissected (all maps populated); `dissect` is the only transition
/// and never exposes a partially populated state.
pub trait InstrumentStore {
    /// Re-parses the raw buffer, replacing the record set.
    fn dissect(&mut self) -> Result<()>;

    /// Writes all records back into the raw buffer, regenerating any
    /// checksums the format carries.
    fn update(&mut self) -> Result<()>;

    /// Format-specific number of primary ICBs.
    fn num_icbs(&self) -> usize;

    fn blocks(&self) -> &BlockMap;

    fn blocks_mut(&mut self) -> &mut BlockMap;

    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];
}

fn remap_addr(addr: u8, what: &str) -> Result<u8> {
    addr.checked_sub(CARTRIDGE_TO_DEVICE_OFFSET).ok_or_else(|| {
        DmsError::DataFormat(format!(
            "{what} address {addr} is not in the cartridge address range"
        ))
    })
}

/// Remaps an ICB link field from cartridge space to device space.
/// A 0 link means "unset" and stays 0.
fn remap_link(link: u8, what: &str) -> Result<u8> {
    if link == 0 {
        Ok(0)
    } else {
        remap_addr(link, what)
    }
}

/// Merges a cartridge store's voice bank into a device store.
///
/// Source block addresses and ICB link fields are shifted from
/// cartridge space into device space; only destination addresses that
/// already exist as slots are written, and a remapped address with no
/// matching destination slot is rejected rather than silently skipped.
/// The destination buffer is rewritten afterwards.
pub fn copy_contents(dest: &mut dyn InstrumentStore, source: &BlockMap) -> Result<()> {
    let mut remapped = BlockMap::default();

    for (&addr, icb) in &source.icb {
        let new_addr = remap_addr(addr, "ICB")?;
        if !dest.blocks().icb.contains_key(&new_addr) {
            return Err(DmsError::DataFormat(format!(
                "ICB address {addr} has no destination slot {new_addr}"
            )));
        }
        let mut icb = icb.clone();
        icb.next_icb = remap_link(icb.next_icb, "next ICB")?;
        icb.vcf_block = remap_link(icb.vcf_block, "VCF link")?;
        icb.ampl_block = remap_link(icb.ampl_block, "AMPL link")?;
        icb.freq_block = remap_link(icb.freq_block, "FREQ link")?;
        icb.wave_block = remap_link(icb.wave_block, "WAVE link")?;
        remapped.icb.insert(new_addr, icb);
    }

    for (&addr, vcf) in &source.vcf {
        let new_addr = remap_addr(addr, "VCF")?;
        if !dest.blocks().vcf.contains_key(&new_addr) {
            return Err(DmsError::DataFormat(format!(
                "VCF address {addr} has no destination slot {new_addr}"
            )));
        }
        remapped.vcf.insert(new_addr, vcf.clone());
    }

    for (&addr, ampl) in &source.ampl {
        let new_addr = remap_addr(addr, "AMPL")?;
        if !dest.blocks().ampl.contains_key(&new_addr) {
            return Err(DmsError::DataFormat(format!(
                "AMPL address {addr} has no destination slot {new_addr}"
            )));
        }
        remapped.ampl.insert(new_addr, ampl.clone());
    }

    for (&addr, freq) in &source.freq {
        let new_addr = remap_addr(addr, "FREQ")?;
        if !dest.blocks().freq.contains_key(&new_addr) {
            return Err(DmsError::DataFormat(format!(
                "FREQ address {addr} has no destination slot {new_addr}"
            )));
        }
        remapped.freq.insert(new_addr, freq.clone());
    }

    for (&addr, wave) in &source.wave {
        let new_addr = remap_addr(addr, "WAVE")?;
        if !dest.blocks().wave.contains_key(&new_addr) {
            return Err(DmsError::DataFormat(format!(
                "WAVE address {addr} has no destination slot {new_addr}"
            )));
        }
        remapped.wave.insert(new_addr, wave.clone());
    }

    let blocks = dest.blocks_mut();
    blocks.icb.extend(remapped.icb);
    blocks.vcf.extend(remapped.vcf);
    blocks.ampl.extend(remapped.ampl);
    blocks.freq.extend(remapped.freq);
    blocks.wave.extend(remapped.wave);

    dest.update()
}
