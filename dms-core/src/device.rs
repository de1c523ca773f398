// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! DX10/EX10R device store and MIDI block transactions.
//!
//! The device store mirrors the instrument RAM of a live device as a
//! 6180-byte buffer laid out like the cartridge block runs, but with
//! 65/66-based addressing and no checksums. Block reads and writes go
//! over MIDI SysEx through a [`MidiTransport`].

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};

use crate::envelope::{AMPL_SIZE, Envelope, EnvelopeKind, FREQ_SIZE};
use crate::error::{DmsError, Result};
use crate::icb::{ICB_SIZE, Icb};
use crate::layout::{
    DX10_BANK_BLOCKS, DX10_BANK_VCFS, DX10_DEVICE_ICB_BASE, DX10_DEVICE_SATELLITE_BASE,
    DX10_DEVICE_SIZE, block_addr,
};
use crate::store::{BlockMap, InstrumentStore};
use crate::sysex::{self, BlockType, Message};
use crate::vcf::{VCF_SIZE, Vcf};
use crate::wave::{WAVE_FIXED_SIZE, Wave};

/// Retry budget for one block read.
pub const READ_RETRIES: usize = 200;

/// Delay between retries.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

// Pause between blocks when streaming a whole store to the device.
const WRITE_INTERVAL: Duration = Duration::from_millis(20);

/// Blocking MIDI connection used for device transactions.
///
/// `poll_sysex` hands out complete inbound SysEx byte sequences in
/// arrival order, or `None` once the inbound queue is drained.
pub trait MidiTransport {
    fn send(&mut self, message: &[u8]) -> Result<()>;

    fn poll_sysex(&mut self) -> Option<Vec<u8>>;

    fn sleep(&mut self, duration: Duration);
}

/// Progress callback for whole-store transfers, called with the
/// current byte offset and the total transfer size.
pub type Progress<'a> = &'a mut dyn FnMut(usize, usize);

// Fixed buffer layout, shared by dissect, update and the transfer
// loops: (block type, address, offset, length) for all 90 blocks.
fn device_regions() -> Vec<(BlockType, u8, usize, usize)> {
    let mut regions = Vec::with_capacity(90);
    let mut offset = 0;
    for i in 0..DX10_BANK_BLOCKS {
        regions.push((
            BlockType::IcBlock,
            block_addr(DX10_DEVICE_ICB_BASE, i),
            offset,
            ICB_SIZE,
        ));
        offset += ICB_SIZE;
    }
    for i in 0..DX10_BANK_VCFS {
        regions.push((
            BlockType::VcfBlock,
            DX10_DEVICE_SATELLITE_BASE + i as u8,
            offset,
            VCF_SIZE,
        ));
        offset += VCF_SIZE;
    }
    for i in 0..DX10_BANK_BLOCKS {
        regions.push((
            BlockType::AmplBlock,
            block_addr(DX10_DEVICE_SATELLITE_BASE, i),
            offset,
            AMPL_SIZE,
        ));
        offset += AMPL_SIZE;
    }
    for i in 0..DX10_BANK_BLOCKS {
        regions.push((
            BlockType::FreqBlock,
            block_addr(DX10_DEVICE_SATELLITE_BASE, i),
            offset,
            FREQ_SIZE,
        ));
        offset += FREQ_SIZE;
    }
    for i in 0..DX10_BANK_BLOCKS {
        regions.push((
            BlockType::FixWaveBlock,
            block_addr(DX10_DEVICE_SATELLITE_BASE, i),
            offset,
            WAVE_FIXED_SIZE,
        ));
        offset += WAVE_FIXED_SIZE;
    }
    debug_assert_eq!(offset, DX10_DEVICE_SIZE);
    regions
}

// Caller guarantees a DX10_DEVICE_SIZE buffer.
fn dissect_device(data: &[u8]) -> BlockMap {
    debug_assert_eq!(data.len(), DX10_DEVICE_SIZE);

    let mut blocks = BlockMap::default();
    for (block_type, addr, offset, length) in device_regions() {
        let raw = &data[offset..offset + length];
        match block_type {
            BlockType::IcBlock => {
                blocks.icb.insert(addr, Icb::dissect(addr, raw));
            }
            BlockType::VcfBlock => {
                blocks.vcf.insert(addr, Vcf::dissect(addr, raw));
            }
            BlockType::AmplBlock => {
                blocks
                    .ampl
                    .insert(addr, Envelope::dissect(addr, EnvelopeKind::Ampl, raw));
            }
            BlockType::FreqBlock => {
                blocks
                    .freq
                    .insert(addr, Envelope::dissect(addr, EnvelopeKind::Freq, raw));
            }
            BlockType::FixWaveBlock => {
                blocks.wave.insert(addr, Wave::dissect(addr, raw));
            }
            _ => unreachable!(),
        }
    }
    blocks
}

/// Live DX10/EX10R instrument RAM mirror.
pub struct Dx10Device {
    device_id: u8,
    data: Vec<u8>,
    blocks: BlockMap,
    // Replies that arrived while a different block was awaited, keyed
    // by (type, address) and consumed by a later matching read.
    pending: HashMap<(BlockType, u8), Vec<u8>>,
}

impl Dx10Device {
    /// Creates a blank device store: zeroed buffer with each ICB
    /// pre-linked to its own satellite addresses and a space-padded
    /// name, so the store is self-consistent before any device read.
    pub fn new(device_id: u8) -> Self {
        let mut data = vec![0u8; DX10_DEVICE_SIZE];
        for i in 0..DX10_BANK_BLOCKS {
            let raw = &mut data[i * ICB_SIZE..(i + 1) * ICB_SIZE];
            // VCF links run 65..84 unskipped even though only the
            // first ten have a VCF slot behind them.
            raw[1] = DX10_DEVICE_SATELLITE_BASE + i as u8;
            raw[2] = block_addr(DX10_DEVICE_SATELLITE_BASE, i);
            raw[3] = block_addr(DX10_DEVICE_SATELLITE_BASE, i);
            raw[4] = block_addr(DX10_DEVICE_SATELLITE_BASE, i);
            raw[10..16].fill(b' ');
        }

        let blocks = dissect_device(&data);
        Dx10Device {
            device_id,
            data,
            blocks,
            pending: HashMap::new(),
        }
    }

    /// Builds a device store from a previously captured RAM image.
    pub fn from_data(device_id: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() != DX10_DEVICE_SIZE {
            return Err(DmsError::DataFormat(format!(
                "invalid DX10/EX10R buffer: invalid raw data size {}",
                data.len()
            )));
        }
        let blocks = dissect_device(&data);
        Ok(Dx10Device {
            device_id,
            data,
            blocks,
            pending: HashMap::new(),
        })
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    // Requests one block and blocks until the matching reply arrives,
    // resending on an interval. Replies for other blocks are parked
    // for later reads; the target region is only written on success.
    fn read_block(
        &mut self,
        transport: &mut dyn MidiTransport,
        block_type: BlockType,
        address: u8,
        offset: usize,
        length: usize,
    ) -> Result<()> {
        if let Some(parked) = self.pending.remove(&(block_type, address)) {
            if parked.len() == length {
                debug!("using parked reply for ({block_type:?}, {address})");
                self.data[offset..offset + length].copy_from_slice(&parked);
                return Ok(());
            }
            warn!(
                "parked reply for ({block_type:?}, {address}) has length {}, expected {length}",
                parked.len()
            );
        }

        let request = sysex::to_sysex(
            self.device_id,
            &Message {
                block_type: BlockType::RequestBlock,
                address,
                data: vec![block_type as u8],
            },
        );
        debug!("requesting ({block_type:?}, {address}), {length} bytes");
        transport.send(&request)?;

        for _ in 0..READ_RETRIES {
            transport.sleep(RETRY_INTERVAL);
            while let Some(raw) = transport.poll_sysex() {
                match sysex::from_sysex(self.device_id, &raw) {
                    Ok(msg) => {
                        if msg.block_type == block_type
                            && msg.address == address
                            && msg.data.len() == length
                        {
                            self.data[offset..offset + length].copy_from_slice(&msg.data);
                            return Ok(());
                        }
                        debug!(
                            "parking reply ({:?}, {}, {} bytes) while awaiting ({block_type:?}, {address})",
                            msg.block_type,
                            msg.address,
                            msg.data.len()
                        );
                        self.pending.insert((msg.block_type, msg.address), msg.data);
                    }
                    Err(err) => warn!("dropping inbound SysEx: {err}"),
                }
            }
            transport.send(&request)?;
        }

        Err(DmsError::TransportTimeout(
            "did not receive expected data from device".into(),
        ))
    }

    /// Reads the whole instrument RAM from the device, block by
    /// block, then re-dissects the buffer.
    pub fn read_from_device(
        &mut self,
        transport: &mut dyn MidiTransport,
        mut progress: Option<Progress<'_>>,
    ) -> Result<()> {
        for (block_type, addr, offset, length) in device_regions() {
            if let Some(callback) = progress.as_mut() {
                callback(offset, DX10_DEVICE_SIZE);
            }
            self.read_block(transport, block_type, addr, offset, length)?;
        }
        info!("device read complete, {DX10_DEVICE_SIZE} bytes");
        self.dissect()
    }

    /// Streams every record to the device in block-address order.
    /// WAVE records pick the fixed or relative message type from
    /// their encoded size.
    pub fn write_to_device(
        &mut self,
        transport: &mut dyn MidiTransport,
        mut progress: Option<Progress<'_>>,
    ) -> Result<()> {
        let total = self.blocks.icb.len()
            + self.blocks.vcf.len()
            + self.blocks.ampl.len()
            + self.blocks.freq.len()
            + self.blocks.wave.len();
        let mut sent = 0;

        let mut messages = Vec::with_capacity(total);
        for (&addr, icb) in &self.blocks.icb {
            let mut raw = [0u8; ICB_SIZE];
            icb.update(&mut raw);
            messages.push(Message {
                block_type: BlockType::IcBlock,
                address: addr,
                data: raw.to_vec(),
            });
        }
        for (&addr, vcf) in &self.blocks.vcf {
            let mut raw = [0u8; VCF_SIZE];
            vcf.update(&mut raw);
            messages.push(Message {
                block_type: BlockType::VcfBlock,
                address: addr,
                data: raw.to_vec(),
            });
        }
        for (&addr, ampl) in &self.blocks.ampl {
            let mut raw = vec![0u8; AMPL_SIZE];
            ampl.update(&mut raw);
            messages.push(Message {
                block_type: BlockType::AmplBlock,
                address: addr,
                data: raw,
            });
        }
        for (&addr, freq) in &self.blocks.freq {
            let mut raw = vec![0u8; FREQ_SIZE];
            freq.update(&mut raw);
            messages.push(Message {
                block_type: BlockType::FreqBlock,
                address: addr,
                data: raw,
            });
        }
        for (&addr, wave) in &self.blocks.wave {
            let mut raw = vec![0u8; wave.size()];
            wave.update(&mut raw);
            let block_type = if wave.size() == WAVE_FIXED_SIZE {
                BlockType::FixWaveBlock
            } else {
                BlockType::RelWaveBlock
            };
            messages.push(Message {
                block_type,
                address: addr,
                data: raw,
            });
        }

        for message in &messages {
            if let Some(callback) = progress.as_mut() {
                callback(sent, total);
            }
            transport.send(&sysex::to_sysex(self.device_id, message))?;
            transport.sleep(WRITE_INTERVAL);
            sent += 1;
        }
        info!("device write complete, {total} blocks");
        Ok(())
    }
}

impl InstrumentStore for Dx10Device {
    fn dissect(&mut self) -> Result<()> {
        self.blocks = dissect_device(&self.data);
        Ok(())
    }

    /// Writes every record back to its fixed offset. Device images
    /// carry no checksum.
    fn update(&mut self) -> Result<()> {
        for (block_type, addr, offset, length) in device_regions() {
            let raw = &mut self.data[offset..offset + length];
            match block_type {
                BlockType::IcBlock => {
                    if let Some(icb) = self.blocks.icb.get(&addr) {
                        icb.update(raw);
                    }
                }
                BlockType::VcfBlock => {
                    if let Some(vcf) = self.blocks.vcf.get(&addr) {
                        vcf.update(raw);
                    }
                }
                BlockType::AmplBlock => {
                    if let Some(ampl) = self.blocks.ampl.get(&addr) {
                        ampl.update(raw);
                    }
                }
                BlockType::FreqBlock => {
                    if let Some(freq) = self.blocks.freq.get(&addr) {
                        freq.update(raw);
                    }
                }
                BlockType::FixWaveBlock => {
                    if let Some(wave) = self.blocks.wave.get(&addr) {
                        wave.update(raw);
                    }
                }
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    fn num_icbs(&self) -> usize {
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
