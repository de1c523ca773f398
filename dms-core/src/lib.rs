// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

//! Sound-patch data handling for the Wersi DMS synthesizer family
//! (MK1/EX20 and DX10/DX5/EX10R).
//!
//! The crate decodes the binary instrument formats these devices use
//! — EPROM cartridge images and live device RAM — into structured
//! records, encodes edited records back, and speaks the nibble-coded
//! SysEx protocol for reading and writing blocks over MIDI.
//!
//! # Example
//!
//! ```no_run
//! use dms_core::{InstrumentStore, load_cartridge};
//!
//! let data = std::fs::read("cartridge.bin")?;
//! let cartridge = load_cartridge(data)?;
//! for (addr, icb) in cartridge.store().blocks().iter_icbs() {
//!     println!("{addr}: {}", icb.name_str());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod dx10;
pub mod envelope;
pub mod error;
pub mod icb;
pub mod layout;
pub mod mk1;
pub mod store;
pub mod sysex;
pub mod vcf;
pub mod wave;

pub use device::{Dx10Device, MidiTransport};
pub use dx10::Dx10Cartridge;
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{DmsError, Result};
pub use icb::{Icb, WvMode};
pub use mk1::Mk1Cartridge;
pub use store::{BlockMap, InstrumentStore, copy_contents};
pub use sysex::{BlockType, DX10_DEVICE_ID, MK1_DEVICE_ID, Message};
pub use vcf::{EnvelopeMode, NoiseType, Vcf};
pub use wave::Wave;

/// A cartridge image of either supported format.
#[derive(Debug)]
pub enum Cartridge {
    Mk1(Mk1Cartridge),
    Dx10(Dx10Cartridge),
}

impl Cartridge {
    /// Short format name for display.
    pub fn format(&self) -> &'static str {
        match self {
            Cartridge::Mk1(_) => "MK1/EX20",
            Cartridge::Dx10(_) => "DX10/DX5",
        }
    }

    pub fn store(&self) -> &dyn InstrumentStore {
        match self {
            Cartridge::Mk1(cart) => cart,
            Cartridge::Dx10(cart) => cart,
        }
    }

    pub fn store_mut(&mut self) -> &mut dyn InstrumentStore {
        match self {
            Cartridge::Mk1(cart) => cart,
            Cartridge::Dx10(cart) => cart,
        }
    }
}

/// Loads a cartridge image of unknown format.
///
/// The two formats share no discriminating header field, so detection
/// tries each dissector in turn. When both fail, the returned error
/// carries both format errors so the caller can see which assumption
/// broke for each.
pub fn load_cartridge(data: Vec<u8>) -> Result<Cartridge> {
    let mk1_err = match Mk1Cartridge::new(data.clone()) {
        Ok(cart) => return Ok(Cartridge::Mk1(cart)),
        Err(err) => err,
    };
    let dx10_err = match Dx10Cartridge::new(data) {
        Ok(cart) => return Ok(Cartridge::Dx10(cart)),
        Err(err) => err,
    };
    Err(DmsError::DataFormat(format!(
        "unrecognized cartridge format: {mk1_err}; {dx10_err}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mk1_images() {
        let cart = load_cartridge(mk1::tests::sample_image()).unwrap();
        assert_eq!(cart.format(), "MK1/EX20");
        assert_eq!(cart.store().num_icbs(), 20);
        assert_eq!(cart.store().blocks().icb_count(), 20);
    }

    #[test]
    fn detects_dx10_images() {
        let cart = load_cartridge(dx10::tests::sample_image(8192)).unwrap();
        assert_eq!(cart.format(), "DX10/DX5");
        assert_eq!(cart.store().num_icbs(), 10);
        assert_eq!(cart.store().blocks().icb_count(), 20);
    }

    #[test]
    fn detection_failure_reports_both_format_errors() {
        let err = load_cartridge(vec![0u8; 16384]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("invalid MK1 cartridge"));
        assert!(text.contains("invalid DX10/DX5 cartridge"));
    }
}
