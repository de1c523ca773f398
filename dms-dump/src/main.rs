/// dms-dump
///
/// Diagnostic dump tool for Wersi DMS cartridge images.
///
/// It works by:
/// - Loading the provided file (MK1/EX20 or DX10/DX5 image)
/// - Trying the MK1 dissector first, then the DX10 one
/// - Printing one columnar line per instrument control block, plus
///   the linked VCF parameters when the link resolves
///
/// The output is stable across runs for the same input, so it doubles
/// as a golden-output fixture for regression tests of the decoders.

// Copyright (C) 2026 DMS Toolkit contributors
//
// MIT License

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use dms_core::{Cartridge, InstrumentStore, load_cartridge};

// Refuse anything clearly not a cartridge image.
const MAX_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(name = "dms-dump")]
#[command(about = "Dumps the instrument contents of Wersi DMS cartridge images")]
#[command(version)]
struct Cli {
    /// Cartridge image filename (MK1/EX20 or DX10/DX5)
    filename: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return;
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    if let Ok(metadata) = std::fs::metadata(&cli.filename) {
        if metadata.len() > MAX_FILE_SIZE {
            eprintln!("Input file too large");
            std::process::exit(3);
        }
    }
    let data = match std::fs::read(&cli.filename) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Cannot open input file: {err}");
            std::process::exit(2);
        }
    };

    match dump_cartridge(data) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("Error loading cartridge image");
            eprintln!("Did you supply an MK1/EX20 or DX10/DX5 image?");
            eprintln!("Detailed error: {err:#}");
        }
    }
}

fn dump_cartridge(data: Vec<u8>) -> Result<()> {
    let cartridge = load_cartridge(data).context("cartridge format detection failed")?;
    print_cartridge(&cartridge);
    Ok(())
}

fn print_cartridge(cartridge: &Cartridge) {
    println!("Wersi DMS Cartridge Contents");
    println!("============================");
    println!();
    println!("Format: {}", cartridge.format());
    println!();
    println!(
        "{:<5} {:<8} {:>4} {:>4} {:>4} {:>4} {:>4} {:>6} {:>7}  {}",
        "Addr", "Name", "Next", "VCF", "AMPL", "FREQ", "WAVE", "Trans", "Detune", "WV mode"
    );

    let blocks = cartridge.store().blocks();
    for (addr, icb) in blocks.iter_icbs() {
        println!(
            "{:<5} {:<8} {:>4} {:>4} {:>4} {:>4} {:>4} {:>6} {:>7}  {}",
            addr,
            icb.name_str(),
            icb.next_icb,
            icb.vcf_block,
            icb.ampl_block,
            icb.freq_block,
            icb.wave_block,
            icb.transpose,
            icb.detune,
            icb.wv_mode
        );
        if let Some(vcf) = blocks.vcf(icb.vcf_block) {
            let filter = if vcf.low_pass { "low pass" } else { "band pass" };
            let poles = if vcf.four_poles { 4 } else { 2 };
            println!(
                "      VCF {}: {} {}-pole, freq {}, Q {}, {}{}",
                vcf.block(),
                filter,
                poles,
                vcf.frequency,
                vcf.quality,
                vcf.env_mode,
                if vcf.tracking { ", tracking" } else { "" }
            );
        }
    }
}
