use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

mod keymap;
mod run;

/// A Chip-8 interpreter
///
/// Keys 1234/QWER/ASDF/ZXCV map onto the hexadecimal keypad and Escape quits.
/// Set RUST_LOG=trace to log every executed opcode.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Size multiplier for each pixel
    #[arg(short, long, default_value_t = 10)]
    scale: u32,

    /// Minimum milliseconds between two cycles
    #[arg(short, long, default_value_t = 3)]
    delay: u64,

    /// The ROM file to run
    rom: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    run::run(&args.rom, args.scale, Duration::from_millis(args.delay))
}
