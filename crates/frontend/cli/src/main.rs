use anyhow::{Context, Result};
use clap::Parser;
use emu_chip8::display::{HEIGHT, WIDTH};
use emu_chip8::keypad::key_for_char;
use emu_chip8::memory::PROGRAM_ADDR;
use emu_chip8::opcode::disassemble;
use emu_chip8::{Chip8Config, Chip8System, UnknownOpcodePolicy};
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::types::{Frame, PIXEL_ON};
use emu_core::System;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    /// Path to a CHIP-8 program (.ch8); runs an empty program if omitted
    rom: Option<PathBuf>,

    /// Number of 60 Hz frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Instructions executed per frame
    #[arg(long, default_value_t = 11)]
    cycles_per_frame: u32,

    /// Seed for the random-number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Fail on unknown opcodes instead of skipping them
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Host keys held down for the whole run, e.g. "qw" (1234/qwer/asdf/zxcv layout)
    #[arg(long, default_value = "")]
    keys: String,

    /// Dump save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: String,

    /// Print debug_state after every frame
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress all per-frame output and the final screen (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Print a disassembly of the program before running
    #[arg(long, default_value_t = false)]
    disasm: bool,

    /// Global core log level: off, error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: LogLevel,

    /// Log level for the CPU category (instruction trace at "trace")
    #[arg(long)]
    log_cpu: Option<LogLevel>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn configure_logging(args: &Args) -> Result<()> {
    let log_config = LogConfig::global();
    log_config.set_global_level(args.log_level);
    if let Some(level) = args.log_cpu {
        log_config.set_level(LogCategory::CPU, level);
    }
    if let Some(path) = &args.log_file {
        log_config
            .set_log_file(path.clone())
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }
    Ok(())
}

fn render(frame: &Frame) -> String {
    let mut out = String::with_capacity((WIDTH + 1) * HEIGHT);
    for y in 0..frame.height {
        for x in 0..frame.width {
            out.push(if frame.get(x, y) == Some(PIXEL_ON) {
                '#'
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let config = Chip8Config {
        cycles_per_frame: args.cycles_per_frame,
        unknown_opcode_policy: if args.strict {
            UnknownOpcodePolicy::Strict
        } else {
            UnknownOpcodePolicy::Ignore
        },
        rng_seed: args.seed,
    };
    let mut sys = Chip8System::with_config(config);

    match args.rom.as_ref() {
        Some(rom) => {
            // The core falls back to an empty program; report and keep going.
            if let Err(e) = sys.load_rom_from_path(rom) {
                log::error!("failed to load {}: {}", rom.display(), e);
            }
        }
        None => sys.mount("Program", &[])?,
    }

    if args.disasm {
        for (addr, word, op) in disassemble(sys.rom().unwrap_or(&[]), PROGRAM_ADDR) {
            match op {
                Some(op) => println!("{:04X}  {:04X}  {}", addr, word, op),
                None => println!("{:04X}  {:04X}  ???", addr, word),
            }
        }
    }

    for c in args.keys.chars() {
        let key = key_for_char(c)
            .with_context(|| format!("no keypad binding for {:?}", c))?;
        sys.set_key(key, true)?;
    }

    for fnum in 1..=args.frames {
        if let Err(e) = sys.step_frame() {
            log::error!("frame {}: {}", fnum, e);
            break;
        }
        if !args.quiet && args.debug {
            println!(
                "DEBUG STATE (frame {}):\n{}",
                fnum,
                serde_json::to_string_pretty(&sys.debug_state())?
            );
        }
    }

    if !args.quiet {
        print!("{}", render(&sys.frame()));
        if sys.cpu().sound_active() {
            println!("(sound on)");
        }
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)
        .with_context(|| format!("cannot create save file {}", args.save))?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    LogConfig::global().clear_log_file();

    Ok(())
}
