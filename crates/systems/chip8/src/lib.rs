//! CHIP-8 interpreter
//!
//! # Architecture
//!
//! - **RAM**: 4 KiB, font glyphs at 0x050, programs load at 0x200
//! - **Registers**: V0-VF, 12-bit I, 16-entry return stack
//! - **Timers**: delay and sound, decremented at 60 Hz
//! - **Display**: 64x32 monochrome, XOR sprites with wraparound
//! - **Input**: 16-key hex keypad
//!
//! [`Chip8System`] drives the interpreter one 60 Hz frame at a time through
//! [`emu_core::System`]. [`cpu::Chip8Cpu`] can also be stepped directly.

pub mod config;
pub mod cpu;
pub mod display;
pub mod keypad;
pub mod memory;
pub mod opcode;
pub mod registers;

pub use config::{Chip8Config, UnknownOpcodePolicy};
pub use cpu::Chip8Cpu;
pub use opcode::Opcode;

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::{types::Frame, MountPointInfo, System};
use keypad::KeypadError;
use memory::{MemoryError, PROGRAM_CAPACITY};
use registers::StackError;
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

const PROGRAM_SLOT: &str = "Program";
const STATE_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),
    #[error("Keypad error: {0}")]
    Keypad(#[from] KeypadError),
    #[error("Unknown opcode {opcode:#06X} at {pc:#06X}")]
    UnknownOpcode { opcode: u16, pc: u16 },
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// CHIP-8 system
#[derive(Debug, Clone)]
pub struct Chip8System {
    cpu: Chip8Cpu,
    config: Chip8Config,
    /// Program as mounted, reloaded on reset.
    rom: Option<Vec<u8>>,
    frames: u64,
    last_fault: Option<String>,
}

impl Default for Chip8System {
    fn default() -> Self {
        Self::new()
    }
}

impl Chip8System {
    pub fn new() -> Self {
        Self::with_config(Chip8Config::default())
    }

    pub fn with_config(config: Chip8Config) -> Self {
        Self {
            cpu: Chip8Cpu::new(config.unknown_opcode_policy, config.rng_seed),
            config,
            rom: None,
            frames: 0,
            last_fault: None,
        }
    }

    pub fn config(&self) -> &Chip8Config {
        &self.config
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Chip8Cpu {
        &mut self.cpu
    }

    /// Program bytes as mounted.
    pub fn rom(&self) -> Option<&[u8]> {
        self.rom.as_deref()
    }

    /// Frames completed since the last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Message of the most recent cycle fault, cleared on reset.
    pub fn last_fault(&self) -> Option<&str> {
        self.last_fault.as_deref()
    }

    /// Current screen contents.
    pub fn frame(&self) -> Frame {
        self.cpu.display.to_frame()
    }

    /// Read a ROM file and mount it.
    ///
    /// If the file cannot be read an empty program is mounted instead and the
    /// I/O error is returned for the caller to report.
    pub fn load_rom_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), Chip8Error> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(data) => self.mount(PROGRAM_SLOT, &data),
            Err(e) => {
                log(LogCategory::Memory, LogLevel::Error, || {
                    format!("Memory: cannot read {}: {}", path.display(), e)
                });
                self.mount(PROGRAM_SLOT, &[])?;
                Err(e.into())
            }
        }
    }

    pub fn set_key(&mut self, key: u8, pressed: bool) -> Result<(), Chip8Error> {
        self.cpu.keypad.set_pressed(key, pressed)?;
        log(LogCategory::Input, LogLevel::Trace, || {
            format!(
                "Input: key {:X} {}",
                key,
                if pressed { "down" } else { "up" }
            )
        });
        Ok(())
    }

    /// Advance both timers by one 60 Hz tick.
    pub fn tick_timers(&mut self) {
        let beeping = self.cpu.sound_active();
        self.cpu.tick_timers();
        if beeping && !self.cpu.sound_active() {
            log(LogCategory::Timers, LogLevel::Debug, || {
                "Timers: sound timer expired".to_string()
            });
        }
    }

    pub fn debug_state(&self) -> Value {
        let regs = &self.cpu.regs;
        let opcode = match self.cpu.peek_opcode() {
            Ok(Some(op)) => Value::String(op.to_string()),
            Ok(None) => Value::String("????".to_string()),
            Err(_) => Value::Null,
        };
        serde_json::json!({
            "pc": regs.pc,
            "i": regs.i,
            "sp": regs.sp(),
            "v": regs.v_all(),
            "delay_timer": regs.delay_timer,
            "sound_timer": regs.sound_timer,
            "opcode": opcode,
            "lit_pixels": self.cpu.display.lit_count(),
            "cycles": self.cpu.cycles,
            "frames": self.frames,
        })
    }

    fn check_slot(mount_point_id: &str) -> Result<(), Chip8Error> {
        if mount_point_id != PROGRAM_SLOT {
            return Err(Chip8Error::InvalidMountPoint(mount_point_id.to_string()));
        }
        Ok(())
    }
}

impl System for Chip8System {
    type Error = Chip8Error;

    fn reset(&mut self) {
        self.cpu.reset();
        let rom = self.rom.as_deref().unwrap_or(&[]);
        if let Err(e) = self.cpu.memory.load(rom) {
            // `mount` and `load_state` both reject programs that do not fit.
            log(LogCategory::Memory, LogLevel::Error, || {
                format!("Memory: reload failed: {}", e)
            });
        }
        self.frames = 0;
        self.last_fault = None;
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        let mut outcome = Ok(());
        for _ in 0..self.config.cycles_per_frame {
            if let Err(e) = self.cpu.step() {
                log(LogCategory::CPU, LogLevel::Error, || {
                    format!("CPU: fault at {:04X}: {}", self.cpu.regs.pc, e)
                });
                self.last_fault = Some(e.to_string());
                outcome = Err(e);
                break;
            }
        }

        self.tick_timers();
        self.frames += 1;
        outcome.map(|()| self.frame())
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": STATE_VERSION,
            "system": "chip8",
            "frames": self.frames,
            "rom": &self.rom,
            "cpu": self.cpu.save_state(),
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != STATE_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported save state version {}",
                version
            )));
        }
        let system = v["system"].as_str().unwrap_or("");
        if system != "chip8" {
            return Err(serde_json::Error::custom(format!(
                "save state is for system {:?}",
                system
            )));
        }

        let rom = Option::<Vec<u8>>::deserialize(&v["rom"])?;
        if let Some(len) = rom.as_ref().map(Vec::len).filter(|&n| n > PROGRAM_CAPACITY) {
            return Err(serde_json::Error::custom(format!(
                "saved program is {} bytes, program region holds {}",
                len, PROGRAM_CAPACITY
            )));
        }
        let frames = v["frames"].as_u64().unwrap_or(0);
        self.cpu.load_state(&v["cpu"])?;
        self.rom = rom;
        self.frames = frames;
        self.last_fault = None;
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: PROGRAM_SLOT.to_string(),
            name: "Program".to_string(),
            extensions: vec!["ch8".to_string(), "c8".to_string(), "rom".to_string()],
            required: false,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        Self::check_slot(mount_point_id)?;
        self.cpu.memory.load(data)?;
        log(LogCategory::Memory, LogLevel::Info, || {
            format!("Memory: loaded {}-byte program at 0x200", data.len())
        });
        self.rom = Some(data.to_vec());
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        Self::check_slot(mount_point_id)?;
        self.rom = None;
        self.reset();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == PROGRAM_SLOT && self.rom.is_some()
    }
}
