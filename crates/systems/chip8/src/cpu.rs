//! CHIP-8 fetch/decode/execute core
//!
//! `Chip8Cpu` owns the whole machine state: memory, registers, framebuffer
//! and keypad. One call to [`Chip8Cpu::step`] runs exactly one instruction.
//!
//! # Cycle
//!
//! 1. Fetch the word at PC (bounds-checked).
//! 2. Advance PC by 2.
//! 3. Decode into an [`Opcode`] and execute it. Skips add another 2,
//!    `Fx0A` without a key held subtracts 2 so the same word is fetched again.
//!
//! A cycle is all-or-nothing. Handlers check memory spans and stack bounds
//! before their first write, and a failed cycle puts PC back on the faulting
//! instruction.
//!
//! # Flags
//!
//! Arithmetic results are computed from the values Vx and Vy held before the
//! instruction. VF is written first and Vx second, so with x = F the result
//! overwrites the flag.
//!
//! Timers are not touched here; the frame driver calls
//! [`Chip8Cpu::tick_timers`] at 60 Hz.

use crate::display::Framebuffer;
use crate::keypad::Keypad;
use crate::memory::{Memory, FONT_ADDR, FONT_GLYPH_SIZE};
use crate::opcode::Opcode;
use crate::registers::{Registers, VF};
use crate::{Chip8Error, UnknownOpcodePolicy};
use emu_core::logging::{log, LogCategory, LogLevel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Chip8Cpu {
    pub regs: Registers,
    pub memory: Memory,
    pub display: Framebuffer,
    pub keypad: Keypad,
    /// Instructions retired since the last reset
    pub cycles: u64,
    policy: UnknownOpcodePolicy,
    rng: StdRng,
}

/// Serialized form of everything except the RNG and policy.
#[derive(Deserialize)]
struct CpuSnapshot {
    regs: Registers,
    memory: Memory,
    display: Framebuffer,
    keypad: Keypad,
    cycles: u64,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self::new(UnknownOpcodePolicy::default(), None)
    }
}

impl Chip8Cpu {
    pub fn new(policy: UnknownOpcodePolicy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            regs: Registers::new(),
            memory: Memory::new(),
            display: Framebuffer::new(),
            keypad: Keypad::new(),
            cycles: 0,
            policy,
            rng,
        }
    }

    pub fn policy(&self) -> UnknownOpcodePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: UnknownOpcodePolicy) {
        self.policy = policy;
    }

    /// Reseed the `Cxkk` generator.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Power-on registers, blank screen, no keys. Memory is preserved.
    pub fn reset(&mut self) {
        self.regs = Registers::new();
        self.display.clear();
        self.keypad.release_all();
        self.cycles = 0;
    }

    pub fn tick_timers(&mut self) {
        self.regs.tick_timers();
    }

    /// True while the sound timer is running; the host should beep.
    pub fn sound_active(&self) -> bool {
        self.regs.sound_timer > 0
    }

    /// Decode the instruction at PC without executing it.
    pub fn peek_opcode(&self) -> Result<Option<Opcode>, Chip8Error> {
        let word = self.memory.read_word(self.regs.pc)?;
        Ok(Opcode::decode(word))
    }

    /// Run one fetch/decode/execute cycle.
    ///
    /// Returns the executed opcode, or `None` for an ignored unknown word.
    pub fn step(&mut self) -> Result<Option<Opcode>, Chip8Error> {
        let pc = self.regs.pc;
        let word = self.memory.read_word(pc)?;
        self.regs.advance_pc(2);

        let result = match Opcode::decode(word) {
            Some(op) => {
                log(LogCategory::CPU, LogLevel::Trace, || {
                    format!("CPU: {:04X}  {:04X}  {}", pc, word, op)
                });
                self.execute(op).map(|()| Some(op))
            }
            None => self.unknown(word, pc).map(|()| None),
        };

        match result {
            Ok(_) => self.cycles += 1,
            Err(_) => self.regs.pc = pc,
        }
        result
    }

    fn unknown(&mut self, word: u16, pc: u16) -> Result<(), Chip8Error> {
        match self.policy {
            UnknownOpcodePolicy::Ignore => {
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!("CPU: ignoring unknown opcode {:04X} at {:04X}", word, pc)
                });
                Ok(())
            }
            UnknownOpcodePolicy::Strict => Err(Chip8Error::UnknownOpcode { opcode: word, pc }),
        }
    }

    /// Execute a decoded instruction. PC already points past it.
    pub fn execute(&mut self, op: Opcode) -> Result<(), Chip8Error> {
        match op {
            Opcode::Cls => {
                self.display.clear();
                log(LogCategory::Display, LogLevel::Debug, || {
                    "Display: clear".to_string()
                });
            }
            Opcode::Ret => self.regs.ret()?,
            Opcode::Jp(nnn) => self.regs.pc = nnn,
            Opcode::Call(nnn) => self.regs.call(nnn)?,
            Opcode::SeImm { x, kk } => self.skip_if(self.regs.v(x) == kk),
            Opcode::SneImm { x, kk } => self.skip_if(self.regs.v(x) != kk),
            Opcode::SeReg { x, y } => self.skip_if(self.regs.v(x) == self.regs.v(y)),
            Opcode::LdImm { x, kk } => self.regs.set_v(x, kk),
            Opcode::AddImm { x, kk } => self.regs.set_v(x, self.regs.v(x).wrapping_add(kk)),
            Opcode::LdReg { x, y } => self.regs.set_v(x, self.regs.v(y)),
            Opcode::Or { x, y } => self.regs.set_v(x, self.regs.v(x) | self.regs.v(y)),
            Opcode::And { x, y } => self.regs.set_v(x, self.regs.v(x) & self.regs.v(y)),
            Opcode::Xor { x, y } => self.regs.set_v(x, self.regs.v(x) ^ self.regs.v(y)),
            Opcode::AddReg { x, y } => {
                let (sum, carry) = self.regs.v(x).overflowing_add(self.regs.v(y));
                self.set_flag_then(x, carry, sum);
            }
            Opcode::Sub { x, y } => {
                let (vx, vy) = (self.regs.v(x), self.regs.v(y));
                self.set_flag_then(x, vx > vy, vx.wrapping_sub(vy));
            }
            Opcode::Shr { x } => {
                let vx = self.regs.v(x);
                self.set_flag_then(x, vx & 0x01 != 0, vx >> 1);
            }
            Opcode::Subn { x, y } => {
                let (vx, vy) = (self.regs.v(x), self.regs.v(y));
                self.set_flag_then(x, vy > vx, vy.wrapping_sub(vx));
            }
            Opcode::Shl { x } => {
                let vx = self.regs.v(x);
                self.set_flag_then(x, vx & 0x80 != 0, vx << 1);
            }
            Opcode::SneReg { x, y } => self.skip_if(self.regs.v(x) != self.regs.v(y)),
            Opcode::LdI(nnn) => self.regs.i = nnn,
            Opcode::JpV0(nnn) => self.regs.pc = nnn + self.regs.v(0) as u16,
            Opcode::Rnd { x, kk } => {
                let byte: u8 = self.rng.gen();
                self.regs.set_v(x, byte & kk);
            }
            Opcode::Drw { x, y, n } => self.draw(x, y, n)?,
            Opcode::Skp { x } => self.skip_if(self.keypad.is_pressed(self.regs.v(x))),
            Opcode::Sknp { x } => self.skip_if(!self.keypad.is_pressed(self.regs.v(x))),
            Opcode::LdVxDt { x } => self.regs.set_v(x, self.regs.delay_timer),
            Opcode::WaitKey { x } => self.wait_key(x),
            Opcode::LdDtVx { x } => self.regs.delay_timer = self.regs.v(x),
            Opcode::LdStVx { x } => self.regs.sound_timer = self.regs.v(x),
            Opcode::AddI { x } => self.regs.i = self.regs.i.wrapping_add(self.regs.v(x) as u16),
            Opcode::LdFont { x } => {
                self.regs.i = FONT_ADDR + FONT_GLYPH_SIZE * self.regs.v(x) as u16;
            }
            Opcode::Bcd { x } => {
                let v = self.regs.v(x);
                self.memory
                    .write_range(self.regs.i, &[v / 100, v / 10 % 10, v % 10])?;
            }
            Opcode::StoreRegs { x } => {
                let count = x as usize + 1;
                self.memory
                    .write_range(self.regs.i, &self.regs.v_all()[..count])?;
            }
            Opcode::LoadRegs { x } => {
                let bytes = self.memory.read_range(self.regs.i, x as usize + 1)?;
                for (idx, &b) in bytes.iter().enumerate() {
                    self.regs.set_v(idx as u8, b);
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.regs.advance_pc(2);
        }
    }

    #[inline]
    fn set_flag_then(&mut self, x: u8, flag: bool, result: u8) {
        self.regs.set_v(VF, flag as u8);
        self.regs.set_v(x, result);
    }

    fn draw(&mut self, x: u8, y: u8, n: u8) -> Result<(), Chip8Error> {
        let (vx, vy) = (self.regs.v(x), self.regs.v(y));
        let sprite = self.memory.read_range(self.regs.i, n as usize)?;
        let collision = self.display.draw(vx, vy, sprite);
        self.regs.set_v(VF, collision as u8);
        log(LogCategory::Display, LogLevel::Debug, || {
            format!(
                "Display: {}-row sprite at ({}, {}) from {:04X}, collision={}",
                n, vx, vy, self.regs.i, collision
            )
        });
        Ok(())
    }

    fn wait_key(&mut self, x: u8) {
        match self.keypad.lowest_pressed() {
            Some(key) => {
                self.regs.set_v(x, key);
                log(LogCategory::Input, LogLevel::Debug, || {
                    format!("Input: key {:X} satisfied wait into V{:X}", key, x)
                });
            }
            // Fetch the same instruction again next cycle.
            None => self.regs.pc = self.regs.pc.wrapping_sub(2),
        }
    }

    pub fn save_state(&self) -> Value {
        serde_json::json!({
            "regs": &self.regs,
            "memory": &self.memory,
            "display": &self.display,
            "keypad": &self.keypad,
            "cycles": self.cycles,
        })
    }

    /// Restore machine state; the RNG and opcode policy are kept.
    pub fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let snap = CpuSnapshot::deserialize(v)?;
        self.regs = snap.regs;
        self.memory = snap.memory;
        self.display = snap.display;
        self.keypad = snap.keypad;
        self.cycles = snap.cycles;
        Ok(())
    }
}

impl emu_core::Cpu for Chip8Cpu {
    type Fault = Chip8Error;

    fn reset(&mut self) {
        Chip8Cpu::reset(self);
    }

    fn step(&mut self) -> Result<u32, Chip8Error> {
        Chip8Cpu::step(self).map(|_| 1)
    }
}
