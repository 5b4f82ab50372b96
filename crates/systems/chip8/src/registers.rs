//! Register file, call stack and timers

use crate::memory::PROGRAM_ADDR;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REGISTER_COUNT: usize = 16;
pub const STACK_DEPTH: usize = 16;

/// Index of the flag register.
pub const VF: u8 = 0xF;

/// Highest legal stack pointer value.
const SP_MAX: u8 = (STACK_DEPTH - 1) as u8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack overflow calling from {pc:#06X}")]
    Overflow { pc: u16 },
    #[error("stack underflow returning from {pc:#06X}")]
    Underflow { pc: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stack pointer {0} outside 0-15")]
pub struct StackPointerError(pub u8);

/// V0-VF, I, PC, SP, the return stack and both timers.
///
/// The stack pointer addresses the most recently pushed slot: `call`
/// increments it before storing, `ret` loads before decrementing. Slot 0 is
/// therefore never written, which leaves room for 15 nested calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegisters")]
pub struct Registers {
    v: [u8; REGISTER_COUNT],
    pub i: u16,
    pub pc: u16,
    sp: u8,
    stack: [u16; STACK_DEPTH],
    pub delay_timer: u8,
    pub sound_timer: u8,
}

/// Unchecked snapshot form of [`Registers`].
#[derive(Deserialize)]
struct RawRegisters {
    v: [u8; REGISTER_COUNT],
    i: u16,
    pc: u16,
    sp: u8,
    stack: [u16; STACK_DEPTH],
    delay_timer: u8,
    sound_timer: u8,
}

impl TryFrom<RawRegisters> for Registers {
    type Error = StackPointerError;

    fn try_from(raw: RawRegisters) -> Result<Self, Self::Error> {
        if raw.sp > SP_MAX {
            return Err(StackPointerError(raw.sp));
        }
        Ok(Self {
            v: raw.v,
            i: raw.i,
            pc: raw.pc,
            sp: raw.sp,
            stack: raw.stack,
            delay_timer: raw.delay_timer,
            sound_timer: raw.sound_timer,
        })
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    pub fn new() -> Self {
        Self {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: PROGRAM_ADDR,
            sp: 0,
            stack: [0; STACK_DEPTH],
            delay_timer: 0,
            sound_timer: 0,
        }
    }

    /// Value of `Vx`. Only the low nibble of `x` is used.
    #[inline]
    pub fn v(&self, x: u8) -> u8 {
        self.v[(x & 0xF) as usize]
    }

    #[inline]
    pub fn set_v(&mut self, x: u8, val: u8) {
        self.v[(x & 0xF) as usize] = val;
    }

    pub fn v_all(&self) -> &[u8; REGISTER_COUNT] {
        &self.v
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn stack_slot(&self, idx: usize) -> Option<u16> {
        self.stack.get(idx).copied()
    }

    #[inline]
    pub fn advance_pc(&mut self, n: u16) {
        self.pc = self.pc.wrapping_add(n);
    }

    /// Push the current PC and jump to `target`.
    pub fn call(&mut self, target: u16) -> Result<(), StackError> {
        if self.sp >= SP_MAX {
            return Err(StackError::Overflow { pc: self.pc });
        }
        self.sp += 1;
        self.stack[self.sp as usize] = self.pc;
        self.pc = target;
        Ok(())
    }

    /// Pop the return address into PC.
    pub fn ret(&mut self) -> Result<(), StackError> {
        if self.sp == 0 {
            return Err(StackError::Underflow { pc: self.pc });
        }
        let addr = self
            .stack
            .get(self.sp as usize)
            .copied()
            .ok_or(StackError::Overflow { pc: self.pc })?;
        self.pc = addr;
        self.sp -= 1;
        Ok(())
    }

    /// One 60 Hz timer tick; both timers stop at zero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let r = Registers::new();
        assert_eq!(r.pc, 0x200);
        assert_eq!(r.sp(), 0);
        assert_eq!(r.i, 0);
        assert!(r.v_all().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_register_index_uses_low_nibble() {
        let mut r = Registers::new();
        r.set_v(0x1F, 9);
        assert_eq!(r.v(0xF), 9);
    }

    #[test]
    fn test_call_return_roundtrip() {
        for pc in [0x000, 0x202, 0x3FE, 0xFFE] {
            let mut r = Registers::new();
            r.pc = pc;
            r.call(0x400).unwrap();
            assert_eq!(r.pc, 0x400);
            assert_eq!(r.sp(), 1);
            assert_eq!(r.stack_slot(1), Some(pc));
            r.ret().unwrap();
            assert_eq!(r.pc, pc);
            assert_eq!(r.sp(), 0);
        }
    }

    #[test]
    fn test_nested_calls_unwind_in_order() {
        let mut r = Registers::new();
        r.pc = 0x202;
        r.call(0x300).unwrap();
        r.pc = 0x302;
        r.call(0x400).unwrap();
        assert_eq!(r.stack_slot(1), Some(0x202));
        assert_eq!(r.stack_slot(2), Some(0x302));

        r.ret().unwrap();
        assert_eq!(r.pc, 0x302);
        r.ret().unwrap();
        assert_eq!(r.pc, 0x202);
    }

    #[test]
    fn test_stack_overflow_after_fifteen_calls() {
        let mut r = Registers::new();
        for depth in 1..=15u16 {
            r.call(0x200 + depth * 2).unwrap();
        }
        assert_eq!(r.sp(), 15);

        let before = r.clone();
        assert_eq!(r.call(0x500), Err(StackError::Overflow { pc: before.pc }));
        assert_eq!(r, before);
    }

    #[test]
    fn test_stack_underflow() {
        let mut r = Registers::new();
        let before = r.clone();
        assert_eq!(r.ret(), Err(StackError::Underflow { pc: 0x200 }));
        assert_eq!(r, before);
    }

    #[test]
    fn test_return_with_pointer_past_top_errors() {
        let mut r = Registers::new();
        r.sp = 200;
        let before = r.clone();
        assert_eq!(r.ret(), Err(StackError::Overflow { pc: 0x200 }));
        assert_eq!(r, before);
    }

    #[test]
    fn test_snapshot_rejects_stack_pointer_past_top() {
        let mut r = Registers::new();
        r.call(0x300).unwrap();
        let mut json = serde_json::to_value(&r).unwrap();
        assert_eq!(serde_json::from_value::<Registers>(json.clone()).unwrap(), r);

        json["sp"] = serde_json::Value::from(15);
        assert_eq!(serde_json::from_value::<Registers>(json.clone()).unwrap().sp(), 15);

        json["sp"] = serde_json::Value::from(16);
        assert!(serde_json::from_value::<Registers>(json.clone()).is_err());
        json["sp"] = serde_json::Value::from(200);
        let err = serde_json::from_value::<Registers>(json).unwrap_err();
        assert!(err.to_string().contains("stack pointer 200"));
    }

    #[test]
    fn test_timers_saturate_at_zero() {
        let mut r = Registers::new();
        r.delay_timer = 2;
        r.sound_timer = 1;
        r.tick_timers();
        assert_eq!((r.delay_timer, r.sound_timer), (1, 0));
        r.tick_timers();
        r.tick_timers();
        assert_eq!((r.delay_timer, r.sound_timer), (0, 0));
    }

    #[test]
    fn test_advance_pc_wraps_u16() {
        let mut r = Registers::new();
        r.pc = 0xFFFE;
        r.advance_pc(4);
        assert_eq!(r.pc, 2);
    }
}
