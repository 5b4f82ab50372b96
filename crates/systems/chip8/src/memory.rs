//! CHIP-8 address space
//!
//! 4 KiB of byte-addressable RAM:
//! - `0x000-0x04F`: unused (historically the interpreter itself)
//! - `0x050-0x09F`: built-in hexadecimal font, 16 glyphs of 5 bytes
//! - `0x200-0xFFF`: program image
//!
//! Every access is bounds-checked; nothing wraps or aliases.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MEMORY_SIZE: usize = 0x1000;
pub const FONT_ADDR: u16 = 0x050;
pub const FONT_GLYPH_SIZE: u16 = 5;
pub const PROGRAM_ADDR: u16 = 0x200;

/// Largest ROM that fits between `PROGRAM_ADDR` and the end of memory.
pub const PROGRAM_CAPACITY: usize = MEMORY_SIZE - PROGRAM_ADDR as usize;

#[rustfmt::skip]
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory access out of bounds at {addr:#06X}")]
    OutOfBounds { addr: usize },
    #[error("ROM is {size} bytes, program region holds {capacity}")]
    RomTooLarge { size: usize, capacity: usize },
    #[error("memory image must be {expected} bytes, got {actual}")]
    BadImageSize { expected: usize, actual: usize },
}

/// Fixed 4 KiB RAM with the font preloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Zeroed RAM with the font glyphs in place.
    pub fn new() -> Self {
        let mut bytes = vec![0u8; MEMORY_SIZE].into_boxed_slice();
        let font = FONT_ADDR as usize;
        bytes[font..font + FONT.len()].copy_from_slice(&FONT);
        Self { bytes }
    }

    /// Copy `rom` to `PROGRAM_ADDR`, clearing whatever program was there before.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), MemoryError> {
        if rom.len() > PROGRAM_CAPACITY {
            return Err(MemoryError::RomTooLarge {
                size: rom.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        let start = PROGRAM_ADDR as usize;
        self.bytes[start..].fill(0);
        self.bytes[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    pub fn read_byte(&self, addr: u16) -> Result<u8, MemoryError> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(MemoryError::OutOfBounds {
                addr: addr as usize,
            })
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) -> Result<(), MemoryError> {
        let slot = self
            .bytes
            .get_mut(addr as usize)
            .ok_or(MemoryError::OutOfBounds {
                addr: addr as usize,
            })?;
        *slot = val;
        Ok(())
    }

    /// Big-endian instruction word at `addr`, `addr + 1`.
    pub fn read_word(&self, addr: u16) -> Result<u16, MemoryError> {
        let hi = self.read_byte(addr)?;
        let lo = self.read_byte(addr.checked_add(1).ok_or(MemoryError::OutOfBounds {
            addr: addr as usize + 1,
        })?)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Borrow `len` bytes starting at `addr`. The whole span must be in range.
    pub fn read_range(&self, addr: u16, len: usize) -> Result<&[u8], MemoryError> {
        let span = Self::span(addr, len)?;
        Ok(&self.bytes[span])
    }

    /// Write `data` starting at `addr`. Nothing is written unless the whole
    /// span is in range.
    pub fn write_range(&mut self, addr: u16, data: &[u8]) -> Result<(), MemoryError> {
        let span = Self::span(addr, data.len())?;
        self.bytes[span].copy_from_slice(data);
        Ok(())
    }

    /// Program region (`0x200..`) as loaded.
    pub fn program(&self) -> &[u8] {
        &self.bytes[PROGRAM_ADDR as usize..]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn span(addr: u16, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let start = addr as usize;
        let end = start + len;
        if end > MEMORY_SIZE {
            // Report the first address that falls outside memory.
            return Err(MemoryError::OutOfBounds {
                addr: start.max(MEMORY_SIZE),
            });
        }
        Ok(start..end)
    }
}

impl TryFrom<Vec<u8>> for Memory {
    type Error = MemoryError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        if bytes.len() != MEMORY_SIZE {
            return Err(MemoryError::BadImageSize {
                expected: MEMORY_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }
}

impl From<Memory> for Vec<u8> {
    fn from(mem: Memory) -> Self {
        mem.bytes.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_preloaded() {
        let m = Memory::new();
        assert_eq!(m.read_range(FONT_ADDR, FONT.len()).unwrap(), &FONT);
        assert_eq!(m.read_byte(0x04F).unwrap(), 0);
        assert_eq!(m.read_byte(0x0A0).unwrap(), 0);
    }

    #[test]
    fn test_program_region_zeroed() {
        let m = Memory::new();
        assert!(m.program().iter().all(|&b| b == 0));
        assert_eq!(m.program().len(), PROGRAM_CAPACITY);
    }

    #[test]
    fn test_load_places_rom_at_0x200() {
        let mut m = Memory::new();
        m.load(&[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(m.read_byte(0x200).unwrap(), 0x12);
        assert_eq!(m.read_byte(0x201).unwrap(), 0x34);
        assert_eq!(m.read_byte(0x202).unwrap(), 0x56);
        assert_eq!(m.read_byte(0x203).unwrap(), 0x00);
    }

    #[test]
    fn test_load_clears_previous_program() {
        let mut m = Memory::new();
        m.load(&[0xAA; 8]).unwrap();
        m.load(&[0x01]).unwrap();
        assert_eq!(m.read_range(0x200, 3).unwrap(), &[0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_load_empty_rom() {
        let mut m = Memory::new();
        m.load(&[0xFF; 4]).unwrap();
        m.load(&[]).unwrap();
        assert!(m.program().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_rejects_oversized_rom() {
        let mut m = Memory::new();
        let rom = vec![0x11; PROGRAM_CAPACITY + 1];
        assert_eq!(
            m.load(&rom),
            Err(MemoryError::RomTooLarge {
                size: PROGRAM_CAPACITY + 1,
                capacity: PROGRAM_CAPACITY
            })
        );
        assert_eq!(m.read_byte(0x200).unwrap(), 0);

        assert!(m.load(&vec![0x22; PROGRAM_CAPACITY]).is_ok());
        assert_eq!(m.read_byte(0xFFF).unwrap(), 0x22);
    }

    #[test]
    fn test_out_of_bounds_byte_access() {
        let mut m = Memory::new();
        assert_eq!(
            m.read_byte(0x1000),
            Err(MemoryError::OutOfBounds { addr: 0x1000 })
        );
        assert_eq!(
            m.write_byte(0xFFFF, 1),
            Err(MemoryError::OutOfBounds { addr: 0xFFFF })
        );
        assert!(m.write_byte(0xFFF, 7).is_ok());
        assert_eq!(m.read_byte(0xFFF).unwrap(), 7);
    }

    #[test]
    fn test_read_word_big_endian() {
        let mut m = Memory::new();
        m.load(&[0xA2, 0x2A]).unwrap();
        assert_eq!(m.read_word(0x200).unwrap(), 0xA22A);
        assert_eq!(
            m.read_word(0xFFF),
            Err(MemoryError::OutOfBounds { addr: 0x1000 })
        );
    }

    #[test]
    fn test_write_range_is_all_or_nothing() {
        let mut m = Memory::new();
        assert_eq!(
            m.write_range(0xFFE, &[1, 2, 3]),
            Err(MemoryError::OutOfBounds { addr: 0x1000 })
        );
        assert_eq!(m.read_range(0xFFE, 2).unwrap(), &[0, 0]);
        assert!(m.write_range(0xFFD, &[1, 2, 3]).is_ok());
        assert_eq!(m.read_range(0xFFD, 3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_serde_rejects_wrong_size() {
        let m = Memory::new();
        let json = serde_json::to_value(&m).unwrap();
        let back: Memory = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let short = serde_json::json!([0, 1, 2]);
        assert!(serde_json::from_value::<Memory>(short).is_err());
    }
}
