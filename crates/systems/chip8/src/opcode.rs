//! Instruction decoding
//!
//! Every instruction is one big-endian 16-bit word split into nibbles:
//!
//! ```text
//!  Var  Bits  Location                 Meaning
//!  x    4     high byte, low nibble    register index
//!  y    4     low byte, high nibble    register index
//!  n    4     low byte, low nibble     sprite height
//!  kk   8     low byte                 immediate
//!  nnn  12    low 12 bits              address
//! ```
//!
//! Words that match no known form decode to `None`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 1nnn
    Jp(u16),
    /// 2nnn
    Call(u16),
    /// 3xkk
    SeImm { x: u8, kk: u8 },
    /// 4xkk
    SneImm { x: u8, kk: u8 },
    /// 5xy0
    SeReg { x: u8, y: u8 },
    /// 6xkk
    LdImm { x: u8, kk: u8 },
    /// 7xkk
    AddImm { x: u8, kk: u8 },
    /// 8xy0
    LdReg { x: u8, y: u8 },
    /// 8xy1
    Or { x: u8, y: u8 },
    /// 8xy2
    And { x: u8, y: u8 },
    /// 8xy3
    Xor { x: u8, y: u8 },
    /// 8xy4
    AddReg { x: u8, y: u8 },
    /// 8xy5
    Sub { x: u8, y: u8 },
    /// 8xy6
    Shr { x: u8 },
    /// 8xy7
    Subn { x: u8, y: u8 },
    /// 8xyE
    Shl { x: u8 },
    /// 9xy0
    SneReg { x: u8, y: u8 },
    /// Annn
    LdI(u16),
    /// Bnnn
    JpV0(u16),
    /// Cxkk
    Rnd { x: u8, kk: u8 },
    /// Dxyn
    Drw { x: u8, y: u8, n: u8 },
    /// Ex9E
    Skp { x: u8 },
    /// ExA1
    Sknp { x: u8 },
    /// Fx07
    LdVxDt { x: u8 },
    /// Fx0A
    WaitKey { x: u8 },
    /// Fx15
    LdDtVx { x: u8 },
    /// Fx18
    LdStVx { x: u8 },
    /// Fx1E
    AddI { x: u8 },
    /// Fx29
    LdFont { x: u8 },
    /// Fx33
    Bcd { x: u8 },
    /// Fx55
    StoreRegs { x: u8 },
    /// Fx65
    LoadRegs { x: u8 },
}

impl Opcode {
    pub fn decode(word: u16) -> Option<Opcode> {
        let c = (word >> 12) as u8;
        let x = ((word >> 8) & 0xF) as u8;
        let y = ((word >> 4) & 0xF) as u8;
        let n = (word & 0xF) as u8;
        let kk = (word & 0xFF) as u8;
        let nnn = word & 0x0FFF;

        let op = match (c, x, y, n) {
            (0x0, 0x0, 0xE, 0x0) => Opcode::Cls,
            (0x0, 0x0, 0xE, 0xE) => Opcode::Ret,
            (0x1, _, _, _) => Opcode::Jp(nnn),
            (0x2, _, _, _) => Opcode::Call(nnn),
            (0x3, _, _, _) => Opcode::SeImm { x, kk },
            (0x4, _, _, _) => Opcode::SneImm { x, kk },
            (0x5, _, _, 0x0) => Opcode::SeReg { x, y },
            (0x6, _, _, _) => Opcode::LdImm { x, kk },
            (0x7, _, _, _) => Opcode::AddImm { x, kk },
            (0x8, _, _, 0x0) => Opcode::LdReg { x, y },
            (0x8, _, _, 0x1) => Opcode::Or { x, y },
            (0x8, _, _, 0x2) => Opcode::And { x, y },
            (0x8, _, _, 0x3) => Opcode::Xor { x, y },
            (0x8, _, _, 0x4) => Opcode::AddReg { x, y },
            (0x8, _, _, 0x5) => Opcode::Sub { x, y },
            (0x8, _, _, 0x6) => Opcode::Shr { x },
            (0x8, _, _, 0x7) => Opcode::Subn { x, y },
            (0x8, _, _, 0xE) => Opcode::Shl { x },
            (0x9, _, _, 0x0) => Opcode::SneReg { x, y },
            (0xA, _, _, _) => Opcode::LdI(nnn),
            (0xB, _, _, _) => Opcode::JpV0(nnn),
            (0xC, _, _, _) => Opcode::Rnd { x, kk },
            (0xD, _, _, _) => Opcode::Drw { x, y, n },
            (0xE, _, 0x9, 0xE) => Opcode::Skp { x },
            (0xE, _, 0xA, 0x1) => Opcode::Sknp { x },
            (0xF, _, 0x0, 0x7) => Opcode::LdVxDt { x },
            (0xF, _, 0x0, 0xA) => Opcode::WaitKey { x },
            (0xF, _, 0x1, 0x5) => Opcode::LdDtVx { x },
            (0xF, _, 0x1, 0x8) => Opcode::LdStVx { x },
            (0xF, _, 0x1, 0xE) => Opcode::AddI { x },
            (0xF, _, 0x2, 0x9) => Opcode::LdFont { x },
            (0xF, _, 0x3, 0x3) => Opcode::Bcd { x },
            (0xF, _, 0x5, 0x5) => Opcode::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Opcode::LoadRegs { x },
            _ => return None,
        };
        Some(op)
    }

    /// Instruction word for this opcode. Shifts encode with y = 0.
    pub fn encode(self) -> u16 {
        fn xy(hi: u16, x: u8, y: u8, lo: u16) -> u16 {
            hi << 12 | (x as u16) << 8 | (y as u16) << 4 | lo
        }
        fn xkk(hi: u16, x: u8, kk: u8) -> u16 {
            hi << 12 | (x as u16) << 8 | kk as u16
        }

        match self {
            Opcode::Cls => 0x00E0,
            Opcode::Ret => 0x00EE,
            Opcode::Jp(nnn) => 0x1000 | nnn,
            Opcode::Call(nnn) => 0x2000 | nnn,
            Opcode::SeImm { x, kk } => xkk(0x3, x, kk),
            Opcode::SneImm { x, kk } => xkk(0x4, x, kk),
            Opcode::SeReg { x, y } => xy(0x5, x, y, 0x0),
            Opcode::LdImm { x, kk } => xkk(0x6, x, kk),
            Opcode::AddImm { x, kk } => xkk(0x7, x, kk),
            Opcode::LdReg { x, y } => xy(0x8, x, y, 0x0),
            Opcode::Or { x, y } => xy(0x8, x, y, 0x1),
            Opcode::And { x, y } => xy(0x8, x, y, 0x2),
            Opcode::Xor { x, y } => xy(0x8, x, y, 0x3),
            Opcode::AddReg { x, y } => xy(0x8, x, y, 0x4),
            Opcode::Sub { x, y } => xy(0x8, x, y, 0x5),
            Opcode::Shr { x } => xy(0x8, x, 0, 0x6),
            Opcode::Subn { x, y } => xy(0x8, x, y, 0x7),
            Opcode::Shl { x } => xy(0x8, x, 0, 0xE),
            Opcode::SneReg { x, y } => xy(0x9, x, y, 0x0),
            Opcode::LdI(nnn) => 0xA000 | nnn,
            Opcode::JpV0(nnn) => 0xB000 | nnn,
            Opcode::Rnd { x, kk } => xkk(0xC, x, kk),
            Opcode::Drw { x, y, n } => xy(0xD, x, y, n as u16),
            Opcode::Skp { x } => xkk(0xE, x, 0x9E),
            Opcode::Sknp { x } => xkk(0xE, x, 0xA1),
            Opcode::LdVxDt { x } => xkk(0xF, x, 0x07),
            Opcode::WaitKey { x } => xkk(0xF, x, 0x0A),
            Opcode::LdDtVx { x } => xkk(0xF, x, 0x15),
            Opcode::LdStVx { x } => xkk(0xF, x, 0x18),
            Opcode::AddI { x } => xkk(0xF, x, 0x1E),
            Opcode::LdFont { x } => xkk(0xF, x, 0x29),
            Opcode::Bcd { x } => xkk(0xF, x, 0x33),
            Opcode::StoreRegs { x } => xkk(0xF, x, 0x55),
            Opcode::LoadRegs { x } => xkk(0xF, x, 0x65),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Opcode::Cls => write!(f, "CLS"),
            Opcode::Ret => write!(f, "RET"),
            Opcode::Jp(nnn) => write!(f, "JP {:#05X}", nnn),
            Opcode::Call(nnn) => write!(f, "CALL {:#05X}", nnn),
            Opcode::SeImm { x, kk } => write!(f, "SE V{:X}, {:#04X}", x, kk),
            Opcode::SneImm { x, kk } => write!(f, "SNE V{:X}, {:#04X}", x, kk),
            Opcode::SeReg { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            Opcode::LdImm { x, kk } => write!(f, "LD V{:X}, {:#04X}", x, kk),
            Opcode::AddImm { x, kk } => write!(f, "ADD V{:X}, {:#04X}", x, kk),
            Opcode::LdReg { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Opcode::Or { x, y } => write!(f, "OR V{:X}, V{:X}", x, y),
            Opcode::And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Opcode::Xor { x, y } => write!(f, "XOR V{:X}, V{:X}", x, y),
            Opcode::AddReg { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Opcode::Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            Opcode::Shr { x } => write!(f, "SHR V{:X}", x),
            Opcode::Subn { x, y } => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Opcode::Shl { x } => write!(f, "SHL V{:X}", x),
            Opcode::SneReg { x, y } => write!(f, "SNE V{:X}, V{:X}", x, y),
            Opcode::LdI(nnn) => write!(f, "LD I, {:#05X}", nnn),
            Opcode::JpV0(nnn) => write!(f, "JP V0, {:#05X}", nnn),
            Opcode::Rnd { x, kk } => write!(f, "RND V{:X}, {:#04X}", x, kk),
            Opcode::Drw { x, y, n } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Opcode::Skp { x } => write!(f, "SKP V{:X}", x),
            Opcode::Sknp { x } => write!(f, "SKNP V{:X}", x),
            Opcode::LdVxDt { x } => write!(f, "LD V{:X}, DT", x),
            Opcode::WaitKey { x } => write!(f, "LD V{:X}, K", x),
            Opcode::LdDtVx { x } => write!(f, "LD DT, V{:X}", x),
            Opcode::LdStVx { x } => write!(f, "LD ST, V{:X}", x),
            Opcode::AddI { x } => write!(f, "ADD I, V{:X}", x),
            Opcode::LdFont { x } => write!(f, "LD F, V{:X}", x),
            Opcode::Bcd { x } => write!(f, "LD B, V{:X}", x),
            Opcode::StoreRegs { x } => write!(f, "LD [I], V{:X}", x),
            Opcode::LoadRegs { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}

/// Walk `bytes` two at a time, pairing each word's address with its decoding.
///
/// A trailing odd byte is ignored.
pub fn disassemble(bytes: &[u8], origin: u16) -> Vec<(u16, u16, Option<Opcode>)> {
    bytes
        .chunks_exact(2)
        .enumerate()
        .map(|(idx, pair)| {
            let word = u16::from_be_bytes([pair[0], pair[1]]);
            let addr = origin.wrapping_add(2 * idx as u16);
            (addr, word, Opcode::decode(word))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_form() {
        let cases = [
            (0x00E0, Opcode::Cls),
            (0x00EE, Opcode::Ret),
            (0x1ABC, Opcode::Jp(0xABC)),
            (0x2ABC, Opcode::Call(0xABC)),
            (0x3A42, Opcode::SeImm { x: 0xA, kk: 0x42 }),
            (0x4A42, Opcode::SneImm { x: 0xA, kk: 0x42 }),
            (0x5AB0, Opcode::SeReg { x: 0xA, y: 0xB }),
            (0x6A42, Opcode::LdImm { x: 0xA, kk: 0x42 }),
            (0x7A42, Opcode::AddImm { x: 0xA, kk: 0x42 }),
            (0x8AB0, Opcode::LdReg { x: 0xA, y: 0xB }),
            (0x8AB1, Opcode::Or { x: 0xA, y: 0xB }),
            (0x8AB2, Opcode::And { x: 0xA, y: 0xB }),
            (0x8AB3, Opcode::Xor { x: 0xA, y: 0xB }),
            (0x8AB4, Opcode::AddReg { x: 0xA, y: 0xB }),
            (0x8AB5, Opcode::Sub { x: 0xA, y: 0xB }),
            (0x8AB6, Opcode::Shr { x: 0xA }),
            (0x8AB7, Opcode::Subn { x: 0xA, y: 0xB }),
            (0x8ABE, Opcode::Shl { x: 0xA }),
            (0x9AB0, Opcode::SneReg { x: 0xA, y: 0xB }),
            (0xA123, Opcode::LdI(0x123)),
            (0xB123, Opcode::JpV0(0x123)),
            (0xCA0F, Opcode::Rnd { x: 0xA, kk: 0x0F }),
            (0xDAB5, Opcode::Drw { x: 0xA, y: 0xB, n: 5 }),
            (0xEA9E, Opcode::Skp { x: 0xA }),
            (0xEAA1, Opcode::Sknp { x: 0xA }),
            (0xFA07, Opcode::LdVxDt { x: 0xA }),
            (0xFA0A, Opcode::WaitKey { x: 0xA }),
            (0xFA15, Opcode::LdDtVx { x: 0xA }),
            (0xFA18, Opcode::LdStVx { x: 0xA }),
            (0xFA1E, Opcode::AddI { x: 0xA }),
            (0xFA29, Opcode::LdFont { x: 0xA }),
            (0xFA33, Opcode::Bcd { x: 0xA }),
            (0xFA55, Opcode::StoreRegs { x: 0xA }),
            (0xFA65, Opcode::LoadRegs { x: 0xA }),
        ];

        for (word, expected) in cases {
            assert_eq!(Opcode::decode(word), Some(expected), "word {:04X}", word);
        }
    }

    #[test]
    fn rejects_near_misses() {
        for word in [
            0x0000, 0x0123, 0x00E1, 0x00FF, 0x5AB1, 0x8AB8, 0x8ABF, 0x9AB1, 0xEA9F, 0xE0FF,
            0xF000, 0xF0FF, 0xFA56,
        ] {
            assert_eq!(Opcode::decode(word), None, "word {:04X}", word);
        }
    }

    #[test]
    fn encode_inverts_decode() {
        for word in [0x00E0, 0x2ABC, 0x5AB0, 0x8AB4, 0xDAB5, 0xEAA1, 0xF333, 0xFF65] {
            let op = Opcode::decode(word).unwrap();
            assert_eq!(op.encode(), word);
        }
        // The shift forms ignore y, so they re-encode with y = 0.
        assert_eq!(Opcode::decode(0x8AB6).unwrap().encode(), 0x8A06);
    }

    #[test]
    fn mnemonics() {
        assert_eq!(Opcode::LdImm { x: 3, kk: 0x2A }.to_string(), "LD V3, 0x2A");
        assert_eq!(Opcode::Drw { x: 0, y: 1, n: 5 }.to_string(), "DRW V0, V1, 5");
        assert_eq!(Opcode::Call(0x300).to_string(), "CALL 0x300");
        assert_eq!(Opcode::StoreRegs { x: 0xF }.to_string(), "LD [I], VF");
    }

    #[test]
    fn disassemble_listing() {
        let listing = disassemble(&[0x00, 0xE0, 0x12, 0x00, 0x01, 0x23, 0xFF], 0x200);
        assert_eq!(
            listing,
            vec![
                (0x200, 0x00E0, Some(Opcode::Cls)),
                (0x202, 0x1200, Some(Opcode::Jp(0x200))),
                (0x204, 0x0123, None),
            ]
        );
    }
}
