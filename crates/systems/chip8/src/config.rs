//! Interpreter settings

use serde::{Deserialize, Serialize};

/// What to do with an instruction word that decodes to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOpcodePolicy {
    /// Treat it as a no-op and log a warning.
    #[default]
    Ignore,
    /// Fail the cycle with `Chip8Error::UnknownOpcode`.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chip8Config {
    /// Instructions executed per 60 Hz frame; timers tick once per frame.
    pub cycles_per_frame: u32,
    pub unknown_opcode_policy: UnknownOpcodePolicy,
    /// Seed for `Cxkk`. `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for Chip8Config {
    fn default() -> Self {
        Self {
            cycles_per_frame: 11,
            unknown_opcode_policy: UnknownOpcodePolicy::Ignore,
            rng_seed: None,
        }
    }
}

impl Chip8Config {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
