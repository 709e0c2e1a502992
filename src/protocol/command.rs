//! Outbound machine commands.
//!
//! A command is a keyword followed by the target machine's id as five
//! binary digits, most significant first:
//!
//! ```text
//!   "op", 6   ──▶  "OP,0,0,1,1,0"
//!   " on ", 31 ──▶ "ON,1,1,1,1,1"
//! ```

use core::fmt::Write;

use crate::error::CommandError;

/// Machine ids must fit in this many bits to be addressable.
pub const ADDRESS_BITS: usize = 5;

/// Largest addressable machine id.
pub const MAX_ADDRESS: u32 = (1 << ADDRESS_BITS) - 1;

pub type CommandString = heapless::String<16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    On,
    Off,
    Op,
}

impl CommandKind {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Op => "OP",
        }
    }

    /// Trim and case-fold `raw`, then match it against the keywords.
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let t = raw.trim();
        if t.eq_ignore_ascii_case("ON") {
            Ok(Self::On)
        } else if t.eq_ignore_ascii_case("OFF") {
            Ok(Self::Off)
        } else if t.eq_ignore_ascii_case("OP") {
            Ok(Self::Op)
        } else {
            Err(CommandError::InvalidCommand)
        }
    }
}

/// `value` as [`ADDRESS_BITS`] binary digits, most significant first.
pub fn number_to_bits(value: u32) -> Result<[u8; ADDRESS_BITS], CommandError> {
    if value > MAX_ADDRESS {
        return Err(CommandError::IdOutOfRange(value));
    }
    let mut bits = [0u8; ADDRESS_BITS];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = ((value >> (ADDRESS_BITS - 1 - i)) & 1) as u8;
    }
    Ok(bits)
}

/// Build the wire command for `machine_id`.
pub fn format_command(cmd: &str, machine_id: u32) -> Result<CommandString, CommandError> {
    let kind = CommandKind::parse(cmd)?;
    encode(kind, machine_id)
}

pub fn encode(kind: CommandKind, machine_id: u32) -> Result<CommandString, CommandError> {
    let bits = number_to_bits(machine_id)?;
    let mut out = CommandString::new();
    // Longest output is "OFF" + 5 * ",b" = 13 bytes; capacity is 16.
    let _ = out.push_str(kind.keyword());
    for b in bits {
        let _ = write!(out, ",{b}");
    }
    Ok(out)
}
