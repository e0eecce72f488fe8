//! Dump configuration types
//!
//! `DumpOptions` is a bitmask: one bit for the timestamp prefix, one filter
//! bit per service class and two bits selecting the source mode. Options are
//! resolved once, before the decode loop starts.

use crate::types::{Direction, ServiceKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Resolved or unresolved dump options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DumpOptions(u32);

impl DumpOptions {
    /// Prefix each line with `seconds.microseconds`
    pub const TIMESTAMP: Self = Self(1 << 0);

    pub const FILTER_NMT: Self = Self(1 << 1);
    pub const FILTER_SYNC: Self = Self(1 << 2);
    pub const FILTER_TIME: Self = Self(1 << 3);
    pub const FILTER_EMCY: Self = Self(1 << 4);
    pub const FILTER_SDO: Self = Self(1 << 5);
    pub const FILTER_HEARTBEAT: Self = Self(1 << 6);

    pub const FILTER_TPDO1: Self = Self(1 << 7);
    pub const FILTER_TPDO2: Self = Self(1 << 8);
    pub const FILTER_TPDO3: Self = Self(1 << 9);
    pub const FILTER_TPDO4: Self = Self(1 << 10);
    pub const FILTER_RPDO1: Self = Self(1 << 11);
    pub const FILTER_RPDO2: Self = Self(1 << 12);
    pub const FILTER_RPDO3: Self = Self(1 << 13);
    pub const FILTER_RPDO4: Self = Self(1 << 14);

    /// Every transmit and receive PDO
    pub const FILTER_PDO: Self = Self(0xFF << 7);
    /// Every service class
    pub const FILTER_MASK: Self = Self(0x7FFE);

    /// Replay a trace file instead of capturing
    pub const MODE_FILE: Self = Self(1 << 16);
    /// Capture through a TCP bridge instead of a native bus socket
    pub const MODE_TCP: Self = Self(1 << 17);

    const MODE_MASK: Self = Self(Self::MODE_FILE.0 | Self::MODE_TCP.0);

    /// Create empty options (no timestamp, no filter, live CAN)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Builder method: enable or disable the timestamp prefix
    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        if enabled {
            self.insert(Self::TIMESTAMP);
        } else {
            self.remove(Self::TIMESTAMP);
        }
        self
    }

    /// Builder method: add a filter bit (or several)
    pub fn with_filter(mut self, filter: Self) -> Self {
        self.insert(filter & Self::FILTER_MASK);
        self
    }

    /// Builder method: select the source mode
    pub fn with_source_mode(mut self, mode: SourceMode) -> Self {
        self.remove(Self::MODE_MASK);
        match mode {
            SourceMode::Can => {}
            SourceMode::Tcp => self.insert(Self::MODE_TCP),
            SourceMode::File => self.insert(Self::MODE_FILE),
        }
        self
    }

    pub fn include_timestamp(self) -> bool {
        self.contains(Self::TIMESTAMP)
    }

    /// Source mode selected by the mode bits; file replay wins over TCP
    pub fn source_mode(self) -> SourceMode {
        if self.contains(Self::MODE_FILE) {
            SourceMode::File
        } else if self.contains(Self::MODE_TCP) {
            SourceMode::Tcp
        } else {
            SourceMode::Can
        }
    }

    /// Apply the default-resolution rule to the filter bits
    ///
    /// No filter bit set enables every class; otherwise only the set ones.
    /// Timestamp and mode bits pass through unchanged.
    pub fn resolve(self) -> Self {
        if self.intersects(Self::FILTER_MASK) {
            self
        } else {
            self | Self::FILTER_MASK
        }
    }

    /// The filter bit governing a service class
    pub fn filter_for(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Nmt => Self::FILTER_NMT,
            ServiceKind::Sync => Self::FILTER_SYNC,
            ServiceKind::Time => Self::FILTER_TIME,
            ServiceKind::Emcy => Self::FILTER_EMCY,
            ServiceKind::Sdo(_) => Self::FILTER_SDO,
            ServiceKind::Heartbeat => Self::FILTER_HEARTBEAT,
            ServiceKind::Pdo { number, direction } => {
                let base = match direction {
                    Direction::Transmit => Self::FILTER_TPDO1.0,
                    Direction::Receive => Self::FILTER_RPDO1.0,
                };
                match number {
                    1..=4 => Self(base << (number - 1)),
                    _ => Self(0),
                }
            }
        }
    }

    /// Check if a service class should be rendered
    ///
    /// Expects resolved options; unresolved empty options enable nothing.
    pub fn is_enabled(self, kind: ServiceKind) -> bool {
        let filter = Self::filter_for(kind);
        filter.0 != 0 && self.contains(filter)
    }

    /// Filter bits for a class name as used on the command line
    ///
    /// Accepts `nmt`, `sync`, `time`, `emcy`, `sdo`, `heartbeat`,
    /// `tpdo1`..`tpdo4`, `rpdo1`..`rpdo4`, and the groups `tpdo`, `rpdo`
    /// and `pdo`. Matching is case-insensitive.
    pub fn filter_by_name(name: &str) -> Option<Self> {
        let filter = match name.trim().to_ascii_lowercase().as_str() {
            "nmt" => Self::FILTER_NMT,
            "sync" => Self::FILTER_SYNC,
            "time" | "timestamp" => Self::FILTER_TIME,
            "emcy" => Self::FILTER_EMCY,
            "sdo" => Self::FILTER_SDO,
            "heartbeat" | "hb" => Self::FILTER_HEARTBEAT,
            "tpdo1" => Self::FILTER_TPDO1,
            "tpdo2" => Self::FILTER_TPDO2,
            "tpdo3" => Self::FILTER_TPDO3,
            "tpdo4" => Self::FILTER_TPDO4,
            "rpdo1" => Self::FILTER_RPDO1,
            "rpdo2" => Self::FILTER_RPDO2,
            "rpdo3" => Self::FILTER_RPDO3,
            "rpdo4" => Self::FILTER_RPDO4,
            "tpdo" => Self(0x0F << 7),
            "rpdo" => Self(0x0F << 11),
            "pdo" => Self::FILTER_PDO,
            _ => return None,
        };
        Some(filter)
    }
}

impl BitOr for DumpOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DumpOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DumpOptions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Native bus socket (SocketCAN interface name)
    #[default]
    Can,
    /// TCP bridge (`host:port`)
    Tcp,
    /// Recorded trace file
    File,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Can => write!(f, "can"),
            SourceMode::Tcp => write!(f, "tcp"),
            SourceMode::File => write!(f, "file"),
        }
    }
}

/// What the decode loop does with a frame no service claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnclassifiedPolicy {
    /// Log, count and continue with the next frame
    #[default]
    Skip,
    /// Stop the loop and return the error
    Abort,
}
