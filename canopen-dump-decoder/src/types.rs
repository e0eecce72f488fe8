//! Core types for the CANopen dump decoder
//!
//! This module defines the frame representation shared by every frame source,
//! the service classification emitted by the classifier, and the error type
//! used across the library.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type used when a frame time is shown as a calendar time
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Maximum payload length of a classic CAN frame
pub const CAN_MAX_DLC: usize = 8;

/// Identifier mask for 11-bit (standard) frames
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
/// Identifier mask for 29-bit (extended) frames
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;
/// Error frame flag in a raw identifier word
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;
/// Remote transmission request flag in a raw identifier word
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
/// Extended frame format flag in a raw identifier word
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;

/// A single classic CAN frame
///
/// The payload is stored fixed width and zero padded, so protocol fields
/// located past `len` read as zero instead of faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanFrame {
    /// CAN identifier (11-bit, or 29-bit if `is_extended`)
    pub can_id: u32,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// True if this is an error frame
    pub is_error_frame: bool,
    /// True if this is a remote frame
    pub is_remote_frame: bool,
    /// Data length code (0-8)
    pub len: u8,
    /// Payload, zero padded to 8 bytes
    pub data: [u8; CAN_MAX_DLC],
}

impl CanFrame {
    /// Create a standard data frame; payload beyond 8 bytes is dropped
    pub fn new(can_id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(CAN_MAX_DLC);
        let mut data = [0u8; CAN_MAX_DLC];
        data[..len].copy_from_slice(&payload[..len]);

        Self {
            can_id: can_id & CAN_SFF_MASK,
            len: len as u8,
            data,
            ..Default::default()
        }
    }

    /// Create a standard remote-request frame with the given length
    pub fn remote(can_id: u32, len: u8) -> Self {
        Self {
            can_id: can_id & CAN_SFF_MASK,
            is_remote_frame: true,
            len: len.min(CAN_MAX_DLC as u8),
            ..Default::default()
        }
    }

    /// Build a frame from the Linux `struct can_frame` fields
    pub fn from_raw(raw_id: u32, len: u8, data: [u8; CAN_MAX_DLC]) -> Self {
        let is_extended = raw_id & CAN_EFF_FLAG != 0;
        let can_id = if is_extended {
            raw_id & CAN_EFF_MASK
        } else {
            raw_id & CAN_SFF_MASK
        };

        Self {
            can_id,
            is_extended,
            is_error_frame: raw_id & CAN_ERR_FLAG != 0,
            is_remote_frame: raw_id & CAN_RTR_FLAG != 0,
            len: len.min(CAN_MAX_DLC as u8),
            data,
        }
    }

    /// Identifier word with the flag bits set, as in `struct can_frame`
    pub fn raw_id(&self) -> u32 {
        let mut raw = self.can_id;
        if self.is_extended {
            raw |= CAN_EFF_FLAG;
        }
        if self.is_remote_frame {
            raw |= CAN_RTR_FLAG;
        }
        if self.is_error_frame {
            raw |= CAN_ERR_FLAG;
        }
        raw
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.len as usize
    }

    /// Payload bytes actually carried by the frame
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc()]
    }

    /// Payload bytes from `offset` to the end of the frame
    ///
    /// Empty when the frame is shorter than `offset`.
    pub fn payload_from(&self, offset: usize) -> &[u8] {
        self.payload().get(offset..).unwrap_or(&[])
    }

    /// Byte at a fixed position of the padded payload
    pub fn byte(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0)
    }

    /// Little-endian u16 at a fixed position of the padded payload
    pub fn u16_le(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.byte(index), self.byte(index + 1)])
    }

    /// Little-endian u32 at a fixed position of the padded payload
    pub fn u32_le(&self, index: usize) -> u32 {
        u32::from_le_bytes([
            self.byte(index),
            self.byte(index + 1),
            self.byte(index + 2),
            self.byte(index + 3),
        ])
    }
}

/// A frame together with its time of capture
///
/// Live sources stamp the time of receipt, replay sources the stored time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampedFrame {
    /// Microseconds since the Unix epoch
    pub timestamp_us: u64,
    /// The frame itself
    pub frame: CanFrame,
}

impl TimestampedFrame {
    pub fn new(timestamp_us: u64, frame: CanFrame) -> Self {
        Self {
            timestamp_us,
            frame,
        }
    }

    /// Stamp a frame with the current wall-clock time
    pub fn received_now(frame: CanFrame) -> Self {
        let now = Utc::now().timestamp_micros();
        Self::new(u64::try_from(now).unwrap_or(0), frame)
    }

    /// Convert the timestamp to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        let micros = i64::try_from(self.timestamp_us).unwrap_or(i64::MAX);
        DateTime::from_timestamp_micros(micros).unwrap_or_default()
    }
}

/// Direction of a PDO or SDO relative to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to tool (TPDO, TSDO)
    Transmit,
    /// Tool to device (RPDO, RSDO)
    Receive,
}

impl Direction {
    /// Single-letter prefix used in rendered lines
    pub fn prefix(self) -> char {
        match self {
            Direction::Transmit => 'T',
            Direction::Receive => 'R',
        }
    }
}

/// CANopen service a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Nmt,
    Sync,
    Time,
    Emcy,
    /// Process data object 1-4
    Pdo { number: u8, direction: Direction },
    /// Service data object
    Sdo(Direction),
    Heartbeat,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Nmt => write!(f, "NMT"),
            ServiceKind::Sync => write!(f, "SYNC"),
            ServiceKind::Time => write!(f, "TIME"),
            ServiceKind::Emcy => write!(f, "EMCY"),
            ServiceKind::Pdo { number, direction } => {
                write!(f, "{}PDO{}", direction.prefix(), number)
            }
            ServiceKind::Sdo(direction) => write!(f, "{}SDO", direction.prefix()),
            ServiceKind::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// Object dictionary address: the (index, subindex) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Multiplexer {
    pub index: u16,
    pub subindex: u8,
}

impl Multiplexer {
    pub fn new(index: u16, subindex: u8) -> Self {
        Self { index, subindex }
    }
}

impl fmt::Display for Multiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}:{}", self.index, self.subindex)
    }
}

impl FromStr for Multiplexer {
    type Err = DecoderError;

    /// Parse `INDEX:SUBINDEX`; the index is hex (optional `0x`), the
    /// subindex decimal or `0x`-prefixed hex.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DecoderError::InvalidConfig(format!("Invalid object address: {:?}", s));

        let (index, subindex) = s.trim().split_once(':').ok_or_else(invalid)?;
        let index = index.trim();
        let index = index
            .strip_prefix("0x")
            .or_else(|| index.strip_prefix("0X"))
            .unwrap_or(index);
        let index = u16::from_str_radix(index, 16).map_err(|_| invalid())?;

        let subindex = subindex.trim();
        let subindex = match subindex
            .strip_prefix("0x")
            .or_else(|| subindex.strip_prefix("0X"))
        {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => subindex.parse::<u8>(),
        }
        .map_err(|_| invalid())?;

        Ok(Self::new(index, subindex))
    }
}

/// Errors that can occur while dumping
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Could not open {kind} source {address:?}: {source}")]
    SourceOpen {
        kind: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unclassifiable frame: CAN ID 0x{can_id:X}")]
    UnclassifiableFrame { can_id: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to render event line")]
    Render(#[from] fmt::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
