//! Text rendering helpers
//!
//! All event lines are written into one reusable buffer owned by the
//! `Dumper`; these helpers append fragments to it.

use std::fmt::{self, Write};

/// Suffix appended to every line rendered from a remote-request frame
pub const RTR_MARKER: &str = " [RTR]";

/// How a value payload is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Space separated two-digit hex bytes
    Hex,
    /// Double-quoted text
    VisibleString,
}

/// Append `seconds.microseconds ` for a microsecond timestamp
pub fn write_timestamp(out: &mut String, timestamp_us: u64) -> fmt::Result {
    write!(
        out,
        "{}.{:06} ",
        timestamp_us / 1_000_000,
        timestamp_us % 1_000_000
    )
}

/// Append bytes as `01 02 ff`
pub fn write_hex(out: &mut String, data: &[u8]) -> fmt::Result {
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write!(out, "{:02x}", byte)?;
    }
    Ok(())
}

/// Append bytes as a quoted string; invalid UTF-8 is replaced
pub fn write_quoted(out: &mut String, data: &[u8]) -> fmt::Result {
    out.push('"');
    out.push_str(&String::from_utf8_lossy(data));
    out.push('"');
    Ok(())
}

pub fn write_value(out: &mut String, data: &[u8], format: ValueFormat) -> fmt::Result {
    match format {
        ValueFormat::Hex => write_hex(out, data),
        ValueFormat::VisibleString => write_quoted(out, data),
    }
}

/// Hex rendering as an owned string
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    // Writing to a String cannot fail
    let _ = write_hex(&mut out, data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let mut out = String::new();
        write_timestamp(&mut out, 1_234_000_042).unwrap();
        assert_eq!(out, "1234.000042 ");
    }

    #[test]
    fn test_hexdump() {
        assert_eq!(hexdump(&[0x01, 0x02, 0xAB, 0xFF]), "01 02 ab ff");
        assert_eq!(hexdump(&[]), "");
    }

    #[test]
    fn test_quoted_value() {
        let mut out = String::new();
        write_value(&mut out, b"CiA-301", ValueFormat::VisibleString).unwrap();
        assert_eq!(out, "\"CiA-301\"");
    }
}
