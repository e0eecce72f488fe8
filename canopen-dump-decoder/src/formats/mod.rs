//! Frame sources (trace replay, TCP bridge, SocketCAN)
//!
//! Every source is an iterator over timestamped frames. `None` means the
//! stream ended: the file is exhausted or the transport closed.

use crate::config::SourceMode;
use crate::types::{Result, TimestampedFrame};
use std::path::Path;

pub mod record;
pub mod tcp;
pub mod trace;

#[cfg(feature = "socketcan")]
pub mod socketcan;

// Re-export source types
pub use tcp::TcpSource;
pub use trace::{RecordingSource, TraceFileParser, TraceFrameIterator, TraceWriter};

#[cfg(feature = "socketcan")]
pub use self::socketcan::SocketCanSource;

/// A boxed frame source, as returned by [`open_source`]
pub type FrameSource = Box<dyn Iterator<Item = Result<TimestampedFrame>>>;

/// Open the source for `mode`
///
/// `address` is a trace file path, a `host:port` bridge address or a CAN
/// interface name. Failing to open is reported here, before any frame is read.
pub fn open_source(mode: SourceMode, address: &str) -> Result<FrameSource> {
    log::debug!("Opening {} source {:?}", mode, address);

    match mode {
        SourceMode::File => Ok(Box::new(TraceFileParser::parse(Path::new(address))?)),
        SourceMode::Tcp => Ok(Box::new(TcpSource::connect(address)?)),
        SourceMode::Can => open_can(address),
    }
}

#[cfg(feature = "socketcan")]
fn open_can(interface: &str) -> Result<FrameSource> {
    Ok(Box::new(SocketCanSource::open(interface)?))
}

#[cfg(not(feature = "socketcan"))]
fn open_can(interface: &str) -> Result<FrameSource> {
    Err(crate::types::DecoderError::SourceOpen {
        kind: "can",
        address: interface.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "built without the `socketcan` feature",
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecoderError;

    #[test]
    fn test_missing_trace_file() {
        let result = open_source(SourceMode::File, "/nonexistent/capture.trc");
        assert!(matches!(result, Err(DecoderError::SourceOpen { .. })));
    }

    #[cfg(not(feature = "socketcan"))]
    #[test]
    fn test_can_mode_needs_feature() {
        let result = open_source(SourceMode::Can, "vcan0");
        assert!(matches!(result, Err(DecoderError::SourceOpen { kind: "can", .. })));
    }
}
