//! TCP bridge client
//!
//! The bridge forwards every bus frame as a raw 16-byte frame record. Frames
//! are stamped with the local time of receipt.

use super::record::read_frame;
use crate::types::{DecoderError, Result, TimestampedFrame};
use std::io::BufReader;
use std::net::TcpStream;

/// Live frame source reading from a TCP bridge
pub struct TcpSource {
    reader: BufReader<TcpStream>,
    peer: String,
    finished: bool,
}

impl TcpSource {
    /// Connect to a bridge at `host:port`
    pub fn connect(address: &str) -> Result<Self> {
        log::info!("Connecting to TCP bridge at {}", address);

        let open_error = |source: std::io::Error| DecoderError::SourceOpen {
            kind: "tcp",
            address: address.to_string(),
            source,
        };

        let stream = TcpStream::connect(address).map_err(open_error)?;
        stream.set_nodelay(true).map_err(open_error)?;

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| address.to_string());
        log::debug!("Connected to {}", peer);

        Ok(Self {
            reader: BufReader::new(stream),
            peer,
            finished: false,
        })
    }
}

impl Iterator for TcpSource {
    type Item = Result<TimestampedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match read_frame(&mut self.reader) {
            Ok(Some(frame)) => Some(Ok(TimestampedFrame::received_now(frame))),
            Ok(None) => {
                log::info!("TCP bridge {} closed the connection", self.peer);
                self.finished = true;
                None
            }
            Err(e) => {
                // The transport went away; end the capture
                log::warn!("Read from TCP bridge {} failed: {}", self.peer, e);
                self.finished = true;
                None
            }
        }
    }
}
