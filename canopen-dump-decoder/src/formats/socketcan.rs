//! Native bus capture through SocketCAN (Linux)

use crate::types::{CanFrame, DecoderError, Result, TimestampedFrame};
use socketcan::{CanFrame as BusFrame, CanSocket, EmbeddedFrame, Frame, Socket};

/// Live frame source reading from a SocketCAN interface
pub struct SocketCanSource {
    socket: CanSocket,
    interface: String,
    finished: bool,
}

impl SocketCanSource {
    /// Open a raw CAN socket on `interface` (e.g. `can0`, `vcan0`)
    pub fn open(interface: &str) -> Result<Self> {
        log::info!("Opening CAN interface {}", interface);

        let socket = CanSocket::open(interface).map_err(|source| DecoderError::SourceOpen {
            kind: "can",
            address: interface.to_string(),
            source,
        })?;

        Ok(Self {
            socket,
            interface: interface.to_string(),
            finished: false,
        })
    }
}

impl Iterator for SocketCanSource {
    type Item = Result<TimestampedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let received = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Read from {} failed: {}", self.interface, e);
                    self.finished = true;
                    return None;
                }
            };

            // Extended identifiers and error frames are not CANopen traffic
            let frame = match received {
                BusFrame::Data(data) if !EmbeddedFrame::is_extended(&data) => {
                    CanFrame::new(Frame::raw_id(&data), EmbeddedFrame::data(&data))
                }
                BusFrame::Remote(remote) if !EmbeddedFrame::is_extended(&remote) => {
                    CanFrame::remote(Frame::raw_id(&remote), EmbeddedFrame::dlc(&remote) as u8)
                }
                other => {
                    log::trace!("Skipping frame 0x{:X} from {}", Frame::raw_id(&other), self.interface);
                    continue;
                }
            };

            return Some(Ok(TimestampedFrame::received_now(frame)));
        }
    }
}
