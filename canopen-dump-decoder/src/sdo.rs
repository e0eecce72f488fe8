//! SDO transfer reconstruction
//!
//! SDO frames are decoded per direction: the receive direction (RSDO)
//! carries client requests and the transmit direction (TSDO) carries server
//! responses. Segmented transfers are reassembled in the node's accumulator
//! so the complete value can be shown when the final segment arrives.
//!
//! Block transfers are not decoded; their command specifiers render as
//! `unknown-command-specifier`.

use crate::lookup::{sdo_abort_to_string, TypeDictionary};
use crate::node_state::NodeTable;
use crate::render::{write_hex, write_value, ValueFormat};
use crate::types::{CanFrame, Direction, Multiplexer, CAN_MAX_DLC};
use std::fmt::{self, Write};

/// Offset of the data field in an expedited initiate frame
pub const SDO_EXPEDITED_DATA_IDX: usize = 4;
/// Offset of the total size field in a segmented initiate frame
pub const SDO_INDICATED_SIZE_IDX: usize = 4;
/// Offset of the data field in a segment frame
pub const SDO_SEGMENT_DATA_IDX: usize = 1;

/// Object holding the device type
pub const DEVICE_TYPE_OBJECT: Multiplexer = Multiplexer {
    index: 0x1000,
    subindex: 0,
};

/// Upper bound on the accumulator space reserved from a declared size
const MAX_PREALLOCATION: usize = 0x1_0000;

const SEGMENT_END_FLAG: u8 = 0x01;

/// Command specifier: bits 5-7 of byte 0
pub fn command_specifier(frame: &CanFrame) -> u8 {
    frame.byte(0) >> 5
}

/// Client command specifiers, seen on RSDO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    DownloadSegment,
    InitiateDownload,
    InitiateUpload,
    UploadSegment,
    Abort,
}

impl ClientCommand {
    pub fn from_specifier(specifier: u8) -> Option<Self> {
        match specifier {
            0 => Some(Self::DownloadSegment),
            1 => Some(Self::InitiateDownload),
            2 => Some(Self::InitiateUpload),
            3 => Some(Self::UploadSegment),
            4 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Server command specifiers, seen on TSDO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    UploadSegment,
    DownloadSegmentResponse,
    InitiateUploadResponse,
    InitiateDownloadResponse,
    Abort,
}

impl ServerCommand {
    pub fn from_specifier(specifier: u8) -> Option<Self> {
        match specifier {
            0 => Some(Self::UploadSegment),
            1 => Some(Self::DownloadSegmentResponse),
            2 => Some(Self::InitiateUploadResponse),
            3 => Some(Self::InitiateDownloadResponse),
            4 => Some(Self::Abort),
            _ => None,
        }
    }
}

/// Flags of an initiate frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiateFlags {
    pub expedited: bool,
    pub size_indicated: bool,
    /// Data bytes in an expedited frame when the size is indicated
    pub expedited_size: usize,
}

impl InitiateFlags {
    pub fn decode(command: u8) -> Self {
        Self {
            expedited: command & 0x02 != 0,
            size_indicated: command & 0x01 != 0,
            expedited_size: 4 - usize::from((command >> 2) & 0x03),
        }
    }
}

/// Object addressed by an initiate or abort frame
pub fn multiplexer(frame: &CanFrame) -> Multiplexer {
    Multiplexer::new(frame.u16_le(1), frame.byte(3))
}

/// Value bytes of an expedited initiate frame
///
/// Without a size indication this is everything after the header; with
/// one, the declared size clamped to the bytes actually present.
pub fn expedited_data(frame: &CanFrame) -> &[u8] {
    let available = frame.payload_from(SDO_EXPEDITED_DATA_IDX);
    let flags = InitiateFlags::decode(frame.byte(0));

    if flags.size_indicated {
        &available[..flags.expedited_size.min(available.len())]
    } else {
        available
    }
}

/// Total size announced by a segmented initiate frame
///
/// Only a full-length frame carries the size field.
pub fn indicated_size(frame: &CanFrame) -> Option<u32> {
    let flags = InitiateFlags::decode(frame.byte(0));
    (!flags.expedited && flags.size_indicated && frame.dlc() == CAN_MAX_DLC)
        .then(|| frame.u32_le(SDO_INDICATED_SIZE_IDX))
}

/// Which way a segmented transfer moves its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Download,
    Upload,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transfer::Download => f.write_str("download"),
            Transfer::Upload => f.write_str("upload"),
        }
    }
}

/// Decodes one SDO frame at a time into a line buffer
pub struct SdoEngine<'a> {
    nodes: &'a mut NodeTable,
    dictionary: &'a TypeDictionary,
    out: &'a mut String,
}

impl<'a> SdoEngine<'a> {
    pub fn new(nodes: &'a mut NodeTable, dictionary: &'a TypeDictionary, out: &'a mut String) -> Self {
        Self {
            nodes,
            dictionary,
            out,
        }
    }

    /// Decode an SDO frame and append its event text
    ///
    /// # Arguments
    /// * `direction` - `Receive` for RSDO (client to server), `Transmit` for TSDO
    /// * `node_id` - Node addressed by the frame
    /// * `frame` - The SDO frame
    pub fn decode(&mut self, direction: Direction, node_id: u8, frame: &CanFrame) -> fmt::Result {
        let specifier = command_specifier(frame);

        match direction {
            Direction::Receive => match ClientCommand::from_specifier(specifier) {
                Some(ClientCommand::InitiateDownload) => {
                    self.initiate(Transfer::Download, direction, node_id, frame)
                }
                Some(ClientCommand::DownloadSegment) => {
                    self.segment(Transfer::Download, direction, node_id, frame)
                }
                Some(ClientCommand::InitiateUpload) => {
                    let multiplexer = multiplexer(frame);
                    write!(
                        self.out,
                        "RSDO {} init-upload-segment index={:x},subindex={}",
                        node_id, multiplexer.index, multiplexer.subindex
                    )
                }
                Some(ClientCommand::UploadSegment) => {
                    write!(self.out, "RSDO {} upload-segment", node_id)
                }
                Some(ClientCommand::Abort) => self.abort(direction, node_id, frame),
                None => self.unknown(direction, node_id, specifier),
            },
            Direction::Transmit => match ServerCommand::from_specifier(specifier) {
                Some(ServerCommand::InitiateUploadResponse) => {
                    self.initiate(Transfer::Upload, direction, node_id, frame)
                }
                Some(ServerCommand::UploadSegment) => {
                    self.segment(Transfer::Upload, direction, node_id, frame)
                }
                Some(ServerCommand::InitiateDownloadResponse) => {
                    write!(self.out, "TSDO {} init-download-segment", node_id)
                }
                Some(ServerCommand::DownloadSegmentResponse) => {
                    write!(
                        self.out,
                        "TSDO {} download-segment{}",
                        node_id,
                        end_suffix(frame)
                    )
                }
                Some(ServerCommand::Abort) => self.abort(direction, node_id, frame),
                None => self.unknown(direction, node_id, specifier),
            },
        }
    }

    fn initiate(
        &mut self,
        transfer: Transfer,
        direction: Direction,
        node_id: u8,
        frame: &CanFrame,
    ) -> fmt::Result {
        let flags = InitiateFlags::decode(frame.byte(0));
        let multiplexer = multiplexer(frame);

        write!(
            self.out,
            "{}SDO {} init-{}-{} index={:x},subindex={}",
            direction.prefix(),
            node_id,
            transfer,
            if flags.expedited { "expediated" } else { "segment" },
            multiplexer.index,
            multiplexer.subindex
        )?;

        if flags.expedited {
            let data = expedited_data(frame);

            if transfer == Transfer::Upload && multiplexer == DEVICE_TYPE_OBJECT {
                if let Some(node) = self.nodes.get_mut(node_id) {
                    let device_type = data
                        .iter()
                        .take(4)
                        .rev()
                        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));
                    log::debug!("Node {} device type 0x{:08X}", node_id, device_type);
                    node.device_type = Some(device_type);
                }
            }

            write!(self.out, ",size={},data=", data.len())?;
            return write_hex(self.out, data);
        }

        let size = indicated_size(frame);
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.active_multiplexer = Some(multiplexer);
            let reserve = size.map_or(0, |size| size as usize).min(MAX_PREALLOCATION);
            node.begin_transfer(reserve);
        }

        match size {
            Some(size) => write!(self.out, ",size={}", size),
            None => Ok(()),
        }
    }

    fn segment(
        &mut self,
        transfer: Transfer,
        direction: Direction,
        node_id: u8,
        frame: &CanFrame,
    ) -> fmt::Result {
        let is_end = frame.byte(0) & SEGMENT_END_FLAG != 0;
        let data = frame.payload_from(SDO_SEGMENT_DATA_IDX);

        write!(
            self.out,
            "{}SDO {} {}-segment{} size={},data=",
            direction.prefix(),
            node_id,
            transfer,
            end_suffix(frame),
            data.len()
        )?;

        let Some(node) = self.nodes.get_mut(node_id) else {
            return write_hex(self.out, data);
        };

        node.append_segment(data);

        let format = match node.active_multiplexer {
            Some(multiplexer) if self.dictionary.is_visible_string(multiplexer) => {
                ValueFormat::VisibleString
            }
            _ => ValueFormat::Hex,
        };
        write_value(self.out, data, format)?;

        if is_end {
            write!(self.out, ",final-size={},final-data=", node.accumulator.len())?;
            write_value(self.out, &node.accumulator, format)?;

            if transfer == Transfer::Download {
                node.active_multiplexer = None;
            }
        }

        Ok(())
    }

    fn abort(&mut self, direction: Direction, node_id: u8, frame: &CanFrame) -> fmt::Result {
        let multiplexer = multiplexer(frame);
        write!(
            self.out,
            "{}SDO {} abort index={:x},subindex={},reason=\"{}\"",
            direction.prefix(),
            node_id,
            multiplexer.index,
            multiplexer.subindex,
            sdo_abort_to_string(frame.u32_le(4))
        )
    }

    fn unknown(&mut self, direction: Direction, node_id: u8, specifier: u8) -> fmt::Result {
        log::trace!(
            "{}SDO {}: command specifier {} not decoded",
            direction.prefix(),
            node_id,
            specifier
        );
        write!(
            self.out,
            "{}SDO {} unknown-command-specifier",
            direction.prefix(),
            node_id
        )
    }
}

fn end_suffix(frame: &CanFrame) -> &'static str {
    if frame.byte(0) & SEGMENT_END_FLAG != 0 {
        "-end"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bus {
        nodes: NodeTable,
        dictionary: TypeDictionary,
    }

    impl Bus {
        fn new() -> Self {
            Self {
                nodes: NodeTable::new(),
                dictionary: TypeDictionary::new(),
            }
        }

        fn send(&mut self, cob_id: u32, payload: &[u8]) -> String {
            let direction = if cob_id & 0x780 == 0x600 {
                Direction::Receive
            } else {
                Direction::Transmit
            };
            let node_id = (cob_id & 0x7F) as u8;

            let mut out = String::new();
            SdoEngine::new(&mut self.nodes, &self.dictionary, &mut out)
                .decode(direction, node_id, &CanFrame::new(cob_id, payload))
                .unwrap();
            out
        }
    }

    #[test]
    fn test_expedited_download() {
        let mut bus = Bus::new();
        let line = bus.send(0x605, &[0x23, 0x00, 0x60, 0x01, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            line,
            "RSDO 5 init-download-expediated index=6000,subindex=1,size=4,data=01 02 03 04"
        );
        // Expedited transfers never touch the accumulator
        assert!(bus.nodes.get(5).unwrap().active_multiplexer.is_none());
    }

    #[test]
    fn test_expedited_size_rules() {
        // No size indication: everything after the header
        let frame = CanFrame::new(0x605, &[0x22, 0x00, 0x60, 0x01, 0xAA, 0xBB]);
        assert_eq!(expedited_data(&frame), &[0xAA, 0xBB]);

        // Declared size 2 on a full frame
        let frame = CanFrame::new(0x605, &[0x2B, 0x00, 0x60, 0x01, 0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(expedited_data(&frame), &[0xAA, 0xBB]);

        // Declared size 4 clamped to the two bytes present
        let frame = CanFrame::new(0x605, &[0x23, 0x00, 0x60, 0x01, 0xAA, 0xBB]);
        assert_eq!(expedited_data(&frame), &[0xAA, 0xBB]);

        // Frame shorter than the header
        let frame = CanFrame::new(0x605, &[0x23, 0x00]);
        assert!(expedited_data(&frame).is_empty());
    }

    #[test]
    fn test_indicated_size_needs_full_frame() {
        let frame = CanFrame::new(0x605, &[0x21, 0x00, 0x20, 0x00, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(indicated_size(&frame), Some(16));

        let frame = CanFrame::new(0x605, &[0x21, 0x00, 0x20, 0x00, 0x10]);
        assert_eq!(indicated_size(&frame), None);

        let frame = CanFrame::new(0x605, &[0x20, 0x00, 0x20, 0x00, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(indicated_size(&frame), None);
    }

    #[test]
    fn test_segmented_string_upload() {
        let mut bus = Bus::new();

        assert_eq!(
            bus.send(0x603, &[0x40, 0x08, 0x10, 0x00, 0, 0, 0, 0]),
            "RSDO 3 init-upload-segment index=1008,subindex=0"
        );
        assert_eq!(
            bus.send(0x583, &[0x41, 0x08, 0x10, 0x00, 0x0A, 0x00, 0x00, 0x00]),
            "TSDO 3 init-upload-segment index=1008,subindex=0,size=10"
        );
        assert_eq!(bus.send(0x603, &[0x60]), "RSDO 3 upload-segment");

        let mut segment = vec![0x00];
        segment.extend_from_slice(b"CANopen");
        assert_eq!(
            bus.send(0x583, &segment),
            "TSDO 3 upload-segment size=7,data=\"CANopen\""
        );

        // Final segment pushes the total past the declared 10 bytes
        assert_eq!(
            bus.send(0x583, &[0x11, b' ', b'D', b'e', b'v']),
            "TSDO 3 upload-segment-end size=4,data=\" Dev\",final-size=11,final-data=\"CANopen Dev\""
        );

        // Upload completion keeps the multiplexer
        assert_eq!(
            bus.nodes.get(3).unwrap().active_multiplexer,
            Some(Multiplexer::new(0x1008, 0))
        );
    }

    #[test]
    fn test_segmented_download_clears_multiplexer() {
        let mut bus = Bus::new();

        assert_eq!(
            bus.send(0x605, &[0x21, 0x00, 0x20, 0x05, 0x03, 0x00, 0x00, 0x00]),
            "RSDO 5 init-download-segment index=2000,subindex=5,size=3"
        );
        assert_eq!(bus.send(0x585, &[0x60, 0x00, 0x20, 0x05]), "TSDO 5 init-download-segment");
        assert_eq!(
            bus.send(0x605, &[0x01, 0xAA, 0xBB, 0xCC]),
            "RSDO 5 download-segment-end size=3,data=aa bb cc,final-size=3,final-data=aa bb cc"
        );
        assert_eq!(bus.send(0x585, &[0x21]), "TSDO 5 download-segment-end");
        assert_eq!(bus.send(0x585, &[0x30]), "TSDO 5 download-segment");

        assert!(bus.nodes.get(5).unwrap().active_multiplexer.is_none());
    }

    #[test]
    fn test_segmented_initiate_without_size() {
        let mut bus = Bus::new();
        assert_eq!(
            bus.send(0x605, &[0x20, 0x00, 0x20, 0x05, 0, 0, 0, 0]),
            "RSDO 5 init-download-segment index=2000,subindex=5"
        );
    }

    #[test]
    fn test_initiate_discards_stale_segments() {
        let mut bus = Bus::new();
        bus.send(0x605, &[0x00, 0x01, 0x02]);
        assert_eq!(bus.nodes.get(5).unwrap().accumulator, vec![0x01, 0x02]);

        bus.send(0x605, &[0x21, 0x00, 0x20, 0x05, 0x02, 0x00, 0x00, 0x00]);
        assert!(bus.nodes.get(5).unwrap().accumulator.is_empty());

        assert_eq!(
            bus.send(0x605, &[0x05, 0x07, 0x08]),
            "RSDO 5 download-segment-end size=2,data=07 08,final-size=2,final-data=07 08"
        );
    }

    #[test]
    fn test_device_type_is_cached() {
        let mut bus = Bus::new();
        assert_eq!(
            bus.send(0x587, &[0x43, 0x00, 0x10, 0x00, 0x92, 0x01, 0x02, 0x00]),
            "TSDO 7 init-upload-expediated index=1000,subindex=0,size=4,data=92 01 02 00"
        );

        let node = bus.nodes.get(7).unwrap();
        assert_eq!(node.device_type, Some(0x0002_0192));
        assert_eq!(node.device_profile(), Some(402));

        // A download of the same object is not a device type report
        bus.send(0x608, &[0x23, 0x00, 0x10, 0x00, 0x91, 0x01, 0x00, 0x00]);
        assert_eq!(bus.nodes.get(8).unwrap().device_type, None);
    }

    #[test]
    fn test_abort_leaves_accumulator_alone() {
        let mut bus = Bus::new();
        bus.send(0x605, &[0x21, 0x00, 0x60, 0x01, 0x04, 0x00, 0x00, 0x00]);
        bus.send(0x605, &[0x00, 0x01, 0x02]);

        assert_eq!(
            bus.send(0x585, &[0x80, 0x00, 0x60, 0x01, 0x00, 0x00, 0x02, 0x06]),
            "TSDO 5 abort index=6000,subindex=1,reason=\"Object does not exist in the object dictionary\""
        );
        assert_eq!(bus.nodes.get(5).unwrap().accumulator, vec![0x01, 0x02]);
    }

    #[test]
    fn test_unknown_command_specifier() {
        let mut bus = Bus::new();
        assert_eq!(bus.send(0x585, &[0xC0]), "TSDO 5 unknown-command-specifier");
        assert_eq!(bus.send(0x605, &[0xA0]), "RSDO 5 unknown-command-specifier");
    }

    #[test]
    fn test_empty_frame_is_a_segment() {
        let mut bus = Bus::new();
        assert_eq!(bus.send(0x605, &[]), "RSDO 5 download-segment size=0,data=");
    }
}
