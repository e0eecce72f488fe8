//! Message classification
//!
//! Maps an 11-bit COB-ID to the CANopen service it belongs to and the node
//! it concerns, following the predefined connection set: the function code
//! lives in bits 7-10 and the node id in bits 0-6.

use crate::types::{CanFrame, DecoderError, Direction, Result, ServiceKind};

/// Highest valid node id
pub const MAX_NODE_ID: u8 = 127;

/// Classified frame: service and node id
///
/// `node_id` is 0 for the broadcast services (NMT, SYNC, TIME) and 1..=127
/// for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanOpenMessage {
    pub kind: ServiceKind,
    pub node_id: u8,
}

const fn pdo(number: u8, direction: Direction) -> Option<ServiceKind> {
    Some(ServiceKind::Pdo { number, direction })
}

/// Service per function code. Function code 1 is SYNC for node id 0 and
/// EMCY otherwise; 0xD and 0xF carry no predefined service.
const FUNCTION_CODES: [Option<ServiceKind>; 16] = [
    Some(ServiceKind::Nmt),
    Some(ServiceKind::Emcy),
    Some(ServiceKind::Time),
    pdo(1, Direction::Transmit),
    pdo(1, Direction::Receive),
    pdo(2, Direction::Transmit),
    pdo(2, Direction::Receive),
    pdo(3, Direction::Transmit),
    pdo(3, Direction::Receive),
    pdo(4, Direction::Transmit),
    pdo(4, Direction::Receive),
    Some(ServiceKind::Sdo(Direction::Transmit)),
    Some(ServiceKind::Sdo(Direction::Receive)),
    None,
    Some(ServiceKind::Heartbeat),
    None,
];

/// Classify a raw 11-bit identifier
///
/// Returns `None` for identifiers outside every predefined range.
pub fn classify_id(cob_id: u16) -> Option<CanOpenMessage> {
    if cob_id > 0x7FF {
        return None;
    }

    let function_code = usize::from(cob_id >> 7);
    let node_id = (cob_id & 0x7F) as u8;

    let kind = match (FUNCTION_CODES[function_code]?, node_id) {
        (ServiceKind::Emcy, 0) => ServiceKind::Sync,
        (kind @ (ServiceKind::Nmt | ServiceKind::Time), 0) => kind,
        (ServiceKind::Nmt | ServiceKind::Time, _) => return None,
        (_, 0) => return None,
        (kind, _) => kind,
    };

    Some(CanOpenMessage { kind, node_id })
}

/// Classify a frame
///
/// Extended and error frames are never CANopen traffic. Anything the table
/// does not cover is reported as `DecoderError::UnclassifiableFrame` so the
/// caller can decide to skip it or stop.
pub fn classify(frame: &CanFrame) -> Result<CanOpenMessage> {
    let unclassifiable = || DecoderError::UnclassifiableFrame {
        can_id: frame.can_id,
    };

    if frame.is_extended || frame.is_error_frame {
        return Err(unclassifiable());
    }

    let cob_id = u16::try_from(frame.can_id).map_err(|_| unclassifiable())?;
    classify_id(cob_id).ok_or_else(unclassifiable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(cob_id: u16) -> Option<(ServiceKind, u8)> {
        classify_id(cob_id).map(|m| (m.kind, m.node_id))
    }

    #[test]
    fn test_broadcast_services() {
        assert_eq!(kind_of(0x000), Some((ServiceKind::Nmt, 0)));
        assert_eq!(kind_of(0x080), Some((ServiceKind::Sync, 0)));
        assert_eq!(kind_of(0x100), Some((ServiceKind::Time, 0)));
    }

    #[test]
    fn test_every_node_in_every_range() {
        let ranges = [
            (0x080, ServiceKind::Emcy),
            (0x180, ServiceKind::Pdo { number: 1, direction: Direction::Transmit }),
            (0x200, ServiceKind::Pdo { number: 1, direction: Direction::Receive }),
            (0x280, ServiceKind::Pdo { number: 2, direction: Direction::Transmit }),
            (0x300, ServiceKind::Pdo { number: 2, direction: Direction::Receive }),
            (0x380, ServiceKind::Pdo { number: 3, direction: Direction::Transmit }),
            (0x400, ServiceKind::Pdo { number: 3, direction: Direction::Receive }),
            (0x480, ServiceKind::Pdo { number: 4, direction: Direction::Transmit }),
            (0x500, ServiceKind::Pdo { number: 4, direction: Direction::Receive }),
            (0x580, ServiceKind::Sdo(Direction::Transmit)),
            (0x600, ServiceKind::Sdo(Direction::Receive)),
            (0x700, ServiceKind::Heartbeat),
        ];

        for (base, kind) in ranges {
            for node_id in 1..=MAX_NODE_ID {
                let cob_id = base + u16::from(node_id);
                assert_eq!(
                    kind_of(cob_id),
                    Some((kind, node_id)),
                    "COB-ID 0x{:03X}",
                    cob_id
                );
            }
        }
    }

    #[test]
    fn test_node_zero_only_for_broadcast() {
        for base in [0x180, 0x200, 0x300, 0x480, 0x500, 0x580, 0x600, 0x700] {
            assert_eq!(kind_of(base), None, "COB-ID 0x{:03X}", base);
        }
    }

    #[test]
    fn test_unassigned_ranges() {
        // NMT and TIME carry no node id
        assert_eq!(kind_of(0x001), None);
        assert_eq!(kind_of(0x07F), None);
        assert_eq!(kind_of(0x105), None);
        // Function codes 0xD and 0xF
        assert_eq!(kind_of(0x685), None);
        assert_eq!(kind_of(0x7E5), None);
        assert_eq!(kind_of(0x800), None);
    }

    #[test]
    fn test_classify_frame_rejects_extended() {
        let mut frame = CanFrame::new(0x185, &[0; 8]);
        assert!(classify(&frame).is_ok());

        frame.is_extended = true;
        match classify(&frame) {
            Err(DecoderError::UnclassifiableFrame { can_id }) => assert_eq!(can_id, 0x185),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_classify_frame_reports_raw_id() {
        let frame = CanFrame::new(0x6A1, &[]);
        match classify(&frame) {
            Err(DecoderError::UnclassifiableFrame { can_id }) => assert_eq!(can_id, 0x6A1),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
