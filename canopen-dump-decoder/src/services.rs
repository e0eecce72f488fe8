//! Stateless service decoders
//!
//! NMT, SYNC, TIME, EMCY, PDO and heartbeat frames are rendered from the
//! frame alone. The only outside input is the cached device type used to
//! pick an emergency text table.

use crate::lookup::error_code_to_string;
use crate::node_state::NodeState;
use crate::render::write_hex;
use crate::types::{CanFrame, Direction};
use std::fmt::{self, Write};

/// NMT command specifier (byte 0 of an NMT frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmtCommand {
    Start,
    Stop,
    EnterPreoperational,
    ResetNode,
    ResetCommunication,
    Unknown(u8),
}

impl From<u8> for NmtCommand {
    fn from(value: u8) -> Self {
        match value {
            0x01 => NmtCommand::Start,
            0x02 => NmtCommand::Stop,
            0x80 => NmtCommand::EnterPreoperational,
            0x81 => NmtCommand::ResetNode,
            0x82 => NmtCommand::ResetCommunication,
            other => NmtCommand::Unknown(other),
        }
    }
}

impl fmt::Display for NmtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NmtCommand::Start => "start",
            NmtCommand::Stop => "stop",
            NmtCommand::EnterPreoperational => "enter-preoperational",
            NmtCommand::ResetNode => "reset-node",
            NmtCommand::ResetCommunication => "reset-communication",
            NmtCommand::Unknown(_) => "unknown",
        };
        f.write_str(text)
    }
}

/// Node status reported in a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Bootup,
    Poll,
    Stopped,
    Operational,
    PreOperational,
    Unknown(u8),
}

impl NodeStatus {
    /// Decode the state byte; bit 7 is the node-guarding toggle bit
    pub fn from_byte(value: u8) -> Self {
        match value & 0x7F {
            0 => NodeStatus::Bootup,
            1 => NodeStatus::Poll,
            4 => NodeStatus::Stopped,
            5 => NodeStatus::Operational,
            127 => NodeStatus::PreOperational,
            other => NodeStatus::Unknown(other),
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NodeStatus::Bootup => "bootup",
            NodeStatus::Poll => "poll",
            NodeStatus::Stopped => "stopped",
            NodeStatus::Operational => "operational",
            NodeStatus::PreOperational => "pre-operational",
            NodeStatus::Unknown(_) => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// Decoded emergency frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emergency {
    /// Emergency error code (bytes 0-1)
    pub code: u16,
    /// Error register, object 0x1001 (byte 2)
    pub register: u8,
    /// Manufacturer-specific field (bytes 3-7, little endian)
    pub manufacturer_error: u64,
}

impl Emergency {
    /// `None` for an empty frame
    pub fn decode(frame: &CanFrame) -> Option<Self> {
        if frame.dlc() == 0 {
            return None;
        }

        let manufacturer_error = frame.data[3..]
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));

        Some(Self {
            code: frame.u16_le(0),
            register: frame.byte(2),
            manufacturer_error,
        })
    }
}

pub fn render_nmt(out: &mut String, frame: &CanFrame) -> fmt::Result {
    let command = NmtCommand::from(frame.byte(0));
    match frame.byte(1) {
        0 => write!(out, "NMT ALL {}", command),
        target => write!(out, "NMT {} {}", target, command),
    }
}

pub fn render_sync(out: &mut String) -> fmt::Result {
    out.write_str("SYNC")
}

pub fn render_time(out: &mut String) -> fmt::Result {
    out.write_str("TIMESTAMP")
}

/// Render an emergency; `node` supplies the cached device type, if any
pub fn render_emcy(
    out: &mut String,
    node_id: u8,
    frame: &CanFrame,
    node: Option<&NodeState>,
) -> fmt::Result {
    let Some(emergency) = Emergency::decode(frame) else {
        return write!(out, "EMCY {} EMPTY", node_id);
    };

    let device_profile = node.and_then(NodeState::device_profile);
    write!(
        out,
        "EMCY {} code={:#x},register={:#x},manufacturer-error={:#x},dlc={},text=\"{}\"",
        node_id,
        emergency.code,
        emergency.register,
        emergency.manufacturer_error,
        frame.dlc(),
        error_code_to_string(emergency.code, device_profile)
    )
}

pub fn render_pdo(
    out: &mut String,
    number: u8,
    direction: Direction,
    node_id: u8,
    frame: &CanFrame,
) -> fmt::Result {
    write!(
        out,
        "{}PDO{} {} length={},data=",
        direction.prefix(),
        number,
        node_id,
        frame.dlc()
    )?;
    write_hex(out, frame.payload())
}

pub fn render_heartbeat(out: &mut String, node_id: u8, frame: &CanFrame) -> fmt::Result {
    match NodeStatus::from_byte(frame.byte(0)) {
        status @ (NodeStatus::Bootup | NodeStatus::Poll) => {
            write!(out, "HEARTBEAT {} {}", node_id, status)
        }
        status => write!(out, "HEARTBEAT {} state={}", node_id, status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut String) -> fmt::Result) -> String {
        let mut out = String::new();
        f(&mut out).unwrap();
        out
    }

    #[test]
    fn test_nmt_broadcast_and_targeted() {
        let frame = CanFrame::new(0x000, &[0x01, 0x00]);
        assert_eq!(render(|o| render_nmt(o, &frame)), "NMT ALL start");

        let frame = CanFrame::new(0x000, &[0x81, 0x2A]);
        assert_eq!(render(|o| render_nmt(o, &frame)), "NMT 42 reset-node");

        let frame = CanFrame::new(0x000, &[0x42, 0x01]);
        assert_eq!(render(|o| render_nmt(o, &frame)), "NMT 1 unknown");
    }

    #[test]
    fn test_empty_emcy_renders_marker_only() {
        let frame = CanFrame::new(0x08A, &[]);
        assert_eq!(render(|o| render_emcy(o, 10, &frame, None)), "EMCY 10 EMPTY");
    }

    #[test]
    fn test_emcy_fields_for_unseen_node() {
        let frame = CanFrame::new(0x08A, &[0x00, 0x10, 0x01, 0xAA, 0xBB, 0xCC, 0xCC, 0xCC]);
        let emergency = Emergency::decode(&frame).unwrap();
        assert_eq!(emergency.code, 0x1000);
        assert_eq!(emergency.register, 0x01);
        assert_eq!(emergency.manufacturer_error, 0xCC_CCCC_BBAA);

        assert_eq!(
            render(|o| render_emcy(o, 10, &frame, None)),
            "EMCY 10 code=0x1000,register=0x1,manufacturer-error=0xccccccbbaa,dlc=8,text=\"Generic error\""
        );
    }

    #[test]
    fn test_emcy_short_frame() {
        let frame = CanFrame::new(0x081, &[0x10, 0x82, 0x11]);
        let emergency = Emergency::decode(&frame).unwrap();
        assert_eq!(emergency.code, 0x8210);
        assert_eq!(emergency.register, 0x11);
        assert_eq!(emergency.manufacturer_error, 0);
    }

    #[test]
    fn test_pdo_rendering() {
        let frame = CanFrame::new(0x285, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(
            render(|o| render_pdo(o, 2, Direction::Transmit, 5, &frame)),
            "TPDO2 5 length=4,data=de ad be ef"
        );

        let frame = CanFrame::new(0x505, &[]);
        assert_eq!(
            render(|o| render_pdo(o, 4, Direction::Receive, 5, &frame)),
            "RPDO4 5 length=0,data="
        );
    }

    #[test]
    fn test_heartbeat_states() {
        let cases = [
            (0x00, "HEARTBEAT 3 bootup"),
            (0x01, "HEARTBEAT 3 poll"),
            (0x04, "HEARTBEAT 3 state=stopped"),
            (0x05, "HEARTBEAT 3 state=operational"),
            (0x7F, "HEARTBEAT 3 state=pre-operational"),
            (0x85, "HEARTBEAT 3 state=operational"),
            (0x02, "HEARTBEAT 3 state=UNKNOWN"),
            (0x42, "HEARTBEAT 3 state=UNKNOWN"),
        ];

        for (byte, expected) in cases {
            let frame = CanFrame::new(0x703, &[byte]);
            assert_eq!(render(|o| render_heartbeat(o, 3, &frame)), expected);
        }
    }
}
