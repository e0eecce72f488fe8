//! Binary frame records
//!
//! Frames travel as the Linux `struct can_frame` layout, little endian:
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | identifier word (EFF/RTR/ERR flag bits) |
//! | 4      | 1    | data length                             |
//! | 5      | 3    | padding                                 |
//! | 8      | 8    | payload                                 |
//!
//! Trace files prefix each frame with a `u64` timestamp in microseconds.

use crate::types::{CanFrame, TimestampedFrame, CAN_MAX_DLC};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, ErrorKind, Read, Write};

/// Size of one frame record
pub const FRAME_RECORD_SIZE: usize = 16;
/// Size of one trace record (timestamp + frame record)
pub const TRACE_RECORD_SIZE: usize = 8 + FRAME_RECORD_SIZE;

/// Fill `buf` completely
///
/// Returns `Ok(false)` when the stream ends first, whether cleanly or in the
/// middle of the record.
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    if filled == buf.len() {
        return Ok(true);
    }
    if filled > 0 {
        log::warn!(
            "Ignoring truncated trailing record ({} of {} bytes)",
            filled,
            buf.len()
        );
    }
    Ok(false)
}

/// Decode a frame record
pub fn decode_frame(mut record: &[u8]) -> io::Result<CanFrame> {
    let raw_id = record.read_u32::<LittleEndian>()?;
    let len = record.read_u8()?;

    let mut padding = [0u8; 3];
    record.read_exact(&mut padding)?;

    let mut data = [0u8; CAN_MAX_DLC];
    record.read_exact(&mut data)?;

    if usize::from(len) > CAN_MAX_DLC {
        log::debug!("Clamping frame length {} to {}", len, CAN_MAX_DLC);
    }

    Ok(CanFrame::from_raw(raw_id, len, data))
}

/// Read one frame record; `None` at end of stream
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<CanFrame>> {
    let mut buf = [0u8; FRAME_RECORD_SIZE];
    if !read_record(reader, &mut buf)? {
        return Ok(None);
    }
    decode_frame(&buf).map(Some)
}

/// Read one trace record; `None` at end of stream
pub fn read_trace_record<R: Read>(reader: &mut R) -> io::Result<Option<TimestampedFrame>> {
    let mut buf = [0u8; TRACE_RECORD_SIZE];
    if !read_record(reader, &mut buf)? {
        return Ok(None);
    }

    let mut cursor = &buf[..];
    let timestamp_us = cursor.read_u64::<LittleEndian>()?;
    let frame = decode_frame(cursor)?;
    Ok(Some(TimestampedFrame::new(timestamp_us, frame)))
}

pub fn write_frame<W: Write>(writer: &mut W, frame: &CanFrame) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(frame.raw_id())?;
    writer.write_u8(frame.len)?;
    writer.write_all(&[0u8; 3])?;
    writer.write_all(&frame.data)
}

pub fn write_trace_record<W: Write>(writer: &mut W, frame: &TimestampedFrame) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(frame.timestamp_us)?;
    write_frame(writer, &frame.frame)
}
