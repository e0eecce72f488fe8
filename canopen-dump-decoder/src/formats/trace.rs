//! Trace file replay and recording
//!
//! A trace file is a plain sequence of 24-byte records (`u64` microsecond
//! timestamp followed by a frame record). There is no header, so a capture
//! can be cut or concatenated with ordinary file tools. A partial record at
//! the end of the file, as left by an interrupted capture, ends the replay.

use super::record::{read_trace_record, write_trace_record};
use crate::types::{DecoderError, Result, TimestampedFrame};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Trace file parser
pub struct TraceFileParser;

impl TraceFileParser {
    /// Open a trace file and return an iterator over its frames
    pub fn parse(path: &Path) -> Result<TraceFrameIterator<BufReader<File>>> {
        log::info!("Replaying trace file: {:?}", path);

        let file = File::open(path).map_err(|source| DecoderError::SourceOpen {
            kind: "file",
            address: path.display().to_string(),
            source,
        })?;

        Ok(TraceFrameIterator::from_reader(BufReader::new(file)))
    }
}

/// Iterator over the records of a trace stream
pub struct TraceFrameIterator<R: Read> {
    reader: R,
    records: u64,
    finished: bool,
}

impl<R: Read> TraceFrameIterator<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            records: 0,
            finished: false,
        }
    }

    /// Complete records read so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl<R: Read> Iterator for TraceFrameIterator<R> {
    type Item = Result<TimestampedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match read_trace_record(&mut self.reader) {
            Ok(Some(frame)) => {
                self.records += 1;
                Some(Ok(frame))
            }
            Ok(None) => {
                log::debug!("End of trace after {} records", self.records);
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// Writes frames in the trace file format
pub struct TraceWriter<W: Write> {
    writer: W,
    records: u64,
}

impl TraceWriter<BufWriter<File>> {
    /// Create (or truncate) a trace file
    pub fn create(path: &Path) -> Result<Self> {
        log::info!("Recording trace to {:?}", path);
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    pub fn write(&mut self, frame: &TimestampedFrame) -> Result<()> {
        write_trace_record(&mut self.writer, frame)?;
        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Frame source adapter that mirrors every frame into a trace
///
/// Each record is flushed as it is written, so a live capture that is
/// killed leaves at most one partial record behind.
pub struct RecordingSource<I, W: Write> {
    inner: I,
    writer: TraceWriter<W>,
}

impl<I, W> RecordingSource<I, W>
where
    I: Iterator<Item = Result<TimestampedFrame>>,
    W: Write,
{
    pub fn new(inner: I, writer: TraceWriter<W>) -> Self {
        Self { inner, writer }
    }

    pub fn into_writer(self) -> TraceWriter<W> {
        self.writer
    }
}

impl<I, W> Iterator for RecordingSource<I, W>
where
    I: Iterator<Item = Result<TimestampedFrame>>,
    W: Write,
{
    type Item = Result<TimestampedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = match self.inner.next()? {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };

        if let Err(e) = self.writer.write(&frame).and_then(|_| self.writer.flush()) {
            return Some(Err(e));
        }

        Some(Ok(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::record::TRACE_RECORD_SIZE;
    use crate::types::CanFrame;
    use std::io::Cursor;

    fn sample_frames() -> Vec<TimestampedFrame> {
        vec![
            TimestampedFrame::new(10, CanFrame::new(0x000, &[0x01, 0x00])),
            TimestampedFrame::new(20, CanFrame::new(0x080, &[])),
            TimestampedFrame::new(30, CanFrame::remote(0x705, 1)),
        ]
    }

    #[test]
    fn test_trace_file_not_found() {
        let result = TraceFileParser::parse(Path::new("nonexistent.trc"));
        assert!(matches!(result, Err(DecoderError::SourceOpen { kind: "file", .. })));
    }

    #[test]
    fn test_replay_of_written_trace() {
        let mut writer = TraceWriter::new(Vec::new());
        for frame in sample_frames() {
            writer.write(&frame).unwrap();
        }
        assert_eq!(writer.records(), 3);

        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 3 * TRACE_RECORD_SIZE);

        let replayed: Vec<_> = TraceFrameIterator::from_reader(Cursor::new(bytes))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(replayed, sample_frames());
    }

    #[test]
    fn test_truncated_trailing_record() {
        let mut writer = TraceWriter::new(Vec::new());
        for frame in sample_frames() {
            writer.write(&frame).unwrap();
        }
        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 5);

        let mut frames = TraceFrameIterator::from_reader(Cursor::new(bytes));
        assert!(frames.next().unwrap().is_ok());
        assert!(frames.next().unwrap().is_ok());
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
        assert_eq!(frames.records(), 2);
    }

    #[test]
    fn test_recording_source_mirrors_frames() {
        let source = sample_frames().into_iter().map(Ok);
        let mut recording = RecordingSource::new(source, TraceWriter::new(Vec::new()));

        let passed: Vec<_> = recording.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(passed, sample_frames());

        let bytes = recording.into_writer().into_inner();
        let replayed: Vec<_> = TraceFrameIterator::from_reader(bytes.as_slice())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(replayed, sample_frames());
    }
}
