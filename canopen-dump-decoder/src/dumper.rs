//! Main dumper API
//!
//! The `Dumper` owns everything that lives for the duration of a capture:
//! the resolved options, the per-node table, the type dictionary, the time
//! of the frame being processed and the line buffer. Frames are processed
//! strictly one at a time: classify, check the filter, decode, render.

use crate::classifier::{classify, CanOpenMessage};
use crate::config::{DumpOptions, UnclassifiedPolicy};
use crate::formats::open_source;
use crate::lookup::TypeDictionary;
use crate::node_state::{NodeState, NodeTable};
use crate::render::{write_timestamp, RTR_MARKER};
use crate::sdo::SdoEngine;
use crate::services;
use crate::types::{CanFrame, DecoderError, Result, ServiceKind, TimestampedFrame};
use std::fmt;
use std::io::Write;

/// Counters collected by [`Dumper::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpStats {
    /// Frames pulled from the source
    pub frames: u64,
    /// Lines written to the output
    pub lines: u64,
    /// Frames dropped by the service filter
    pub filtered: u64,
    /// Frames no CANopen service claims
    pub unclassified: u64,
}

impl fmt::Display for DumpStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} lines, {} filtered, {} unclassified",
            self.frames, self.lines, self.filtered, self.unclassified
        )
    }
}

/// Decode context for one capture
pub struct Dumper {
    options: DumpOptions,
    nodes: NodeTable,
    dictionary: TypeDictionary,
    current_time_us: u64,
    line: String,
}

impl Dumper {
    /// Create a dumper with the built-in type dictionary
    ///
    /// Filter bits are resolved here: no filter bit means every class.
    pub fn new(options: DumpOptions) -> Self {
        Self::with_dictionary(options, TypeDictionary::new())
    }

    pub fn with_dictionary(options: DumpOptions, dictionary: TypeDictionary) -> Self {
        let options = options.resolve();
        log::debug!("Dumper options: {:#x}", options.bits());

        Self {
            options,
            nodes: NodeTable::new(),
            dictionary,
            current_time_us: 0,
            line: String::with_capacity(128),
        }
    }

    pub fn options(&self) -> DumpOptions {
        self.options
    }

    /// Replace the options; in-flight transfers are kept
    pub fn set_options(&mut self, options: DumpOptions) {
        self.options = options.resolve();
    }

    /// Time of the most recently processed frame, in microseconds
    pub fn current_time_us(&self) -> u64 {
        self.current_time_us
    }

    /// Transfer state of a node, if the id is in 1..=127
    pub fn node(&self, node_id: u8) -> Option<&NodeState> {
        self.nodes.get(node_id)
    }

    /// Forget all in-flight transfers and cached device types
    pub fn reset(&mut self) {
        log::debug!("Resetting node state");
        self.nodes.reset();
    }

    /// Process a single frame
    ///
    /// # Returns
    /// * `Ok(Some(line))` - The rendered event line, without newline
    /// * `Ok(None)` - The frame's service class is filtered out
    /// * `Err(UnclassifiableFrame)` - No CANopen service claims the identifier
    pub fn process_frame(&mut self, frame: &TimestampedFrame) -> Result<Option<&str>> {
        self.current_time_us = frame.timestamp_us;

        let message = classify(&frame.frame)?;

        // Filtered frames must not touch node state either
        if !self.options.is_enabled(message.kind) {
            log::trace!("Filtered {} from node {}", message.kind, message.node_id);
            return Ok(None);
        }

        self.line.clear();
        if self.options.include_timestamp() {
            write_timestamp(&mut self.line, self.current_time_us)?;
        }

        self.render(message, &frame.frame)?;

        if frame.frame.is_remote_frame {
            self.line.push_str(RTR_MARKER);
        }

        Ok(Some(self.line.as_str()))
    }

    fn render(&mut self, message: CanOpenMessage, frame: &CanFrame) -> fmt::Result {
        let CanOpenMessage { kind, node_id } = message;
        log::debug!("{} from node {}", kind, node_id);
        let out = &mut self.line;

        match kind {
            ServiceKind::Nmt => services::render_nmt(out, frame),
            ServiceKind::Sync => services::render_sync(out),
            ServiceKind::Time => services::render_time(out),
            ServiceKind::Emcy => services::render_emcy(out, node_id, frame, self.nodes.get(node_id)),
            ServiceKind::Pdo { number, direction } => {
                services::render_pdo(out, number, direction, node_id, frame)
            }
            ServiceKind::Sdo(direction) => {
                SdoEngine::new(&mut self.nodes, &self.dictionary, out).decode(direction, node_id, frame)
            }
            ServiceKind::Heartbeat => services::render_heartbeat(out, node_id, frame),
        }
    }

    /// Pull frames until the source ends, writing one line per event
    ///
    /// Errors from the source and from the output end the run. Frames no
    /// service claims are handled according to `policy`.
    pub fn run<I, W>(&mut self, source: I, out: &mut W, policy: UnclassifiedPolicy) -> Result<DumpStats>
    where
        I: IntoIterator<Item = Result<TimestampedFrame>>,
        W: Write,
    {
        let mut stats = DumpStats::default();

        for frame in source {
            let frame = frame?;
            stats.frames += 1;

            match self.process_frame(&frame) {
                Ok(Some(line)) => {
                    writeln!(out, "{}", line)?;
                    stats.lines += 1;
                }
                Ok(None) => stats.filtered += 1,
                Err(DecoderError::UnclassifiableFrame { can_id }) if policy == UnclassifiedPolicy::Skip => {
                    log::warn!("Skipping unclassifiable frame: CAN ID 0x{:X}", can_id);
                    stats.unclassified += 1;
                }
                Err(e) => return Err(e),
            }
        }

        out.flush()?;
        log::debug!("Source exhausted: {}", stats);
        Ok(stats)
    }
}

/// Open the source selected by `options` and dump it to `out`
///
/// # Example
/// ```no_run
/// use canopen_dump_decoder::{dump, DumpOptions, SourceMode};
///
/// let options = DumpOptions::new()
///     .with_timestamp(true)
///     .with_source_mode(SourceMode::File);
/// let stats = dump("capture.trc", options, &mut std::io::stdout()).unwrap();
/// eprintln!("{}", stats);
/// ```
pub fn dump<W: Write>(address: &str, options: DumpOptions, out: &mut W) -> Result<DumpStats> {
    let source = open_source(options.source_mode(), address)?;
    Dumper::new(options).run(source, out, UnclassifiedPolicy::Skip)
}
