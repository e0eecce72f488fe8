//! Inspect a trace file to see which CANopen services and nodes it contains
//!
//! Usage:
//!   inspect_trace <capture.trc>

use canopen_dump_decoder::{classify, TraceFileParser};
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::path::Path;

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: inspect_trace <capture.trc>");
        std::process::exit(2);
    };

    println!("\n═══════════════════════════════════════");
    println!("Inspecting: {}", path);
    println!("═══════════════════════════════════════");

    let frames = match TraceFileParser::parse(Path::new(&path)) {
        Ok(frames) => frames,
        Err(e) => {
            println!("✗ Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut service_counts: HashMap<String, usize> = HashMap::new();
    let mut nodes = BTreeSet::new();
    let mut unclassified = 0;
    let mut first = None;
    let mut last_us = 0;
    let mut total = 0;

    for frame in frames {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                println!("✗ Read error after {} records: {}", total, e);
                break;
            }
        };

        total += 1;
        first.get_or_insert(frame);
        last_us = frame.timestamp_us;

        match classify(&frame.frame) {
            Ok(message) => {
                *service_counts.entry(message.kind.to_string()).or_insert(0) += 1;
                if message.node_id != 0 {
                    nodes.insert(message.node_id);
                }
            }
            Err(_) => unclassified += 1,
        }
    }

    println!("Service Statistics:");
    println!("─────────────────────────");
    let mut services: Vec<_> = service_counts.iter().collect();
    services.sort_by(|a, b| b.1.cmp(a.1));
    for (service, count) in services {
        println!("  {:10} {:6} frames", service, count);
    }

    println!("\nNodes seen: {:?}", nodes);
    println!("Unclassified frames: {}", unclassified);
    println!("Total frames: {}", total);
    if let Some(first) = first {
        println!("Capture start: {}", first.timestamp().format("%Y-%m-%d %H:%M:%S%.6f UTC"));
        let span_us = last_us.saturating_sub(first.timestamp_us);
        println!("Capture span: {}.{:06} s", span_us / 1_000_000, span_us % 1_000_000);
    }
}
