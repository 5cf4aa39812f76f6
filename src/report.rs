//! Text report of a run: one or more lines per [`SimEvent`], the periodic
//! memory-map dump and the closing statistics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::memory::MemorySnapshot;
use crate::protocol::SimEvent;
use crate::stats::Summary;

fn access_kind(is_write: bool) -> &'static str {
    if is_write { "write" } else { "read" }
}

/// Render one event as report text, without a trailing newline.
pub fn render_event(event: &SimEvent) -> String {
    match event {
        SimEvent::Admitted { identity, slot, at } => {
            format!("OSS: Generating process with {identity} in slot {slot} at time {at}")
        }
        SimEvent::Requested { identity, address, is_write, at } => format!(
            "OSS: {identity} requesting {} of address {address} at time {at}",
            access_kind(*is_write)
        ),
        SimEvent::Hit { identity, address, frame, is_write, at } => {
            if *is_write {
                format!("OSS: Address {address} in frame {frame}, writing data to frame at time {at} for {identity}")
            } else {
                format!("OSS: Address {address} in frame {frame}, giving data to {identity} at time {at}")
            }
        }
        SimEvent::Fault { identity, address, page, queued, at } => {
            let tail = if *queued { ", waiting on device" } else { "" };
            format!(
                "OSS: Address {address} of {identity} is not in a frame, pagefault on page {page} at time {at}{tail}"
            )
        }
        SimEvent::Evicted { frame, owner, identity, dirty, .. } => {
            let who = identity.map_or_else(|| format!("slot {}", owner.slot), |id| id.to_string());
            let state = if *dirty { "dirty" } else { "clean" };
            format!("OSS: Clearing {state} frame {frame} holding page {} of {who}", owner.page)
        }
        SimEvent::WriteBack { frame, charged_ns, at } => format!(
            "OSS: Dirty bit of frame {frame} set, adding {charged_ns}ns to the clock, now {at}"
        ),
        SimEvent::Loaded { identity, page, frame, at } => {
            format!("OSS: Swapping {identity} page {page} into frame {frame} at time {at}")
        }
        SimEvent::Granted { identity, address, is_write, at } => format!(
            "OSS: Indicating to {identity} that {} has happened to address {address} at time {at}",
            access_kind(*is_write)
        ),
        SimEvent::Reaped { identity, slot, frames_released, dropped_faults, at } => {
            let mut line = format!(
                "OSS: {identity} in slot {slot} terminated at time {at}, released {frames_released} frame(s)"
            );
            if *dropped_faults > 0 {
                line.push_str(&format!(", dropped {dropped_faults} pending fault(s)"));
            }
            line
        }
        SimEvent::MemoryMap(snapshot) => render_memory_map(snapshot),
    }
}

/// Frame table followed by the page table of every admitted process.
pub fn render_memory_map(snapshot: &MemorySnapshot) -> String {
    let mut out = format!("Current memory layout at time {} is:\n", snapshot.at);
    out.push_str("           Occupied  DirtyBit  Slot  Page  LastRef\n");
    for (index, frame) in snapshot.frames.iter().enumerate() {
        let (slot, page) = frame
            .owner
            .map_or(("-".to_string(), "-".to_string()), |owner| {
                (owner.slot.to_string(), owner.page.to_string())
            });
        let last_ref = if frame.occupied {
            frame.last_reference.to_string()
        } else {
            "-".to_string()
        };
        out.push_str(&format!(
            "Frame {index:<4} {:<9} {:<9} {slot:<5} {page:<5} {last_ref}\n",
            if frame.occupied { "Yes" } else { "No" },
            frame.dirty as u8,
        ));
    }
    for row in &snapshot.processes {
        let table: Vec<String> = row
            .page_table
            .iter()
            .map(|entry| entry.map_or("-".to_string(), |frame| frame.to_string()))
            .collect();
        out.push_str(&format!(
            "P{} ({}, started {}): [ {} ]\n",
            row.slot,
            row.identity,
            row.admitted_at,
            table.join(" ")
        ));
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "===== Final statistics =====\n\
         Simulated time elapsed: {}\n\
         Total memory accesses: {}\n\
         Total page faults: {}\n\
         Memory accesses per second: {:.2}\n\
         Page faults per memory access: {:.4}",
        summary.elapsed,
        summary.total_accesses,
        summary.total_page_faults,
        summary.access_rate,
        summary.fault_rate,
    )
}

/// Writes the report to a sink, optionally echoing it to stdout.
pub struct Reporter<W: Write> {
    out: W,
    echo: bool,
    lines: usize,
}

impl Reporter<BufWriter<File>> {
    /// Create (or truncate) the log file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, echo: bool) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Reporter::new(BufWriter::new(file), echo))
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, echo: bool) -> Self {
        Reporter { out, echo, lines: 0 }
    }

    pub fn record(&mut self, event: &SimEvent) -> Result<()> {
        self.write_text(&render_event(event))
    }

    pub fn summary(&mut self, summary: &Summary) -> Result<()> {
        self.write_text(&render_summary(summary))
    }

    /// Lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        if self.echo {
            println!("{text}");
        }
        self.lines += text.lines().count();
        Ok(())
    }
}
