//! Diagnostics about which instructions a stream is made of.

use crate::Color;
use itertools::Itertools;
use log::trace;
use std::{cell::RefCell, collections::BTreeMap, fmt::Write, rc::Rc};

/// One datagram, as produced by the encoder or consumed by the decoder.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub datagram: &'a [u8],
    /// The symbolic name of the instruction, e.g. `CHROMA222`.
    pub name: &'a str,
    pub parameters: &'a [i32],
    /// The color the datagram stands for.
    pub color: Color,
}

/// Receives a [`Record`] for every datagram passing through a
/// [`StreamCodec`](crate::StreamCodec).
pub trait Statistics {
    fn record(&mut self, record: &Record<'_>);
}

/// Lets the caller keep a handle to statistics owned by a codec.
impl<S: Statistics + ?Sized> Statistics for Rc<RefCell<S>> {
    fn record(&mut self, record: &Record<'_>) {
        self.borrow_mut().record(record);
    }
}

/// Counts datagrams per instruction name, and optionally traces every single one.
#[derive(Debug, Clone, Default)]
pub struct InstructionCounter {
    counts: BTreeMap<String, u64>,
    trace_datagrams: bool,
}

impl InstructionCounter {
    pub fn new(trace_datagrams: bool) -> Self {
        Self {
            counts: BTreeMap::new(),
            trace_datagrams,
        }
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn merge(&mut self, other: &InstructionCounter) {
        for (name, &count) in &other.counts {
            *self.counts.entry(name.clone()).or_default() += count;
        }
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// One `#NAME: count` line per instruction, sorted by name.
    pub fn summary(&self) -> String {
        let width = self.counts.keys().map(String::len).max().unwrap_or(0);

        self.counts
            .iter()
            .map(|(name, count)| format!("#{name:<width$}: {count}"))
            .join("\n")
    }
}

impl Statistics for InstructionCounter {
    fn record(&mut self, record: &Record<'_>) {
        match self.counts.get_mut(record.name) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(record.name.to_owned(), 1);
            }
        }

        if self.trace_datagrams {
            let mut bytes = String::with_capacity(record.datagram.len() * 3);
            for byte in record.datagram {
                let _ = write!(bytes, "{byte:02x} ");
            }

            trace!(
                "{bytes:<15} {}({}) = {}",
                record.name,
                record.parameters.iter().join(", "),
                record.color
            );
        }
    }
}
