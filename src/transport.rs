//! Transport boundary
//!
//! The engine hands each finished record to a [`Transport`] as a JSON string and
//! never waits for acknowledgement. Establishing the connection, and deciding
//! when it is ready, belongs to the host.

use crate::error::TelemetryError;
use std::io::Write;

/// Fire-and-forget message sink
pub trait Transport {
    fn send(&mut self, payload: &str) -> Result<(), TelemetryError>;
}

/// Writes one JSON record per line
#[derive(Debug)]
pub struct NdjsonTransport<W: Write> {
    writer: W,
    flush_each: bool,
    sent: usize,
}

impl<W: Write> NdjsonTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            flush_each: false,
            sent: 0,
        }
    }

    /// Flush the writer after every record
    pub fn flushing(mut self, flush_each: bool) -> Self {
        self.flush_each = flush_each;
        self
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for NdjsonTransport<W> {
    fn send(&mut self, payload: &str) -> Result<(), TelemetryError> {
        writeln!(self.writer, "{payload}")
            .map_err(|e| TelemetryError::TransportError(e.to_string()))?;
        if self.flush_each {
            self.writer
                .flush()
                .map_err(|e| TelemetryError::TransportError(e.to_string()))?;
        }
        self.sent += 1;
        Ok(())
    }
}

/// Buffers payloads until the host drains them
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    queued: Vec<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> &[String] {
        &self.queued
    }

    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.queued)
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, payload: &str) -> Result<(), TelemetryError> {
        self.queued.push(payload.to_string());
        Ok(())
    }
}
