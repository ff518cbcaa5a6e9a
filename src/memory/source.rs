//! Memory Sources
//!
//! Where memory readings come from: the host's `/proc/meminfo`, or a fixed
//! value for embedding and tests.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Host memory utilisation at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryReading {
    pub used_percent: f64,
    pub available_mb: f64,
}

/// Something that can report current memory utilisation.
pub trait MemorySource: Send + Sync {
    fn read(&self) -> io::Result<MemoryReading>;
}

impl<S: MemorySource + ?Sized> MemorySource for Arc<S> {
    fn read(&self) -> io::Result<MemoryReading> {
        (**self).read()
    }
}

// == /proc/meminfo ==
/// Reads `MemTotal` and `MemAvailable` from a meminfo-formatted file.
#[derive(Debug, Clone)]
pub struct ProcMeminfo {
    path: String,
}

impl ProcMeminfo {
    pub fn new() -> Self {
        Self::at("/proc/meminfo")
    }

    pub fn at(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMeminfo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for ProcMeminfo {
    fn read(&self) -> io::Result<MemoryReading> {
        let text = fs::read_to_string(&self.path)?;
        parse_meminfo(&text)
    }
}

/// Parses meminfo text into a reading.
pub fn parse_meminfo(text: &str) -> io::Result<MemoryReading> {
    let mut total_kb = None;
    let mut available_kb = None;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let field = parts.next();
        let value = parts.next().and_then(|v| v.parse::<u64>().ok());
        match field {
            Some("MemTotal:") => total_kb = value,
            Some("MemAvailable:") => available_kb = value,
            _ => {}
        }
    }

    match (total_kb, available_kb) {
        (Some(total), Some(available)) if total > 0 => {
            let used = total.saturating_sub(available);
            Ok(MemoryReading {
                used_percent: used as f64 / total as f64 * 100.0,
                available_mb: available as f64 / 1024.0,
            })
        }
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "meminfo is missing MemTotal or MemAvailable",
        )),
    }
}

// == Fixed Source ==
/// A source reporting whatever percentage was last stored in it.
#[derive(Debug)]
pub struct FixedMemorySource {
    percent_bits: AtomicU64,
    available_mb: f64,
}

impl FixedMemorySource {
    pub fn new(used_percent: f64) -> Self {
        Self {
            percent_bits: AtomicU64::new(used_percent.to_bits()),
            available_mb: 1024.0,
        }
    }

    pub fn set_percent(&self, used_percent: f64) {
        self.percent_bits
            .store(used_percent.to_bits(), Ordering::Relaxed);
    }
}

impl MemorySource for FixedMemorySource {
    fn read(&self) -> io::Result<MemoryReading> {
        Ok(MemoryReading {
            used_percent: f64::from_bits(self.percent_bits.load(Ordering::Relaxed)),
            available_mb: self.available_mb,
        })
    }
}
