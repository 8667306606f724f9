//! Concurrent auditing of storage buckets.
//!
//! [`scan`] reads bucket references line by line, probes each bucket with a
//! fixed pool of workers, optionally mirrors what it could list, and hands a
//! [`ProbeResult`] per bucket to a [`ResultSink`].

pub mod error;
pub mod mirror;
pub mod probe;
mod result;
pub mod schedule;
mod sink;

pub use crate::mirror::{MirrorEntry, MirrorOutcome, MirrorStatus};
pub use crate::probe::{AccessGrants, GranteeClass, ProbeOptions};
pub use crate::result::{Existence, GrantProbe, ListProbe, ProbeResult, ProbeStatus, ScanSummary};
pub use crate::schedule::{InputSource, ScanOptions, scan, scan_source};
pub use crate::sink::ResultSink;
