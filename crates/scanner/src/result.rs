//! Per-bucket probe results.
//!
//! A [`ProbeResult`] is created by the worker that probed the bucket, filled
//! in step by step, and handed by value to the [`ResultSink`](crate::ResultSink).
//! Every step has its own status so a degraded step is never mistaken for a
//! negative answer: an ACL we couldn't read
//! ([`GrantProbe::Unavailable`]) is not the same as an ACL with no public
//! grants ([`GrantProbe::Available`] with nothing in it).

use crate::mirror::MirrorOutcome;
use crate::probe::AccessGrants;
use s3scan_storage::{BucketName, ObjectDescriptor};

/// Whether the bucket exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Found { region: String },
    /// The service confirmed there is no such bucket.
    NotFound,
    /// The lookup failed for some other reason; the bucket may or may not exist.
    Unresolved(String),
    /// The reference normalized to an empty name.
    Invalid,
}

/// Outcome of the ACL read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantProbe {
    Available(AccessGrants),
    Unavailable(String),
    Skipped,
}

/// Outcome of a probe step that returns nothing but success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Success,
    Failed(String),
    Skipped,
}

/// Outcome of the list probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListProbe {
    Success(Vec<ObjectDescriptor>),
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Input line as given by the user.
    pub reference: String,
    pub bucket: BucketName,
    pub existence: Existence,
    pub grants: GrantProbe,
    /// Write probe (marker object upload).
    pub write: ProbeStatus,
    /// Removal of the marker object; skipped unless enabled and the write succeeded.
    pub cleanup: ProbeStatus,
    pub list: ListProbe,
    /// Present only if objects were mirrored.
    pub mirror: Option<MirrorOutcome>,
}

impl ProbeResult {
    /// A result with every step skipped; the prober fills in what it runs.
    pub fn skipped(reference: impl Into<String>, bucket: BucketName, existence: Existence) -> Self {
        Self {
            reference: reference.into(),
            bucket,
            existence,
            grants: GrantProbe::Skipped,
            write: ProbeStatus::Skipped,
            cleanup: ProbeStatus::Skipped,
            list: ListProbe::Skipped,
            mirror: None,
        }
    }

    /// Region the bucket lives in, or an empty string if it wasn't found.
    pub fn region(&self) -> &str {
        match &self.existence {
            Existence::Found { region } => region,
            _ => "",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self.existence, Existence::Found { .. })
    }

    /// Objects returned by a successful list probe.
    pub fn objects(&self) -> &[ObjectDescriptor] {
        match &self.list {
            ListProbe::Success(objects) => objects,
            _ => &[],
        }
    }
}

/// Totals over a whole scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Non-blank input lines handled.
    pub processed: usize,
    pub found: usize,
    pub not_found: usize,
    pub unresolved: usize,
    pub invalid: usize,
}
impl ScanSummary {
    pub fn record(&mut self, result: &ProbeResult) {
        self.processed += 1;
        match result.existence {
            Existence::Found { .. } => self.found += 1,
            Existence::NotFound => self.not_found += 1,
            Existence::Unresolved(_) => self.unresolved += 1,
            Existence::Invalid => self.invalid += 1,
        }
    }

    pub fn merge(&mut self, other: ScanSummary) {
        self.processed += other.processed;
        self.found += other.found;
        self.not_found += other.not_found;
        self.unresolved += other.unresolved;
        self.invalid += other.invalid;
    }
}
