//! Plain-text console output, one block of lines per bucket.

use async_trait::async_trait;
use s3scan_scanner::{Existence, GrantProbe, ListProbe, MirrorOutcome, ProbeResult, ProbeStatus, ResultSink};
use s3scan_storage::Format;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use time::format_description::well_known::Rfc3339;

pub struct ConsoleReporter<W> {
    out: Mutex<W>,
    list_objects: bool,
    format: Format,
}
impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, list_objects: bool, format: Format) -> Self {
        Self {
            out: Mutex::new(out),
            list_objects,
            format,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn render(&self, result: &ProbeResult) -> String {
        let label = match result.bucket.is_empty() {
            true => result.reference.clone(),
            false => result.bucket.render(self.format),
        };
        let mut block = String::new();
        let mut line = |text: &str| {
            // Writing to a String cannot fail.
            let _ = writeln!(block, " {label} | {text}");
        };

        match &result.existence {
            Existence::Invalid => {
                line("STATUS: Invalid (no bucket name)");
                return block;
            },
            Existence::NotFound => {
                line("STATUS: Not Found");
                return block;
            },
            Existence::Unresolved(reason) => {
                line(&format!("STATUS: Error ({reason})"));
                return block;
            },
            Existence::Found { region } => {
                line("STATUS: Found");
                line(&format!("REGION: {region}"));
            },
        }

        match &result.grants {
            GrantProbe::Available(grants) if grants.is_empty() => line("GET ACL: none"),
            GrantProbe::Available(grants) => {
                let acl: Vec<String> = grants
                    .iter()
                    .map(|(class, permissions)| format!("{class}: {}", permissions.join(", ")))
                    .collect();
                line(&format!("GET ACL: {}", acl.join("; ")));
            },
            GrantProbe::Unavailable(reason) => line(&format!("GET ACL: Failed ({reason})")),
            GrantProbe::Skipped => {},
        }
        if let Some(status) = status(&result.write) {
            line(&format!("PUT OBJECTS: {status}"));
        }
        if let Some(status) = status(&result.cleanup) {
            line(&format!("DELETE MARKER: {status}"));
        }
        match &result.list {
            ListProbe::Success(objects) => {
                line("GET OBJECTS: Success");
                if self.list_objects {
                    for object in objects {
                        let modified = object
                            .last_modified
                            .and_then(|t| t.format(&Rfc3339).ok())
                            .unwrap_or_else(|| "-".to_string());
                        line(&format!("    {} {} {modified}", object.key, object.size));
                    }
                }
            },
            ListProbe::Failed(reason) => line(&format!("GET OBJECTS: Failed ({reason})")),
            ListProbe::Skipped => {},
        }
        if let Some(mirror) = &result.mirror {
            line(&format!("DUMP: {}", dump_summary(mirror)));
        }
        block
    }
}

fn status(status: &ProbeStatus) -> Option<String> {
    match status {
        ProbeStatus::Success => Some("Success".to_string()),
        ProbeStatus::Failed(reason) => Some(format!("Failed ({reason})")),
        ProbeStatus::Skipped => None,
    }
}

fn dump_summary(mirror: &MirrorOutcome) -> String {
    match mirror.failed() {
        0 => format!("{} objects, {} bytes", mirror.downloaded(), mirror.bytes()),
        failed => format!("{} objects, {} bytes, {failed} failed", mirror.downloaded(), mirror.bytes()),
    }
}

#[async_trait]
impl<W: Write + Send> ResultSink for ConsoleReporter<W> {
    async fn emit(&self, result: ProbeResult) {
        let block = self.render(&result);
        // A block is written in one go so concurrent buckets never interleave.
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = out.write_all(block.as_bytes()).and_then(|()| out.flush()) {
            tracing::error!(bucket = %result.bucket, error = %err, "Could not write result");
        }
    }
}
