//! Bounded producer/consumer scan pipeline.
//!
//! One producer task reads references into a channel that holds at most
//! `concurrency` entries, so a huge input never sits in memory. A fixed pool
//! of `concurrency` workers drains it; each worker owns its own probe client
//! and shares nothing with the others except the receiving end of the queue.

mod input;

pub use self::input::{InputReader, InputSource, references};
use crate::error::{Error, ErrorKind, Result};
use crate::mirror::mirror;
use crate::probe::{ProbeOptions, probe};
use crate::result::{Existence, ProbeResult, ScanSummary};
use crate::sink::ResultSink;
use exn::ResultExt;
use futures::StreamExt;
use s3scan_storage::{BucketName, ClientFactory, ClientHandle, LocalTree, ProbeClient};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of workers, and capacity of the reference queue.
    pub concurrency: NonZeroUsize,
    pub probe: ProbeOptions,
    /// Mirror every listable bucket under this tree.
    pub dump: Option<LocalTree>,
}
impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            probe: ProbeOptions::default(),
            dump: None,
        }
    }
}

type Queue = Arc<Mutex<Receiver<String>>>;

/// Probe every bucket referenced in `input`, handing each result to `sink`.
///
/// Returns once every reference has been probed and emitted. The only
/// errors are failing to build the probe clients up front and failing to
/// read `input`; in the latter case in-flight work is abandoned.
pub async fn scan<R, S>(input: R, factory: &dyn ClientFactory, sink: S, options: ScanOptions) -> Result<ScanSummary>
where
    R: AsyncBufRead + Send + Unpin + 'static,
    S: ResultSink + 'static,
{
    let clients = (0..options.concurrency.get())
        .map(|_| factory.create())
        .collect::<s3scan_storage::error::Result<Vec<_>>>()
        .or_raise(|| ErrorKind::Client)?;

    let (sender, receiver) = mpsc::channel(options.concurrency.get());
    let queue: Queue = Arc::new(Mutex::new(receiver));
    let sink = Arc::new(sink);
    let options = Arc::new(options);

    let mut workers = JoinSet::new();
    for (id, client) in clients.into_iter().enumerate() {
        workers.spawn(work(id, client, queue.clone(), sink.clone(), options.clone()));
    }
    // Workers hold the only receivers; once they're gone the producer stops.
    drop(queue);

    let produced = tokio::spawn(produce(input, sender)).await;
    let queued = match produced {
        Ok(Ok(queued)) => queued,
        Ok(Err(err)) => {
            workers.abort_all();
            tracing::error!(error = %(*err).to_string(), "Aborting scan");
            return Err(err);
        },
        Err(join) => {
            workers.abort_all();
            exn::bail!(ErrorKind::Input(join.to_string()));
        },
    };
    tracing::debug!(queued, "Input exhausted, waiting for workers");

    let mut summary = ScanSummary::default();
    while let Some(joined) = workers.join_next().await {
        let worker = joined.map_err(|join| Error::from(ErrorKind::Worker(join.to_string())))?;
        summary.merge(worker);
    }
    tracing::info!(
        processed = summary.processed,
        found = summary.found,
        not_found = summary.not_found,
        unresolved = summary.unresolved,
        "Scan complete"
    );
    Ok(summary)
}

/// Open `source` and [`scan`] it.
pub async fn scan_source<S>(
    source: &InputSource,
    factory: &dyn ClientFactory,
    sink: S,
    options: ScanOptions,
) -> Result<ScanSummary>
where
    S: ResultSink + 'static,
{
    let input = source.open().await?;
    scan(input, factory, sink, options).await
}

async fn produce<R>(input: R, sender: Sender<String>) -> Result<usize>
where
    R: AsyncBufRead + Send + Unpin,
{
    let mut queued = 0;
    let mut lines = std::pin::pin!(references(input));
    while let Some(reference) = lines.next().await {
        // Blocks while the queue is full.
        if sender.send(reference?).await.is_err() {
            tracing::warn!("All scan workers exited early");
            break;
        }
        queued += 1;
    }
    Ok(queued)
}

async fn work<S>(id: usize, mut client: ClientHandle, queue: Queue, sink: Arc<S>, options: Arc<ScanOptions>) -> ScanSummary
where
    S: ResultSink,
{
    let mut summary = ScanSummary::default();
    loop {
        // The lock is released as soon as a reference (or the end of the
        // queue) has been received.
        let Some(reference) = queue.lock().await.recv().await else {
            break;
        };
        tracing::trace!(worker = id, reference = %reference, "Dequeued");
        let result = process(client.as_mut(), reference, &options).await;
        summary.record(&result);
        sink.emit(result).await;
    }
    tracing::trace!(worker = id, processed = summary.processed, "Worker finished");
    summary
}

async fn process(client: &mut dyn ProbeClient, reference: String, options: &ScanOptions) -> ProbeResult {
    let bucket = BucketName::normalize(&reference);
    let mut result = probe(client, reference, bucket, &options.probe).await;
    if let Some(tree) = &options.dump
        && let Existence::Found { region } = &result.existence
        && !result.objects().is_empty()
    {
        let outcome = mirror(client, &result.bucket, region, result.objects(), tree).await;
        result.mirror = Some(outcome);
    }
    result
}
