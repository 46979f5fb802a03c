//! Bounded parallel decoding of dump records.
//!
//! Records are pulled from the source on a coordinator thread and decoded on a rayon
//! pool. Decoded entities reach the consumer through a bounded channel, so a slow
//! consumer throttles the workers. Delivery order is not the dump order.

use crate::cancel::CancelToken;
use crate::config::DECODE_CHANNEL_BOUND;
use crate::error::ReadError;
use crate::models::Entity;
use anyhow::{Context, Result};
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Consumer side of [`decode_parallel`]. Dropping it stops the workers.
pub struct DecodedStream {
    receiver: Option<Receiver<Result<Entity, ReadError>>>,
    coordinator: Option<JoinHandle<()>>,
}

impl Iterator for DecodedStream {
    type Item = Result<Entity, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.receiver.as_ref()?.recv().ok();
        if matches!(item, None | Some(Err(_))) {
            self.shutdown();
        }
        item
    }
}

impl DecodedStream {
    fn shutdown(&mut self) {
        // Disconnect first so workers blocked on a full channel can exit.
        self.receiver.take();
        if let Some(handle) = self.coordinator.take() {
            if handle.join().is_err() {
                debug!("Decode coordinator panicked");
            }
        }
    }
}

impl Drop for DecodedStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decodes `source` records with `decode` on `threads` workers.
///
/// `decode` returns `None` for records that are skipped (non-items, malformed lines).
/// A source error or cancellation ends the stream with that error.
pub fn decode_parallel<S, T, F>(
    source: S,
    threads: usize,
    cancel: CancelToken,
    decode: F,
) -> Result<DecodedStream>
where
    S: Iterator<Item = Result<T, ReadError>> + Send + 'static,
    T: Send + 'static,
    F: Fn(T) -> Option<Entity> + Send + Sync + 'static,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("propsuggest-decode-{}", i))
        .build()
        .context("Failed to build decode worker pool")?;
    let (sender, receiver) = mpsc::sync_channel(DECODE_CHANNEL_BOUND);

    let coordinator = thread::Builder::new()
        .name("propsuggest-reader".to_string())
        .spawn(move || {
            let final_sender = sender.clone();
            let outcome = pool.install(|| {
                source
                    .par_bridge()
                    .try_for_each_with(sender, |sender, record| {
                        forward(sender, record, &decode, &cancel)
                    })
            });

            if cancel.is_cancelled() {
                info!("Decode workers stopped after cancellation");
                let _ = final_sender.send(Err(ReadError::Cancelled));
            } else if let Err(Stop::Failed(e)) = outcome {
                let _ = final_sender.send(Err(e));
            }
        })
        .context("Failed to spawn reader thread")?;

    Ok(DecodedStream {
        receiver: Some(receiver),
        coordinator: Some(coordinator),
    })
}

enum Stop {
    /// The consumer went away or cancellation was requested.
    Halted,
    Failed(ReadError),
}

fn forward<T, F>(
    sender: &mut SyncSender<Result<Entity, ReadError>>,
    record: Result<T, ReadError>,
    decode: &F,
    cancel: &CancelToken,
) -> Result<(), Stop>
where
    F: Fn(T) -> Option<Entity>,
{
    if cancel.is_cancelled() {
        return Err(Stop::Halted);
    }
    let record = record.map_err(Stop::Failed)?;
    match decode(record) {
        Some(entity) => sender.send(Ok(entity)).map_err(|_| Stop::Halted),
        None => Ok(()),
    }
}
