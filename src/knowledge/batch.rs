use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::knowledge::types::Chunk;

/// Per-chunk unit of work run by [`BatchScheduler`]
#[async_trait]
pub trait BatchWorker: Send + Sync {
    type Output: Send;

    async fn process(&self, chunk: &Chunk) -> Result<Self::Output>;

    /// Result substituted when `process` fails or panics
    fn degraded(&self, chunk: &Chunk, error: &anyhow::Error) -> Self::Output;
}

/// Bounded-width fan-out over chunks.
/// Groups of `width` run concurrently, groups run one after another,
/// and results come back in input order.
pub struct BatchScheduler {
    width: usize,
}

impl BatchScheduler {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub async fn run<W: BatchWorker>(&self, chunks: &[Chunk], worker: &W) -> Vec<W::Output> {
        let mut results = Vec::with_capacity(chunks.len());
        let total_groups = chunks.len().div_ceil(self.width);

        for (group_index, group) in chunks.chunks(self.width).enumerate() {
            debug!(
                group = group_index + 1,
                total_groups,
                size = group.len(),
                "Processing chunk group"
            );

            let outcomes = join_all(
                group
                    .iter()
                    .map(|chunk| AssertUnwindSafe(worker.process(chunk)).catch_unwind()),
            )
            .await;

            for (chunk, outcome) in group.iter().zip(outcomes) {
                let output = match outcome {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        warn!(position = chunk.position, error = %e, "Chunk worker failed, using degraded result");
                        worker.degraded(chunk, &e)
                    }
                    Err(_) => {
                        let e = anyhow::anyhow!("worker panicked");
                        warn!(position = chunk.position, "Chunk worker panicked, using degraded result");
                        worker.degraded(chunk, &e)
                    }
                };
                results.push(output);
            }
        }

        results
    }
}
