use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ScanError;

/// Runs independent async units in fixed-size batches.
///
/// Every unit of a batch is spawned in list order, then the whole batch must
/// settle before the next one starts. At most `batch_size` units are ever
/// outstanding, which is what keeps socket and file-descriptor usage bounded.
/// A slow unit holds back the following batch until it completes or times out.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl BatchScheduler {
    /// Create a scheduler; a batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run every unit to completion and return the outputs in input order.
    ///
    /// A unit that panics is logged and contributes no output.
    pub async fn run<I, F, Fut, T>(&self, items: I, op: F) -> Vec<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.drive(items, op, None).await.0
    }

    /// Like [`run`](Self::run), but checks `cancel` before each batch starts.
    ///
    /// A batch that has started always runs to completion; cancellation only
    /// prevents the next one from launching.
    pub async fn run_cancellable<I, F, Fut, T>(
        &self,
        items: I,
        op: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ScanError>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.drive(items, op, Some(cancel)).await {
            (out, true) => Ok(out),
            (_, false) => Err(ScanError::Cancelled),
        }
    }

    async fn drive<I, F, Fut, T>(
        &self,
        items: I,
        mut op: F,
        cancel: Option<&CancellationToken>,
    ) -> (Vec<T>, bool)
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut items = items.into_iter().peekable();
        let mut out = Vec::new();
        let mut batch_no = 0usize;

        while items.peek().is_some() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                debug!(batch_no, "cancelled before batch start");
                return (out, false);
            }

            // Sized by what was taken; batch_size may be far larger than the input.
            let batch: Vec<I::Item> = items.by_ref().take(self.batch_size).collect();
            let mut set = JoinSet::new();
            let mut slots: Vec<Option<T>> = Vec::with_capacity(batch.len());
            for (idx, item) in batch.into_iter().enumerate() {
                let fut = op(item);
                set.spawn(async move { (idx, fut.await) });
                slots.push(None);
            }
            debug!(batch_no, size = slots.len(), "batch started");

            while let Some(res) = set.join_next().await {
                match res {
                    Ok((idx, value)) => slots[idx] = Some(value),
                    Err(e) => warn!(batch_no, "unit failed to complete: {e}"),
                }
            }

            out.extend(slots.into_iter().flatten());
            batch_no += 1;
        }

        (out, true)
    }
}
