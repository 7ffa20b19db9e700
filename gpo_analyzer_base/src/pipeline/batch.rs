//! Batch processing of the GPOs of one domain
//!
//! GPOs are split into chunks and each chunk is spread over a bounded set of
//! scoped worker threads. Results come back in input order whatever order the
//! workers finish in.

use crate::api::AnalyzerConfig;
use gpo_decoders::config::compile_time::batch_processing::{MAX_GPOS_PER_BATCH, MAX_WORKER_THREADS};
use gpo_decoders::logging::codes;
use gpo_decoders::{log_debug, log_info, log_success};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Batch processing configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_threads: usize,
    /// Upper bound on items per batch
    pub max_items: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(4)
                .min(MAX_WORKER_THREADS),
            max_items: MAX_GPOS_PER_BATCH,
        }
    }
}

impl BatchConfig {
    pub fn from_analyzer(config: &AnalyzerConfig) -> Self {
        Self {
            max_threads: config.max_threads.clamp(1, MAX_WORKER_THREADS),
            ..Self::default()
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.clamp(1, MAX_WORKER_THREADS);
        self
    }
}

/// Batch processing results, in input order
#[derive(Debug)]
pub struct BatchResults<R> {
    pub items: Vec<R>,
    pub processing_duration: Duration,
    pub threads_used: usize,
}

impl<R> BatchResults<R> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Batch processing completed: {} GPOs processed on {} threads, {:.2}s total",
            self.items.len(),
            self.threads_used,
            self.processing_duration.as_secs_f64()
        )
    }
}

/// Batch processing errors
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Too many GPOs in one batch: {count} (max: {max})")]
    TooManyGpos { count: usize, max: usize },

    #[error("Thread pool error: {message}")]
    ThreadError { message: String },
}

/// Calculate optimal chunk size for parallel processing
fn calculate_chunk_size(items: usize, max_threads: usize) -> usize {
    const MIN_CHUNK_SIZE: usize = 1;
    const MAX_CHUNK_SIZE: usize = 64;

    items
        .div_ceil(max_threads.max(1))
        .max(MIN_CHUNK_SIZE)
        .min(MAX_CHUNK_SIZE)
        * max_threads.max(1)
}

fn process_chunk_parallel<T, R, F>(
    chunk: &[T],
    offset: usize,
    max_threads: usize,
    work: &F,
) -> Result<Vec<(usize, R)>, BatchError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let results = Mutex::new(Vec::with_capacity(chunk.len()));
    let per_thread = chunk.len().div_ceil(max_threads.max(1)).max(1);

    thread::scope(|scope| {
        let handles: Vec<_> = chunk
            .chunks(per_thread)
            .enumerate()
            .map(|(thread_id, slice)| {
                let results = &results;
                scope.spawn(move || {
                    for (local, item) in slice.iter().enumerate() {
                        let index = offset + thread_id * per_thread + local;
                        let output = work(index, item);
                        results
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .push((index, output));
                    }
                })
            })
            .collect();

        let mut outcome: Result<(), BatchError> = Ok(());
        for handle in handles {
            if handle.join().is_err() {
                outcome = Err(BatchError::ThreadError {
                    message: "Thread panicked during processing".to_string(),
                });
            }
        }
        outcome
    })?;

    Ok(results.into_inner().unwrap_or_else(|p| p.into_inner()))
}

/// Run `work` over every item; `work` receives the item's index
pub fn process_batch<T, R, F>(
    items: &[T],
    config: &BatchConfig,
    work: F,
) -> Result<BatchResults<R>, BatchError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let start_time = Instant::now();

    if items.len() > config.max_items {
        return Err(BatchError::TooManyGpos {
            count: items.len(),
            max: config.max_items,
        });
    }

    let threads = config.max_threads.clamp(1, MAX_WORKER_THREADS).min(items.len().max(1));
    log_info!("Starting batch processing", "items" => items.len(), "max_threads" => threads);

    let mut indexed: Vec<(usize, R)> = Vec::with_capacity(items.len());
    if threads == 1 {
        indexed.extend(items.iter().enumerate().map(|(i, item)| (i, work(i, item))));
    } else {
        let chunk_size = calculate_chunk_size(items.len(), threads);
        log_debug!("Parallel processing configuration",
            "total_items" => items.len(),
            "chunk_size" => chunk_size,
            "threads" => threads
        );
        for (chunk_id, chunk) in items.chunks(chunk_size).enumerate() {
            indexed.extend(process_chunk_parallel(chunk, chunk_id * chunk_size, threads, &work)?);
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    let results = BatchResults {
        items: indexed.into_iter().map(|(_, r)| r).collect(),
        processing_duration: start_time.elapsed(),
        threads_used: threads,
    };

    log_success!(
        codes::success::BATCH_COMPLETED,
        "Batch processing completed",
        "items" => results.len(),
        "threads_used" => threads,
        "duration_ms" => format!("{:.2}", results.processing_duration.as_secs_f64() * 1000.0)
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<u64> = (0..37).collect();
        let config = BatchConfig::default().with_max_threads(4);
        let results = process_batch(&items, &config, |index, item| {
            std::thread::sleep(Duration::from_millis((37 - *item) % 5));
            (index, item * 2)
        })
        .unwrap();

        assert_eq!(results.len(), 37);
        for (position, (index, doubled)) in results.items.iter().enumerate() {
            assert_eq!(*index, position);
            assert_eq!(*doubled, position as u64 * 2);
        }
    }

    #[test]
    fn test_single_thread_and_empty_input() {
        let config = BatchConfig::default().with_max_threads(1);
        let results = process_batch(&["a", "b"], &config, |_, s| s.to_uppercase()).unwrap();
        assert_eq!(results.items, vec!["A", "B"]);

        let empty: [u8; 0] = [];
        assert!(process_batch(&empty, &config, |_, b| *b).unwrap().is_empty());
    }

    #[test]
    fn test_batch_limit() {
        let config = BatchConfig {
            max_threads: 2,
            max_items: 3,
        };
        let result = process_batch(&[1, 2, 3, 4], &config, |_, n| *n);
        assert_matches!(result, Err(BatchError::TooManyGpos { count: 4, max: 3 }));
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let config = BatchConfig::default().with_max_threads(2);
        let result = process_batch(&[1, 2, 3, 4], &config, |_, n| {
            if *n == 3 {
                panic!("boom");
            }
            *n
        });
        assert_matches!(result, Err(BatchError::ThreadError { .. }));
    }
}
