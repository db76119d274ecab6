//! Bounded loader worker pool

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::AssetError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads fed by a bounded job queue
///
/// Submitting never blocks: a full queue is reported as
/// [`AssetError::PoolSaturated`].
pub struct LoaderPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    shutting_down: Arc<AtomicBool>,
}

impl LoaderPool {
    /// Spawn `workers` threads sharing a queue of `queue_capacity` jobs
    pub fn new(workers: usize, queue_capacity: usize) -> std::io::Result<Self> {
        let (sender, receiver) = channel::bounded::<Job>(queue_capacity.max(1));
        let shutting_down = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let receiver: Receiver<Job> = receiver.clone();
            let shutting_down = Arc::clone(&shutting_down);
            let handle = thread::Builder::new()
                .name(format!("asset-loader-{index}"))
                .spawn(move || {
                    // Runs until every sender is gone
                    for job in receiver.iter() {
                        if shutting_down.load(Ordering::Acquire) {
                            continue;
                        }
                        job();
                    }
                })?;
            handles.push(handle);
        }

        log::info!("Asset loader pool started ({} workers, queue {})", handles.len(), queue_capacity);
        Ok(Self {
            sender: Some(sender),
            workers: handles,
            shutting_down,
        })
    }

    /// Queue a job without blocking
    pub fn try_submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), AssetError> {
        let sender = self.sender.as_ref().ok_or(AssetError::ShutDown)?;
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(AssetError::PoolSaturated),
            Err(TrySendError::Disconnected(_)) => Err(AssetError::ShutDown),
        }
    }

    /// Jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Discard queued jobs, let running jobs finish and join the workers
    pub fn shutdown(&mut self) {
        if self.sender.is_none() {
            return;
        }
        self.shutting_down.store(true, Ordering::Release);
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Asset loader thread panicked");
            }
        }
        log::info!("Asset loader pool stopped");
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_on_workers() {
        let pool = LoaderPool::new(2, 8).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            pool.try_submit(move || tx.send(i).unwrap()).unwrap();
        }
        let mut seen: Vec<i32> = (0..4).map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_full_queue_reports_saturation() {
        let mut pool = LoaderPool::new(1, 1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        pool.try_submit(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert_eq!(pool.queued(), 0);
        pool.try_submit(|| {}).unwrap();
        assert_eq!(pool.queued(), 1);
        assert!(matches!(pool.try_submit(|| {}), Err(AssetError::PoolSaturated)));

        release_tx.send(()).unwrap();
        pool.shutdown();
        assert_eq!(pool.queued(), 0);
        assert!(matches!(pool.try_submit(|| {}), Err(AssetError::ShutDown)));
    }

    #[test]
    fn test_shutdown_discards_queued_jobs() {
        let mut pool = LoaderPool::new(1, 4).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel::<()>();

        pool.try_submit(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
        })
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            pool.try_submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
