//! WorkerPool - fixed-size pool with synchronous hand-off
//!
//! Workers publish themselves on a bounded availability queue (capacity C);
//! `submit` pulls one ready worker and hands it exactly one job. There is no
//! task queue, so `submit` blocks while every worker is busy (backpressure).
//!
//! ```text
//! worker: ready -> busy -> ready -> ... -> stopped
//! ```
//!
//! # 停止
//! Shutdown is a `watch` channel. Workers check it only while ready, so a
//! busy worker always finishes its job (and the job's completion callback
//! runs) before it can exit. An exiting worker closes its hand-off channel
//! and runs whatever was handed over before the close, so a successful
//! `submit` always runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::PoolError;

/// Unit of work executed by a pool worker.
#[async_trait]
pub trait Job: Send + Sync {
    /// Short label for logs.
    fn label(&self) -> String;

    async fn run(&self);
}

/// A ready worker's private hand-off channel.
struct ReadyWorker {
    worker_id: usize,
    jobs: mpsc::Sender<Arc<dyn Job>>,
}

pub struct WorkerPool {
    name: String,
    concurrency: usize,
    ready_rx: Mutex<mpsc::Receiver<ReadyWorker>>,
    shutdown_tx: watch::Sender<bool>,
    outstanding: Arc<watch::Sender<usize>>,
    live: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    stopped: AtomicBool,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers on the current tokio runtime.
    pub fn start(name: impl Into<String>, concurrency: usize) -> Result<Self, PoolError> {
        if concurrency == 0 {
            return Err(PoolError::InvalidConcurrency);
        }
        let name = name.into();

        let (ready_tx, ready_rx) = mpsc::channel(concurrency);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outstanding, _) = watch::channel(0usize);
        let outstanding = Arc::new(outstanding);
        let live = Arc::new(AtomicUsize::new(concurrency));
        let running = Arc::new(AtomicUsize::new(0));

        let mut joins = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let worker = Worker {
                worker_id,
                pool: name.clone(),
                ready_tx: ready_tx.clone(),
                shutdown_rx: shutdown_rx.clone(),
                outstanding: Arc::clone(&outstanding),
                live: Arc::clone(&live),
                running: Arc::clone(&running),
            };
            joins.push(tokio::spawn(worker.run()));
        }
        debug!(pool = %name, concurrency, "worker pool started");

        Ok(Self {
            name,
            concurrency,
            ready_rx: Mutex::new(ready_rx),
            shutdown_tx,
            outstanding,
            live,
            running,
            stopped: AtomicBool::new(false),
            joins: Mutex::new(joins),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Workers that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Jobs currently executing.
    pub fn in_flight(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Hand `job` to the next ready worker, waiting for one if all are busy.
    pub async fn submit(&self, job: Arc<dyn Job>) -> Result<(), PoolError> {
        if self.is_stopped() {
            return Err(PoolError::Stopped(self.name.clone()));
        }

        // Submitters queue here; the receiver is only held while waiting for a worker.
        let mut ready_rx = self.ready_rx.lock().await;
        loop {
            if self.is_stopped() {
                return Err(PoolError::Stopped(self.name.clone()));
            }
            let Some(worker) = ready_rx.recv().await else {
                return Err(PoolError::Stopped(self.name.clone()));
            };

            self.outstanding.send_modify(|n| *n += 1);
            let label = job.label();
            match worker.jobs.send(Arc::clone(&job)).await {
                Ok(()) => {
                    trace!(pool = %self.name, worker_id = worker.worker_id, job = %label, "dispatched");
                    return Ok(());
                }
                Err(_) => {
                    // The worker exited between announcing itself and the hand-off.
                    self.outstanding.send_modify(|n| *n -= 1);
                }
            }
        }
    }

    /// Wait until every dispatched job has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.outstanding.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stop the pool.
    ///
    /// - `wait = true`: drain every submitted job, then stop the workers.
    /// - `wait = false`: refuse new submissions and stop workers as they become
    ///   ready; in-flight jobs still run to completion.
    ///
    /// Returns once every worker has exited. Calling it again is a no-op.
    pub async fn stop(&self, wait: bool) {
        if wait {
            self.wait_idle().await;
        }
        self.stopped.store(true, Ordering::SeqCst);
        // ignore send error: workers may already be gone
        let _ = self.shutdown_tx.send(true);

        let joins = std::mem::take(&mut *self.joins.lock().await);
        for join in joins {
            let _ = join.await;
        }
        debug!(pool = %self.name, wait, "worker pool stopped");
    }
}

struct Worker {
    worker_id: usize,
    pool: String,
    ready_tx: mpsc::Sender<ReadyWorker>,
    shutdown_rx: watch::Receiver<bool>,
    outstanding: Arc<watch::Sender<usize>>,
    live: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(mut self) {
        let (jobs_tx, mut jobs_rx) = mpsc::channel::<Arc<dyn Job>>(1);

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let announced = self
                .ready_tx
                .send(ReadyWorker {
                    worker_id: self.worker_id,
                    jobs: jobs_tx.clone(),
                })
                .await;
            if announced.is_err() {
                break;
            }

            let job = tokio::select! {
                // A job handed over before the shutdown signal is still run.
                biased;
                job = jobs_rx.recv() => job,
                _ = self.shutdown_rx.changed() => None,
            };
            let Some(job) = job else {
                break;
            };
            self.execute(job).await;
        }

        // Our last announcement may still sit in the ready queue.
        jobs_rx.close();
        while let Ok(job) = jobs_rx.try_recv() {
            self.execute(job).await;
        }

        self.live.fetch_sub(1, Ordering::SeqCst);
        trace!(pool = %self.pool, worker_id = self.worker_id, "worker exited");
    }

    async fn execute(&self, job: Arc<dyn Job>) {
        self.running.fetch_add(1, Ordering::SeqCst);
        job.run().await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.outstanding.send_modify(|n| *n -= 1);
    }
}
