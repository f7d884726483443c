use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Ask for an out-of-schedule run.
    ///
    /// Triggers are coalesced: if a run is already pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Thread that runs `tick` on a fixed cadence.
///
/// - Schedule: every `interval`, starting one interval after spawn
/// - Trigger: `handle.trigger()` requests an extra run
/// - Failures are the tick's business; the loop itself never stops on them
#[derive(Debug)]
pub struct PeriodicWorker;

impl PeriodicWorker {
    pub fn spawn<F>(name: &'static str, interval: Duration, tick: F) -> io::Result<WorkerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{name}: interval must be positive"),
            ));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, interval, shutdown_rx, trigger_rx, tick))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<F>(
    name: &'static str,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    mut tick: F,
) where
    F: FnMut(),
{
    info!(worker = name, interval_secs = interval.as_secs(), "worker started");

    let mut next_tick = Instant::now() + interval;
    let mut pending = false;

    loop {
        // Shutdown has priority.
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(50));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;
        tick();
    }

    info!(worker = name, "worker stopped");
}
