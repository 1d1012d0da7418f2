use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::engine::{RefreshStats, RowScanEngine, StatusCallback};
use crate::error::Error;
use crate::framebuffer::Framebuffer;
use crate::shift::ColumnShift;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Runs the scan engine on its own thread until stopped.
///
/// The refresh thread holds the engine lock for as long as it runs; the
/// owner only takes it while stopped, to blank the panel or scan by hand.
pub struct RefreshScheduler<P: OutputPin, S: ColumnShift> {
    framebuffer: Arc<Framebuffer>,
    engine: Arc<Mutex<RowScanEngine<P, S>>>,
    stats: Arc<RefreshStats>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<P, S> RefreshScheduler<P, S>
where
    P: OutputPin,
    S: ColumnShift,
{
    pub fn new(framebuffer: Arc<Framebuffer>, engine: RowScanEngine<P, S>) -> Self {
        RefreshScheduler {
            framebuffer,
            engine: Arc::new(Mutex::new(engine)),
            stats: Arc::new(RefreshStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// A refresh thread that died on its own counts as stopped.
    pub fn state(&self) -> SchedulerState {
        match &self.worker {
            Some(worker) if !worker.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn stats(&self) -> Arc<RefreshStats> {
        Arc::clone(&self.stats)
    }

    // a panicked refresh thread leaves the lock poisoned; the pins are still usable
    fn lock_engine(&self) -> MutexGuard<'_, RowScanEngine<P, S>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scans one frame on the calling thread. Does nothing and returns
    /// `false` while the refresh thread is running.
    pub fn refresh_once(&mut self) -> bool {
        if self.is_running() {
            debug!("refresh_once ignored, refresh thread is running");
            return false;
        }
        self.reap_worker();
        let mut engine = self.lock_engine();
        engine.refresh_frame(&self.framebuffer, &self.stats);
        true
    }

    /// Installs or removes the fault callback. Refused while running, since
    /// the refresh thread owns the engine until it exits.
    pub fn set_status_callback(&mut self, callback: Option<StatusCallback>) -> bool {
        if self.is_running() {
            debug!("status callback not changed, refresh thread is running");
            return false;
        }
        self.reap_worker();
        self.lock_engine().set_status_callback(callback);
        true
    }

    // joins a refresh thread that exited without stop(), e.g. after a panic
    fn reap_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("refresh thread panicked");
            }
            self.running.store(false, Ordering::Release);
        }
    }

    /// Signals the refresh thread to finish its current row, waits for it to
    /// exit and leaves the panel blanked. No-op when not running.
    pub fn stop(&mut self) {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => {
                debug!("stop ignored, refresh is not running");
                return;
            }
        };

        self.running.store(false, Ordering::Release);
        if worker.join().is_err() {
            error!("refresh thread panicked");
        }

        if let Err(err) = self.lock_engine().blank() {
            warn!("could not blank panel after stopping refresh: {}", err);
        }
        info!("display refresh stopped after {} frames", self.stats.frames());
    }
}

impl<P, S> RefreshScheduler<P, S>
where
    P: OutputPin + Send + 'static,
    S: ColumnShift + Send + 'static,
{
    /// Spawns the refresh thread and returns immediately. No-op when already
    /// running.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.is_running() {
            debug!("start ignored, refresh is already running");
            return Ok(());
        }
        self.reap_worker();

        self.running.store(true, Ordering::Release);
        self.framebuffer.attach_scanner(true);

        let framebuffer = Arc::clone(&self.framebuffer);
        let engine = Arc::clone(&self.engine);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("hub75-refresh".to_string())
            .spawn(move || {
                let _detach = DetachOnExit(Arc::clone(&framebuffer));
                let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
                debug!("refresh thread started, dwell {}us", engine.dwell().as_micros());
                while running.load(Ordering::Acquire) {
                    engine.scan_frame(&framebuffer, &stats, &running);
                }
                debug!("refresh thread exiting");
            });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                info!("display refresh started");
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                self.framebuffer.attach_scanner(false);
                Err(Error::Spawn(err))
            }
        }
    }
}

/// Lets `present()` stop waiting for a refresh thread that is gone, however
/// it exited.
struct DetachOnExit(Arc<Framebuffer>);

impl Drop for DetachOnExit {
    fn drop(&mut self) {
        self.0.attach_scanner(false);
    }
}

impl<P: OutputPin, S: ColumnShift> Drop for RefreshScheduler<P, S> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("refresh scheduler dropped while running");
            self.stop();
        }
    }
}
