//! Background tick loop with adjustable speed and atomic snapshot handoff.

use crate::config::RuntimeConfig;
use crate::engine::Engine;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Playback speed: wall-clock delay between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    Paused,
    Slow,
    Normal,
    Fast,
}

impl Speed {
    pub const ALL: [Speed; 4] = [Speed::Paused, Speed::Slow, Speed::Normal, Speed::Fast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Speed::Paused => "paused",
            Speed::Slow => "slow",
            Speed::Normal => "normal",
            Speed::Fast => "fast",
        }
    }

    /// Delay between ticks, or `None` when paused.
    pub fn interval(&self, cfg: &RuntimeConfig) -> Option<Duration> {
        match self {
            Speed::Paused => None,
            Speed::Slow => Some(Duration::from_millis(cfg.slow_ms)),
            Speed::Normal => Some(Duration::from_millis(cfg.normal_ms)),
            Speed::Fast => Some(Duration::from_millis(cfg.fast_ms)),
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Speed {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = s.trim();
        Speed::ALL
            .into_iter()
            .find(|speed| speed.as_str().eq_ignore_ascii_case(level))
            .ok_or_else(|| RuntimeError::UnknownSpeed {
                level: level.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    UnknownSpeed { level: String },
    NotReady,
    AlreadyRunning,
    NotRunning,
    ThreadSpawnFailed { reason: String },
    ThreadJoinFailed,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnknownSpeed { level } => {
                write!(f, "unknown speed {level:?}, expected paused, slow, normal or fast")
            }
            RuntimeError::NotReady => write!(f, "no snapshot has been published yet"),
            RuntimeError::AlreadyRunning => write!(f, "simulation loop already running"),
            RuntimeError::NotRunning => write!(f, "simulation loop not running"),
            RuntimeError::ThreadSpawnFailed { reason } => {
                write!(f, "failed to spawn simulation thread: {reason}")
            }
            RuntimeError::ThreadJoinFailed => write!(f, "failed to join simulation thread"),
        }
    }
}

impl std::error::Error for RuntimeError {}

enum Control {
    Stop,
    Speed(Speed),
}

type Published = Arc<RwLock<Option<Arc<Snapshot>>>>;

/// Owns an [`Engine`] and drives it from a background thread.
///
/// The tick loop is the only writer of engine state. At the end of every tick
/// it publishes a freshly built [`Snapshot`]; readers only ever clone the
/// `Arc` of the latest one.
pub struct Runtime {
    cfg: RuntimeConfig,
    engine: Arc<Mutex<Engine>>,
    published: Published,
    speed: Speed,
    running: Arc<AtomicBool>,
    control_tx: Option<mpsc::Sender<Control>>,
    worker: Option<JoinHandle<()>>,
}

impl Runtime {
    pub fn new(engine: Engine) -> Self {
        Self {
            cfg: engine.config().runtime.clone(),
            engine: Arc::new(Mutex::new(engine)),
            published: Arc::new(RwLock::new(None)),
            speed: Speed::Normal,
            running: Arc::new(AtomicBool::new(false)),
            control_tx: None,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Latest published snapshot.
    pub fn get_snapshot(&self) -> Result<Arc<Snapshot>, RuntimeError> {
        read_published(&self.published)
            .clone()
            .ok_or(RuntimeError::NotReady)
    }

    /// Change the playback speed; takes effect from the next tick boundary.
    ///
    /// Unrecognised levels are rejected and leave the current speed untouched.
    pub fn set_speed(&mut self, level: &str) -> Result<Speed, RuntimeError> {
        let speed: Speed = level.parse()?;
        self.speed = speed;
        match &self.control_tx {
            Some(control_tx) if self.is_running() => {
                // A send error means the loop already exited; the stored speed still applies.
                let _ = control_tx.send(Control::Speed(speed));
            }
            _ => relabel(&self.published, speed),
        }
        log::info!("speed set to {speed}");
        Ok(speed)
    }

    pub fn start(&mut self) -> Result<(), RuntimeError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }

        let cfg = self.cfg.clone();
        let engine = Arc::clone(&self.engine);
        let published = Arc::clone(&self.published);
        let running = Arc::clone(&self.running);
        let mut speed = self.speed;
        let (control_tx, control_rx) = mpsc::channel::<Control>();

        let worker = thread::Builder::new()
            .name("towersim-tick".to_string())
            .spawn(move || {
                let mut last_tick = Instant::now();
                loop {
                    let message = match speed.interval(&cfg) {
                        Some(interval) => {
                            // Wait out what is left of the interval since the last tick.
                            let wait =
                                (last_tick + interval).saturating_duration_since(Instant::now());
                            match control_rx.recv_timeout(wait) {
                                Ok(message) => Some(message),
                                Err(mpsc::RecvTimeoutError::Timeout) => None,
                                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        None => match control_rx.recv() {
                            Ok(message) => Some(message),
                            Err(_) => break,
                        },
                    };
                    match message {
                        Some(Control::Stop) => break,
                        Some(Control::Speed(next)) => {
                            speed = next;
                            relabel(&published, speed);
                        }
                        None => {
                            let mut engine = lock_engine(&engine);
                            engine.step();
                            publish(&published, &engine, speed);
                            last_tick = Instant::now();
                        }
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                RuntimeError::ThreadSpawnFailed {
                    reason: err.to_string(),
                }
            })?;

        log::info!("simulation loop started at {} speed", self.speed);
        self.control_tx = Some(control_tx);
        self.worker = Some(worker);
        Ok(())
    }

    /// Stop the loop; takes effect between ticks.
    pub fn stop(&mut self) -> Result<(), RuntimeError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        if let Some(control_tx) = self.control_tx.take() {
            let _ = control_tx.send(Control::Stop);
        }
        let joined = match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| RuntimeError::ThreadJoinFailed),
            None => Ok(()),
        };
        // A panicked worker never clears the flag itself.
        self.running.store(false, Ordering::SeqCst);
        joined?;
        log::info!("simulation loop stopped");
        Ok(())
    }

    /// Step the engine `ticks` times on the calling thread and publish the result.
    ///
    /// Only allowed while the background loop is stopped.
    pub fn advance(&mut self, ticks: u64) -> Result<Arc<Snapshot>, RuntimeError> {
        if self.is_running() {
            return Err(RuntimeError::AlreadyRunning);
        }
        {
            let mut engine = lock_engine(&self.engine);
            engine.run_ticks(ticks);
            if ticks > 0 {
                publish(&self.published, &engine, self.speed);
            }
        }
        self.get_snapshot()
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<T>(&self, f: impl FnOnce(&Engine) -> T) -> T {
        f(&lock_engine(&self.engine))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if let Some(control_tx) = self.control_tx.take() {
            let _ = control_tx.send(Control::Stop);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

fn publish(published: &Published, engine: &Engine, speed: Speed) {
    let mut snapshot = engine.snapshot();
    snapshot.speed = Some(speed);
    *write_published(published) = Some(Arc::new(snapshot));
}

/// Republish the latest snapshot under a new speed.
fn relabel(published: &Published, speed: Speed) {
    let mut current = write_published(published);
    if let Some(snapshot) = current.as_ref()
        && snapshot.speed != Some(speed)
    {
        let mut snapshot = Snapshot::clone(snapshot);
        snapshot.speed = Some(speed);
        *current = Some(Arc::new(snapshot));
    }
}

fn lock_engine(engine: &Arc<Mutex<Engine>>) -> MutexGuard<'_, Engine> {
    engine
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_published(published: &Published) -> std::sync::RwLockReadGuard<'_, Option<Arc<Snapshot>>> {
    published
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_published(published: &Published) -> std::sync::RwLockWriteGuard<'_, Option<Arc<Snapshot>>> {
    published
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
