//! Session manager.
//!
//! Loads every active session from storage at startup, runs each one
//! on its own thread, and owns the ambient sensor.  Construction is
//! all-or-nothing: one unresolvable session fails `init` before any
//! thread starts, so the daemon never runs with a partial vessel set.
//!
//! Each worker publishes a [`SessionSnapshot`] after every tick; the
//! display and API layers read those snapshots and never touch a live
//! session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use crate::bus::{lock, BusContext};
use crate::config::Config;
use crate::error::Result;
use crate::sensor::{NullSensor, TempSensor, VesselSensor};
use crate::session::{Session, SessionSnapshot};
use crate::store::Store;
use crate::temperature::Temperature;

/// How often the manager refreshes the ambient reading.
const AMBIENT_REFRESH: Duration = Duration::from_secs(1);

struct SessionWorker {
    session_id: i64,
    stop: Arc<AtomicBool>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
    handle: thread::JoinHandle<()>,
}

pub struct SessionManager {
    ambient: Mutex<Box<dyn TempSensor>>,
    workers: Vec<SessionWorker>,
    stop: Arc<AtomicBool>,
}

impl SessionManager {
    /// Resolve every active session and start a control thread for
    /// each.  Threads are only spawned once all sessions resolved.
    pub fn init(
        store: Arc<dyn Store>,
        ctx: Arc<BusContext>,
        config: &Config,
    ) -> Result<Self> {
        let ambient: Box<dyn TempSensor> = match store.ambient_sensor()? {
            Some(rec) => Box::new(VesselSensor::from_record(Arc::clone(&ctx), &rec, config)?),
            None => Box::new(NullSensor),
        };

        let now = Utc::now();
        let records = store.active_sessions(now)?;
        let mut sessions = Vec::with_capacity(records.len());
        for rec in &records {
            sessions.push(Session::resolve(rec, &store, &ctx, config)?);
        }
        info!("manager: {} active session(s)", sessions.len());

        let workers = sessions.into_iter().map(spawn_worker).collect();
        Ok(Self {
            ambient: Mutex::new(ambient),
            workers,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the manager's own loop: keep the ambient reading fresh
    /// until a stop is requested.
    pub fn run(&self) {
        info!("manager: running");
        while !self.stop.load(Ordering::Relaxed) {
            if let Err(e) = lock(&self.ambient).sense() {
                // A missing ambient sensor fails every read; keep this
                // off the warn path.
                debug!("manager: ambient read failed: {e}");
            }
            thread::sleep(AMBIENT_REFRESH);
        }
        info!("manager: stopping");
    }

    /// Flag handed to a signal handler to end `run`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop every session thread and wait for them to park their
    /// effectors.  Consumes the manager; nothing runs afterwards.
    pub fn shutdown(self) {
        self.request_stop();
        for worker in self.workers {
            worker.stop.store(true, Ordering::Relaxed);
            if worker.handle.join().is_err() {
                warn!("session {}: control thread panicked", worker.session_id);
            }
        }
        info!("manager: all session threads stopped");
    }

    /// Latest published snapshot of every session.
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.workers
            .iter()
            .map(|w| lock(&w.snapshot).clone())
            .collect()
    }

    /// Latest filtered ambient temperature (sentinel when no ambient
    /// sensor is configured).
    pub fn ambient_temperature(&self) -> Temperature {
        lock(&self.ambient).average()
    }

    pub fn session_count(&self) -> usize {
        self.workers.len()
    }
}

fn spawn_worker(mut session: Session) -> SessionWorker {
    let session_id = session.id();
    let interval = session.tick_interval();
    let stop = Arc::new(AtomicBool::new(false));
    let snapshot = Arc::new(Mutex::new(session.snapshot(Utc::now())));

    let thread_stop = Arc::clone(&stop);
    let thread_snapshot = Arc::clone(&snapshot);
    let handle = thread::spawn(move || {
        info!("session {session_id}: control thread started");
        while !thread_stop.load(Ordering::Relaxed) {
            let now = Utc::now();
            if let Err(e) = session.tick(now) {
                warn!("session {session_id}: tick failed: {e}");
            }
            *lock(&thread_snapshot) = session.snapshot(now);
            thread::sleep(interval);
        }
        // Leave the vessel unpowered on the way out.
        session.shutdown();
        *lock(&thread_snapshot) = session.snapshot(Utc::now());
        info!("session {session_id}: control thread stopped");
    });

    SessionWorker {
        session_id,
        stop,
        snapshot,
        handle,
    }
}
