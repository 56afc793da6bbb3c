//! Brewing session control.
//!
//! A session binds one vessel's sensor and effectors to a temperature
//! profile: an ordered list of stages, each holding a target for a
//! duration (or forever).  Each control tick senses the vessel,
//! resolves the current stage target, and drives the heater/cooler
//! through a hysteresis band so the effectors never chatter around
//! the setpoint.
//!
//! Failure posture: an unreadable or out-of-range sensor, or a failed
//! effector write, drops the session to `Unknown` with both effectors
//! off.  The loop keeps ticking; the next good reading recovers it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::bus::BusContext;
use crate::config::Config;
use crate::effector::{BusEffector, Effector, NullEffector};
use crate::error::{Error, Result, SensorError};
use crate::sensor::{NullSensor, TempSensor, VesselSensor};
use crate::store::{ActivityType, EffectorKind, SessionRecord, Store};
use crate::temperature::{Temperature, TemperatureUnit};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Control state, as shown on the display and in snapshots.
///
/// `FastCool` and `FastHeat` are reserved for a future second effector
/// stage per direction; no current decision path produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unknown,
    FastCool,
    Cool,
    Hold,
    Heat,
    FastHeat,
}

impl core::fmt::Display for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::FastCool => "FastCool",
            Self::Cool => "Cool",
            Self::Hold => "Hold",
            Self::Heat => "Heat",
            Self::FastHeat => "FastHeat",
        };
        write!(f, "{s}")
    }
}

/// One step of a temperature profile.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub target: Temperature,
    /// `None` holds the target forever.
    pub duration: Option<Duration>,
}

/// Published view of a session, refreshed once per tick.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: i64,
    pub batch_id: i64,
    pub batch_name: String,
    pub activity: ActivityType,
    pub state: SessionState,
    pub current_c: f64,
    pub target_c: f64,
    pub in_range: bool,
    pub heater_on: bool,
    pub cooler_on: bool,
    pub active: bool,
    pub complete: bool,
    pub remaining_secs: i64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    id: i64,
    batch_id: i64,
    batch_name: String,
    activity: ActivityType,
    start: DateTime<Utc>,
    /// Scheduled end, or `None` when a forever stage makes the session
    /// indefinite.
    end: Option<DateTime<Utc>>,
    stages: Vec<Stage>,
    /// Hysteresis half-width in kelvin.
    dead_zone_k: f64,
    tick_interval: StdDuration,
    state: SessionState,
    complete: bool,
    last_target: Temperature,
    sensor: Box<dyn TempSensor>,
    heater: Box<dyn Effector>,
    cooler: Box<dyn Effector>,
    store: Arc<dyn Store>,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("batch_id", &self.batch_id)
            .field("batch_name", &self.batch_name)
            .field("activity", &self.activity)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("stages", &self.stages)
            .field("dead_zone_k", &self.dead_zone_k)
            .field("tick_interval", &self.tick_interval)
            .field("state", &self.state)
            .field("complete", &self.complete)
            .field("last_target", &self.last_target)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a runnable session from its storage records.  Any missing
    /// or malformed record fails construction; a missing sensor or
    /// effector is not an error and gets a null device instead.
    pub fn resolve(
        rec: &SessionRecord,
        store: &Arc<dyn Store>,
        ctx: &Arc<BusContext>,
        config: &Config,
    ) -> Result<Self> {
        let profile = store.profile(rec.profile_id)?;
        let activity: ActivityType = profile.activity.parse()?;

        let stage_recs = store.stages(profile.id)?;
        if stage_recs.is_empty() {
            return Err(Error::Config("profile has no stages"));
        }
        let mut stages = Vec::with_capacity(stage_recs.len());
        for s in &stage_recs {
            let target = Temperature::new(s.target_celsius, TemperatureUnit::Celsius)
                .ok_or(Error::Config("stage target below absolute zero"))?;
            let duration = match s.duration_hours {
                Some(h) if h > 0.0 => Some(Duration::seconds((h * 3600.0) as i64)),
                Some(_) => return Err(Error::Config("stage duration must be > 0")),
                None => None,
            };
            stages.push(Stage { target, duration });
        }

        // Scheduled end: the sum of finite stage durations, unless a
        // forever stage makes the session indefinite.
        let mut end = None;
        let mut cursor = rec.start;
        for stage in &stages {
            match stage.duration {
                Some(d) => {
                    cursor += d;
                    end = Some(cursor);
                }
                None => {
                    end = None;
                    break;
                }
            }
        }

        let sensor: Box<dyn TempSensor> = match store.session_sensor(rec.id)? {
            Some(s) => Box::new(VesselSensor::from_record(Arc::clone(ctx), &s, config)?),
            None => Box::new(NullSensor),
        };
        let heater = Self::resolve_effector(rec.id, EffectorKind::Heater, store, ctx)?;
        let cooler = Self::resolve_effector(rec.id, EffectorKind::Cooler, store, ctx)?;

        info!(
            "session {}: \"{}\" ({:?}), {} stage(s), sensor={}, heater={}, cooler={}",
            rec.id,
            rec.batch_name,
            activity,
            stages.len(),
            sensor.name(),
            heater.name(),
            cooler.name(),
        );

        Ok(Self {
            id: rec.id,
            batch_id: rec.batch_id,
            batch_name: rec.batch_name.clone(),
            activity,
            start: rec.start,
            end,
            stages,
            dead_zone_k: config.session.dead_zone,
            tick_interval: StdDuration::from_secs_f64(config.session.effector_update_interval_s),
            state: SessionState::Hold,
            complete: rec.completed.is_some(),
            last_target: Temperature::zero(),
            sensor,
            heater,
            cooler,
            store: Arc::clone(store),
        })
    }

    fn resolve_effector(
        session_id: i64,
        kind: EffectorKind,
        store: &Arc<dyn Store>,
        ctx: &Arc<BusContext>,
    ) -> Result<Box<dyn Effector>> {
        Ok(match store.session_effector(session_id, kind)? {
            Some(rec) => Box::new(BusEffector::from_record(
                Arc::clone(ctx),
                Arc::clone(store),
                &rec,
            )?),
            None => Box::new(NullEffector::new(kind.as_str())),
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn batch_name(&self) -> &str {
        &self.batch_name
    }

    pub fn activity(&self) -> ActivityType {
        self.activity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn tick_interval(&self) -> StdDuration {
        self.tick_interval
    }

    /// Started and not yet completed.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.complete && now >= self.start
    }

    /// Time left until the scheduled end.  Zero for a session that is
    /// not active or that holds forever.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if !self.is_active(now) {
            return Duration::zero();
        }
        match self.end {
            Some(end) if end > now => end - now,
            _ => Duration::zero(),
        }
    }

    /// The stage target in effect at `now`.  Sentinel before the start
    /// and after the last finite stage ends.
    pub fn target_temperature(&self, now: DateTime<Utc>) -> Temperature {
        if now < self.start {
            return Temperature::zero();
        }
        let mut cursor = self.start;
        for stage in &self.stages {
            match stage.duration {
                None => return stage.target,
                Some(d) => {
                    cursor += d;
                    if now < cursor {
                        return stage.target;
                    }
                }
            }
        }
        Temperature::zero()
    }

    // ── Control ──────────────────────────────────────────────────

    /// Run one control tick.
    ///
    /// Decision order:
    /// 1. inactive (unstarted or completed) — hold, effectors off;
    /// 2. unreadable or out-of-range sensor — `Unknown`, effectors off,
    ///    error propagated for logging;
    /// 3. sentinel target (profile exhausted) — hold, effectors off;
    /// 4. otherwise hysteresis: drive toward the target, and once
    ///    driving, keep driving until the sensed value crosses the
    ///    setpoint itself, not just the band edge.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_active(now) {
            self.quiesce(SessionState::Hold);
            return Ok(());
        }

        let sensed = match self.sensor.sense() {
            Ok(t) => t,
            Err(e) => {
                self.quiesce(SessionState::Unknown);
                return Err(e);
            }
        };
        if !self.sensor.in_range() {
            self.quiesce(SessionState::Unknown);
            return Err(SensorError::OutOfRange.into());
        }

        let target = self.target_temperature(now);
        self.last_target = target;
        if !target.is_valid() {
            self.quiesce(SessionState::Hold);
            return Ok(());
        }

        let s = sensed.to_kelvin();
        let t = target.to_kelvin();
        let (state, heat, cool) = if s > t + self.dead_zone_k {
            (SessionState::Cool, false, true)
        } else if s < t - self.dead_zone_k {
            (SessionState::Heat, true, false)
        } else if s >= t && self.cooler.is_active() {
            // Inside the band but still above the setpoint: keep
            // cooling until the midpoint is crossed.
            (SessionState::Cool, false, true)
        } else if s <= t && self.heater.is_active() {
            (SessionState::Heat, true, false)
        } else {
            (SessionState::Hold, false, false)
        };

        if let Err(e) = self.drive(heat, cool) {
            self.quiesce(SessionState::Unknown);
            return Err(e);
        }
        self.state = state;
        Ok(())
    }

    /// Apply the decided effector states, switching off before on so
    /// heater and cooler are never energised together.
    fn drive(&mut self, heat: bool, cool: bool) -> Result<()> {
        if !heat {
            self.heater.activate(false)?;
        }
        if !cool {
            self.cooler.activate(false)?;
        }
        if heat {
            self.heater.activate(true)?;
        }
        if cool {
            self.cooler.activate(true)?;
        }
        Ok(())
    }

    /// Best-effort deactivation of both effectors.  Used on every
    /// failure path and at shutdown, so it must not itself fail.
    fn quiesce(&mut self, state: SessionState) {
        if let Err(e) = self.heater.activate(false) {
            warn!("session {}: heater deactivation failed: {e}", self.id);
        }
        if let Err(e) = self.cooler.activate(false) {
            warn!("session {}: cooler deactivation failed: {e}", self.id);
        }
        self.state = state;
    }

    /// Called by the worker thread on its way out.
    pub fn shutdown(&mut self) {
        self.quiesce(SessionState::Hold);
    }

    /// Mark the session finished: effectors off, completion timestamp
    /// persisted.  Idempotent; the in-memory flag only moves once the
    /// write succeeds, so a failed write is retried on the next call.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.quiesce(SessionState::Hold);
        if self.complete {
            return Ok(());
        }
        self.store.set_session_completed(self.id, now)?;
        self.complete = true;
        info!("session {}: complete", self.id);
        Ok(())
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            batch_id: self.batch_id,
            batch_name: self.batch_name.clone(),
            activity: self.activity,
            state: self.state,
            current_c: self.sensor.average().to_celsius(),
            target_c: self.last_target.to_celsius(),
            in_range: self.sensor.in_range(),
            heater_on: self.heater.is_active(),
            cooler_on: self.cooler.is_active(),
            active: self.is_active(now),
            complete: self.complete,
            remaining_secs: self.remaining(now).num_seconds(),
        }
    }
}
