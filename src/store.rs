//! Persistent-storage contracts.
//!
//! The schema and query mechanics live outside this crate; the core
//! needs exactly the reads and writes below.  `MemoryStore` is the
//! in-process implementation used by the daemon's state file and by
//! the tests.

use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bus::lock;
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// What a session is doing to its vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Ferment,
    Condition,
    Serve,
}

impl FromStr for ActivityType {
    type Err = StoreError;

    /// Matched case-insensitively, per the profile-record contract.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ferment" => Ok(Self::Ferment),
            "condition" => Ok(Self::Condition),
            "serve" => Ok(Self::Serve),
            _ => Err(StoreError::Malformed("activity type")),
        }
    }
}

/// Logical effector role within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectorKind {
    Heater,
    Cooler,
}

impl EffectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heater => "heater",
            Self::Cooler => "cooler",
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub batch_id: i64,
    pub batch_name: String,
    pub profile_id: i64,
    pub start: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: i64,
    /// `ferment`, `condition` or `serve`, matched case-insensitively
    /// at session construction.
    pub activity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub profile_id: i64,
    /// Position within the profile.
    pub order: u32,
    /// `None` means "hold forever"; later stages are ignored.
    pub duration_hours: Option<f64>,
    pub target_celsius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectorRecord {
    pub session_id: i64,
    /// `heater` or `cooler`, matched case-insensitively.
    pub kind: String,
    /// Shift-register effector channel (0-7).
    pub channel: usize,
    pub name: String,
    pub power_watts: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    /// `None` marks the ambient sensor owned by the manager.
    pub session_id: Option<i64>,
    pub name: String,
    /// Declared device type; must equal `thermistor`.
    pub kind: String,
    /// ADC channel the device is wired to.
    pub channel: usize,
    pub ref_temp_celsius: f64,
    pub ref_resistance: f64,
    pub beta: f64,
    pub range_min_celsius: f64,
    pub range_max_celsius: f64,
    /// Per-device bias current override, in microamps.
    pub isource_ua: Option<f64>,
}

/// One row of the effector audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectorLogEntry {
    pub at: DateTime<Utc>,
    pub channel: usize,
    pub state: bool,
}

// ---------------------------------------------------------------------------
// Store trait — the read/write contract the core requires
// ---------------------------------------------------------------------------

pub trait Store: Send + Sync {
    /// Sessions whose start time has passed and which have no
    /// completion timestamp.
    fn active_sessions(&self, now: DateTime<Utc>) -> Result<Vec<SessionRecord>, StoreError>;

    fn profile(&self, id: i64) -> Result<ProfileRecord, StoreError>;

    /// Stage rows for a profile, ordered by `order`.
    fn stages(&self, profile_id: i64) -> Result<Vec<StageRecord>, StoreError>;

    /// The session's effector of the given kind, if one is configured.
    fn session_effector(
        &self,
        session_id: i64,
        kind: EffectorKind,
    ) -> Result<Option<EffectorRecord>, StoreError>;

    /// The session's vessel sensor, if one is configured.
    fn session_sensor(&self, session_id: i64) -> Result<Option<SensorRecord>, StoreError>;

    /// The ambient sensor, if one is configured.
    fn ambient_sensor(&self) -> Result<Option<SensorRecord>, StoreError>;

    /// Append an effector state-change audit row.
    fn log_effector_state(&self, channel: usize, state: bool) -> Result<(), StoreError>;

    /// Record a session's completion timestamp.  A second call for an
    /// already-completed session keeps the first timestamp.
    fn set_session_completed(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Serialisable backing state — the daemon's JSON state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub profiles: Vec<ProfileRecord>,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    #[serde(default)]
    pub effectors: Vec<EffectorRecord>,
    #[serde(default)]
    pub sensors: Vec<SensorRecord>,
}

struct Inner {
    state: StateFile,
    effector_log: Vec<EffectorLogEntry>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_state(StateFile::default())
    }

    pub fn from_state(state: StateFile) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                effector_log: Vec::new(),
            }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let state: StateFile =
            serde_json::from_str(json).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::from_state(state))
    }

    // ── Record insertion (state-file assembly and tests) ─────────

    pub fn add_session(&self, rec: SessionRecord) {
        lock(&self.inner).state.sessions.push(rec);
    }

    pub fn add_profile(&self, rec: ProfileRecord) {
        lock(&self.inner).state.profiles.push(rec);
    }

    pub fn add_stage(&self, rec: StageRecord) {
        lock(&self.inner).state.stages.push(rec);
    }

    pub fn add_effector(&self, rec: EffectorRecord) {
        lock(&self.inner).state.effectors.push(rec);
    }

    pub fn add_sensor(&self, rec: SensorRecord) {
        lock(&self.inner).state.sensors.push(rec);
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn session(&self, id: i64) -> Option<SessionRecord> {
        lock(&self.inner).state.sessions.iter().find(|s| s.id == id).cloned()
    }

    pub fn effector_log(&self) -> Vec<EffectorLogEntry> {
        lock(&self.inner).effector_log.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn active_sessions(&self, now: DateTime<Utc>) -> Result<Vec<SessionRecord>, StoreError> {
        let inner = lock(&self.inner);
        Ok(inner
            .state
            .sessions
            .iter()
            .filter(|s| s.start <= now && s.completed.is_none())
            .cloned()
            .collect())
    }

    fn profile(&self, id: i64) -> Result<ProfileRecord, StoreError> {
        lock(&self.inner)
            .state
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("profile"))
    }

    fn stages(&self, profile_id: i64) -> Result<Vec<StageRecord>, StoreError> {
        let inner = lock(&self.inner);
        let mut stages: Vec<StageRecord> = inner
            .state
            .stages
            .iter()
            .filter(|s| s.profile_id == profile_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.order);
        Ok(stages)
    }

    fn session_effector(
        &self,
        session_id: i64,
        kind: EffectorKind,
    ) -> Result<Option<EffectorRecord>, StoreError> {
        let inner = lock(&self.inner);
        Ok(inner
            .state
            .effectors
            .iter()
            .find(|e| e.session_id == session_id && e.kind.eq_ignore_ascii_case(kind.as_str()))
            .cloned())
    }

    fn session_sensor(&self, session_id: i64) -> Result<Option<SensorRecord>, StoreError> {
        let inner = lock(&self.inner);
        Ok(inner
            .state
            .sensors
            .iter()
            .find(|s| s.session_id == Some(session_id))
            .cloned())
    }

    fn ambient_sensor(&self) -> Result<Option<SensorRecord>, StoreError> {
        let inner = lock(&self.inner);
        Ok(inner.state.sensors.iter().find(|s| s.session_id.is_none()).cloned())
    }

    fn log_effector_state(&self, channel: usize, state: bool) -> Result<(), StoreError> {
        lock(&self.inner).effector_log.push(EffectorLogEntry {
            at: Utc::now(),
            channel,
            state,
        });
        Ok(())
    }

    fn set_session_completed(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        let rec = inner
            .state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or(StoreError::NotFound("session"))?;
        if rec.completed.is_none() {
            rec.completed = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn session(id: i64, start: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id,
            batch_id: 10 + id,
            batch_name: format!("batch {id}"),
            profile_id: 1,
            start,
            completed: None,
        }
    }

    #[test]
    fn activity_type_parses_case_insensitively() {
        assert_eq!("FERMENT".parse::<ActivityType>().unwrap(), ActivityType::Ferment);
        assert_eq!("Condition".parse::<ActivityType>().unwrap(), ActivityType::Condition);
        assert_eq!("serve".parse::<ActivityType>().unwrap(), ActivityType::Serve);
        assert!("lager".parse::<ActivityType>().is_err());
    }

    #[test]
    fn active_sessions_filters_unstarted_and_completed() {
        let store = MemoryStore::new();
        store.add_session(session(1, t(-60)));
        store.add_session(session(2, t(3600))); // not yet started
        let mut done = session(3, t(-120));
        done.completed = Some(t(-10));
        store.add_session(done);

        let active = store.active_sessions(t(0)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }

    #[test]
    fn stages_come_back_ordered() {
        let store = MemoryStore::new();
        for (order, target) in [(2, 20.0), (1, 18.0), (3, 12.0)] {
            store.add_stage(StageRecord {
                profile_id: 1,
                order,
                duration_hours: Some(1.0),
                target_celsius: target,
            });
        }
        let stages = store.stages(1).unwrap();
        let targets: Vec<f64> = stages.iter().map(|s| s.target_celsius).collect();
        assert_eq!(targets, vec![18.0, 20.0, 12.0]);
    }

    #[test]
    fn effector_lookup_matches_kind_case_insensitively() {
        let store = MemoryStore::new();
        store.add_effector(EffectorRecord {
            session_id: 1,
            kind: "Heater".to_owned(),
            channel: 0,
            name: "belt".to_owned(),
            power_watts: 30.0,
        });
        assert!(store.session_effector(1, EffectorKind::Heater).unwrap().is_some());
        assert!(store.session_effector(1, EffectorKind::Cooler).unwrap().is_none());
    }

    #[test]
    fn completion_keeps_first_timestamp() {
        let store = MemoryStore::new();
        store.add_session(session(1, t(-60)));
        store.set_session_completed(1, t(100)).unwrap();
        store.set_session_completed(1, t(200)).unwrap();
        assert_eq!(store.session(1).unwrap().completed, Some(t(100)));
    }

    #[test]
    fn state_file_round_trips_through_json() {
        let store = MemoryStore::new();
        store.add_session(session(1, t(0)));
        store.add_profile(ProfileRecord { id: 1, activity: "ferment".to_owned() });
        let json = serde_json::to_string(&lock(&store.inner).state).unwrap();
        let restored = MemoryStore::from_json(&json).unwrap();
        assert!(restored.session(1).is_some());
        assert_eq!(restored.profile(1).unwrap().activity, "ferment");
    }
}
