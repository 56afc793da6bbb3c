//! Heating and cooling effectors.
//!
//! An effector is one shift-register output channel driving a relay.
//! State changes go to the hardware first; the in-memory state and
//! timestamps only move once the latch write succeeds.  Every change
//! is appended to the audit log, but an audit failure never blocks
//! control.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;

use crate::bus::shiftreg::{EFFECTOR_BIT_BASE, SHIFTREG_BITS};
use crate::bus::BusContext;
use crate::error::{Error, Result};
use crate::store::{EffectorRecord, Store};

pub trait Effector: Send {
    /// Drive the output to the requested state.  Re-asserting the
    /// current state is a no-op.
    fn activate(&mut self, on: bool) -> Result<()>;

    fn is_active(&self) -> bool;

    fn name(&self) -> &str;

    /// Rated power draw, for display and accounting.
    fn power_watts(&self) -> f64;

    fn last_activated(&self) -> Option<DateTime<Utc>>;

    fn last_deactivated(&self) -> Option<DateTime<Utc>>;
}

// ---------------------------------------------------------------------------
// Shift-register-backed effector
// ---------------------------------------------------------------------------

pub struct BusEffector {
    ctx: Arc<BusContext>,
    store: Arc<dyn Store>,
    channel: usize,
    name: String,
    power_watts: f64,
    active: bool,
    last_on: Option<DateTime<Utc>>,
    last_off: Option<DateTime<Utc>>,
}

impl core::fmt::Debug for BusEffector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusEffector")
            .field("channel", &self.channel)
            .field("name", &self.name)
            .field("power_watts", &self.power_watts)
            .field("active", &self.active)
            .field("last_on", &self.last_on)
            .field("last_off", &self.last_off)
            .finish_non_exhaustive()
    }
}

impl BusEffector {
    pub fn from_record(
        ctx: Arc<BusContext>,
        store: Arc<dyn Store>,
        rec: &EffectorRecord,
    ) -> Result<Self> {
        if rec.channel >= SHIFTREG_BITS - EFFECTOR_BIT_BASE {
            return Err(Error::Config("effector channel out of range"));
        }
        Ok(Self {
            ctx,
            store,
            channel: rec.channel,
            name: rec.name.clone(),
            power_watts: rec.power_watts,
            active: false,
            last_on: None,
            last_off: None,
        })
    }

    pub fn channel(&self) -> usize {
        self.channel
    }
}

impl Effector for BusEffector {
    fn activate(&mut self, on: bool) -> Result<()> {
        if on == self.active {
            return Ok(());
        }

        let bit = EFFECTOR_BIT_BASE + self.channel;
        if on {
            self.ctx.shift_reg.set(bit)?;
        } else {
            self.ctx.shift_reg.clear(bit)?;
        }

        self.active = on;
        let now = Utc::now();
        if on {
            self.last_on = Some(now);
        } else {
            self.last_off = Some(now);
        }

        if let Err(e) = self.store.log_effector_state(self.channel, on) {
            warn!("effector {}: audit log write failed: {e}", self.name);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn power_watts(&self) -> f64 {
        self.power_watts
    }

    fn last_activated(&self) -> Option<DateTime<Utc>> {
        self.last_on
    }

    fn last_deactivated(&self) -> Option<DateTime<Utc>> {
        self.last_off
    }
}

// ---------------------------------------------------------------------------
// Null effector
// ---------------------------------------------------------------------------

/// Stand-in for a session with no heater or no cooler wired.  Tracks
/// requested state in memory and always succeeds, so the control loop
/// runs unchanged.
pub struct NullEffector {
    name: String,
    active: bool,
    last_on: Option<DateTime<Utc>>,
    last_off: Option<DateTime<Utc>>,
}

impl NullEffector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: false,
            last_on: None,
            last_off: None,
        }
    }
}

impl Effector for NullEffector {
    fn activate(&mut self, on: bool) -> Result<()> {
        if on != self.active {
            self.active = on;
            let now = Utc::now();
            if on {
                self.last_on = Some(now);
            } else {
                self.last_off = Some(now);
            }
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn power_watts(&self) -> f64 {
        0.0
    }

    fn last_activated(&self) -> Option<DateTime<Utc>> {
        self.last_on
    }

    fn last_deactivated(&self) -> Option<DateTime<Utc>> {
        self.last_off
    }
}
