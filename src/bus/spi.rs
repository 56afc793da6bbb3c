//! SPI transport.
//!
//! The port is not ready for use until the device is open and mode,
//! word size, and clock speed have all been set; operations attempted
//! before readiness fail without touching hardware.  Zero-length
//! transfers succeed trivially; a transfer with neither buffer is a
//! usage error.
//!
//! ## Dual-target design
//!
//! With the `hardware` feature, transfers go through spidev ioctls.
//! On host targets the port records transmitted frames and replays
//! canned replies, so tests can script the wire (the `sim_*` helpers).

use crate::config::SpiConfig;
use crate::error::BusError;

const EINVAL: i32 = 22;

#[cfg(feature = "hardware")]
use super::hw::SpidevDevice;

#[cfg(not(feature = "hardware"))]
use std::collections::VecDeque;

/// In-memory stand-in for the spidev device.
#[cfg(not(feature = "hardware"))]
#[derive(Default)]
struct SimSpi {
    /// Every transmitted frame, in order (rx-only exchanges record zeroes).
    frames: Vec<Vec<u8>>,
    /// Queued replies, consumed one per transfer, zero-padded to length.
    replies: VecDeque<Vec<u8>>,
}

pub struct SpiPort {
    #[cfg(feature = "hardware")]
    dev: Option<SpidevDevice>,
    #[cfg(not(feature = "hardware"))]
    sim: SimSpi,
    open: bool,
    mode_set: bool,
    bits_set: bool,
    speed_set: bool,
}

impl SpiPort {
    /// A port with no device and no configuration.  Every transfer
    /// fails with `NotReady` until `open_device` and all three
    /// configuration calls have succeeded.
    pub fn unconfigured() -> Self {
        Self {
            #[cfg(feature = "hardware")]
            dev: None,
            #[cfg(not(feature = "hardware"))]
            sim: SimSpi::default(),
            open: false,
            mode_set: false,
            bits_set: false,
            speed_set: false,
        }
    }

    /// Open and fully configure a port in one step.
    pub fn open(cfg: &SpiConfig) -> Result<Self, BusError> {
        let mut port = Self::unconfigured();
        port.open_device(&cfg.dev)?;
        port.set_mode(cfg.mode)?;
        port.set_bits_per_word(8)?;
        port.set_max_speed(cfg.max_clock)?;
        Ok(port)
    }

    pub fn is_ready(&self) -> bool {
        self.open && self.mode_set && self.bits_set && self.speed_set
    }

    #[cfg(feature = "hardware")]
    pub fn open_device(&mut self, dev: &str) -> Result<(), BusError> {
        self.dev = Some(SpidevDevice::open(dev)?);
        self.open = true;
        Ok(())
    }

    #[cfg(not(feature = "hardware"))]
    pub fn open_device(&mut self, _dev: &str) -> Result<(), BusError> {
        self.open = true;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: u8) -> Result<(), BusError> {
        if mode > 3 {
            return Err(BusError::ConfigFailed(EINVAL));
        }
        #[cfg(feature = "hardware")]
        self.device()?.set_mode(mode)?;
        self.mode_set = true;
        Ok(())
    }

    pub fn set_bits_per_word(&mut self, bits: u8) -> Result<(), BusError> {
        if bits == 0 {
            return Err(BusError::ConfigFailed(EINVAL));
        }
        #[cfg(feature = "hardware")]
        self.device()?.set_bits_per_word(bits)?;
        self.bits_set = true;
        Ok(())
    }

    pub fn set_max_speed(&mut self, hz: u32) -> Result<(), BusError> {
        if hz == 0 {
            return Err(BusError::ConfigFailed(EINVAL));
        }
        #[cfg(feature = "hardware")]
        self.device()?.set_max_speed(hz)?;
        self.speed_set = true;
        Ok(())
    }

    /// Full-duplex exchange.  Returns the number of bytes clocked.
    ///
    /// When both buffers are present and differ in length, the shorter
    /// side is zero-padded / truncated to the longer one.
    pub fn transfer(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<usize, BusError> {
        let len = match (&tx, &rx) {
            (None, None) => return Err(BusError::NullBuffers),
            (Some(t), None) => t.len(),
            (None, Some(r)) => r.len(),
            (Some(t), Some(r)) => t.len().max(r.len()),
        };
        if len == 0 {
            return Ok(0);
        }
        if !self.is_ready() {
            return Err(BusError::NotReady);
        }
        self.exchange(tx, rx, len)?;
        Ok(len)
    }

    pub fn transmit_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.transfer(Some(&[byte]), None).map(|_| ())
    }

    pub fn receive_byte(&mut self) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        self.transfer(None, Some(&mut buf))?;
        Ok(buf[0])
    }

    // ── Hardware exchange ─────────────────────────────────────

    #[cfg(feature = "hardware")]
    fn device(&self) -> Result<&SpidevDevice, BusError> {
        self.dev.as_ref().ok_or(BusError::NotReady)
    }

    #[cfg(feature = "hardware")]
    fn exchange(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        len: usize,
    ) -> Result<(), BusError> {
        let dev = self.dev.as_ref().ok_or(BusError::NotReady)?;

        // The kernel requires both buffers to span the full transfer;
        // pad mismatched lengths through temporaries.
        let padded_tx: Option<Vec<u8>> = tx.and_then(|t| {
            (t.len() < len).then(|| {
                let mut v = vec![0u8; len];
                v[..t.len()].copy_from_slice(t);
                v
            })
        });
        let tx_ref = padded_tx.as_deref().or(tx);

        match rx {
            Some(r) if r.len() < len => {
                let mut tmp = vec![0u8; len];
                dev.transfer(tx_ref, Some(&mut tmp), len)?;
                let n = r.len();
                r.copy_from_slice(&tmp[..n]);
                Ok(())
            }
            other => dev.transfer(tx_ref, other, len),
        }
    }

    // ── Simulated exchange ────────────────────────────────────

    #[cfg(not(feature = "hardware"))]
    fn exchange(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        len: usize,
    ) -> Result<(), BusError> {
        let mut frame = vec![0u8; len];
        if let Some(t) = tx {
            let n = t.len().min(len);
            frame[..n].copy_from_slice(&t[..n]);
        }
        self.sim.frames.push(frame);

        if let Some(r) = rx {
            let reply = self.sim.replies.pop_front().unwrap_or_default();
            for (i, byte) in r.iter_mut().enumerate() {
                *byte = reply.get(i).copied().unwrap_or(0);
            }
        }
        Ok(())
    }

    /// Queue a reply frame for the next receiving transfer.
    #[cfg(not(feature = "hardware"))]
    pub fn sim_queue_reply(&mut self, reply: Vec<u8>) {
        self.sim.replies.push_back(reply);
    }

    /// Drain and return every frame transmitted so far.
    #[cfg(not(feature = "hardware"))]
    pub fn sim_take_frames(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sim.frames)
    }

    /// Number of transfers issued so far.
    #[cfg(not(feature = "hardware"))]
    pub fn sim_frame_count(&self) -> usize {
        self.sim.frames.len()
    }
}
