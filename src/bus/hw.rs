//! Real Raspberry Pi backends: spidev ioctls and sysfs GPIO.
//!
//! Compiled only with the `hardware` feature.  Everything here is a
//! thin shim over the kernel interfaces; policy (locking, readiness,
//! fail-safe defaults) lives in the portable bus modules.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::error::BusError;

// ── spidev ────────────────────────────────────────────────────

/// Matches `struct spi_ioc_transfer` in <linux/spi/spidev.h>.
#[repr(C)]
#[derive(Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

const SPI_IOC_MAGIC: u64 = b'k' as u64;
const IOC_WRITE: u64 = 1;

// _IOW('k', nr, size)
const fn spi_iow(nr: u64, size: u64) -> u64 {
    (IOC_WRITE << 30) | (size << 16) | (SPI_IOC_MAGIC << 8) | nr
}

const SPI_IOC_WR_MODE: u64 = spi_iow(1, 1);
const SPI_IOC_WR_BITS_PER_WORD: u64 = spi_iow(3, 1);
const SPI_IOC_WR_MAX_SPEED_HZ: u64 = spi_iow(4, 4);
const SPI_IOC_MESSAGE_1: u64 = spi_iow(0, core::mem::size_of::<SpiIocTransfer>() as u64);

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(-1)
}

pub struct SpidevDevice {
    file: File,
}

impl SpidevDevice {
    pub fn open(dev: &str) -> Result<Self, BusError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(dev)
            .map_err(|e| BusError::OpenFailed(e.raw_os_error().unwrap_or(-1)))?;
        Ok(Self { file })
    }

    fn config_ioctl<T>(&self, request: u64, value: &T) -> Result<(), BusError> {
        // SAFETY: `request` matches the size and direction of `value`
        // per the spidev ABI; the fd is owned by `self.file`.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                request as libc::c_ulong,
                std::ptr::from_ref(value),
            )
        };
        if rc < 0 {
            return Err(BusError::ConfigFailed(errno()));
        }
        Ok(())
    }

    pub fn set_mode(&self, mode: u8) -> Result<(), BusError> {
        self.config_ioctl(SPI_IOC_WR_MODE, &mode)
    }

    pub fn set_bits_per_word(&self, bits: u8) -> Result<(), BusError> {
        self.config_ioctl(SPI_IOC_WR_BITS_PER_WORD, &bits)
    }

    pub fn set_max_speed(&self, hz: u32) -> Result<(), BusError> {
        self.config_ioctl(SPI_IOC_WR_MAX_SPEED_HZ, &hz)
    }

    /// Full-duplex exchange of `len` bytes.  Either buffer may be
    /// absent; the kernel clocks zeroes out / discards input for the
    /// missing side.
    pub fn transfer(
        &self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        len: usize,
    ) -> Result<(), BusError> {
        let xfer = SpiIocTransfer {
            tx_buf: tx.map_or(0, |b| b.as_ptr() as u64),
            rx_buf: rx.map_or(0, |b| b.as_mut_ptr() as u64),
            len: len as u32,
            ..SpiIocTransfer::default()
        };
        // SAFETY: buffer pointers are valid for `len` bytes for the
        // duration of the call; SPI_IOC_MESSAGE(1) reads one transfer
        // descriptor.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                SPI_IOC_MESSAGE_1 as libc::c_ulong,
                &xfer,
            )
        };
        if rc < 0 {
            return Err(BusError::TransferFailed(errno()));
        }
        Ok(())
    }
}

// ── sysfs GPIO ────────────────────────────────────────────────
//
// Write failures are reported so the caller can log them, but pin
// writes are never allowed to take the control loop down.

fn gpio_path(pin: usize, leaf: &str) -> String {
    format!("/sys/class/gpio/gpio{pin}/{leaf}")
}

pub fn gpio_export(pin: usize) -> std::io::Result<()> {
    if Path::new(&gpio_path(pin, "value")).exists() {
        return Ok(());
    }
    let mut f = OpenOptions::new().write(true).open("/sys/class/gpio/export")?;
    write!(f, "{pin}")
}

pub fn gpio_set_direction(pin: usize, output: bool) -> std::io::Result<()> {
    std::fs::write(
        gpio_path(pin, "direction"),
        if output { "out" } else { "in" },
    )
}

pub fn gpio_write(pin: usize, high: bool) -> std::io::Result<()> {
    std::fs::write(gpio_path(pin, "value"), if high { "1" } else { "0" })
}

pub fn gpio_read(pin: usize) -> std::io::Result<bool> {
    let v = std::fs::read_to_string(gpio_path(pin, "value"))?;
    Ok(v.trim() == "1")
}
