//! Unified error types for the controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping
//! the session loop's error handling uniform.  Device-layer and
//! session-layer operations report failure through these types and
//! never abort the process; only session *construction* errors are
//! fatal, and then only to `SessionManager::init`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A shared-bus operation failed (SPI, GPIO, shift register, ADC).
    Bus(BusError),
    /// A sensor could not produce a usable reading.
    Sensor(SensorError),
    /// A storage read or write failed.
    Store(StoreError),
    /// Configuration or a storage record is invalid.
    Config(&'static str),
    /// A temperature string could not be parsed.
    Parse(ParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The SPI device could not be opened (errno).
    OpenFailed(i32),
    /// A mode/word-size/speed configuration ioctl failed (errno).
    ConfigFailed(i32),
    /// The port has not completed open + configuration.
    NotReady,
    /// A transfer was requested with neither a tx nor an rx buffer.
    NullBuffers,
    /// The full-duplex exchange ioctl failed (errno).
    TransferFailed(i32),
    /// Shift-register bit index outside 0..16.
    InvalidBit(usize),
    /// ADC channel index outside the device's supported range.
    InvalidChannel(usize),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed(rc) => write!(f, "SPI device open failed (rc={rc})"),
            Self::ConfigFailed(rc) => write!(f, "SPI configuration failed (rc={rc})"),
            Self::NotReady => write!(f, "SPI port not ready"),
            Self::NullBuffers => write!(f, "transfer with no tx and no rx buffer"),
            Self::TransferFailed(rc) => write!(f, "SPI transfer failed (rc={rc})"),
            Self::InvalidBit(bit) => write!(f, "shift-register bit {bit} out of range"),
            Self::InvalidChannel(ch) => write!(f, "ADC channel {ch} out of range"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The electrical reading maps to no physical temperature
    /// (open/short thermistor, log-domain failure).
    Conversion,
    /// The filtered reading lies outside the configured bounds.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion => write!(f, "reading not convertible to a temperature"),
            Self::OutOfRange => write!(f, "reading out of configured range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A required record does not exist.
    NotFound(&'static str),
    /// A record exists but fails validation.
    Malformed(&'static str),
    /// The storage backend itself failed.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Malformed(what) => write!(f, "{what} malformed"),
            Self::Backend(msg) => write!(f, "backend: {msg}"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No numeric portion was consumed.
    NoNumber,
    /// The unit suffix is missing or not one of C/F/K.
    BadUnit,
    /// The value lies below absolute zero in the given unit.
    BelowAbsoluteZero,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNumber => write!(f, "no numeric value"),
            Self::BadUnit => write!(f, "unrecognised unit suffix"),
            Self::BelowAbsoluteZero => write!(f, "below absolute zero"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
