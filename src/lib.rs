//! Multi-vessel brewery temperature controller.
//!
//! One daemon process supervises any number of concurrent brewing
//! sessions, each binding a vessel's thermistor and heater/cooler
//! relays to a staged temperature profile.  All hardware I/O funnels
//! through a single shared [`bus::BusContext`]; each session runs its
//! control loop on its own thread under the [`manager::SessionManager`].
//!
//! The crate builds for the host by default, with every hardware
//! transport simulated in memory; the `hardware` feature switches the
//! bus layer to spidev ioctls and sysfs GPIO.

#![deny(unused_must_use)]

pub mod bus;
pub mod config;
pub mod effector;
pub mod error;
pub mod manager;
pub mod pins;
pub mod sensor;
pub mod session;
pub mod store;
pub mod temperature;
pub mod thermistor;
