//! Resilient TCP mirroring of PLC process images using
//! [Tokio](https://docs.rs/tokio) and Rust's `async/await` syntax.
//!
//! Each configured station owns two fixed-size byte buffers, an input
//! image continuously filled from the controller and an output image
//! continuously flushed back, kept synchronized over a plain TCP byte
//! stream with no framing beyond the image sizes themselves. Consumers
//! address the images by byte offset and element width and never see
//! sockets, tasks, or reconnection.
//!
//! # Features
//!
//! * Automatic connection management with configurable retry strategy
//! * Per-element byte-order reversal for remotes of either endianness
//! * Masked writes with per-interval coalescing of write bursts
//! * Stale-but-valid reads while a station is disconnected
//! * "Interrupt"-style update notification for binding layers
//!
//! # Example
//!
//! A station that mirrors 16 input bytes and 4 output bytes:
//!
//! ```no_run
//! use procimage::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = StationRegistry::new();
//!
//!     let mut config = StationConfig::new("plc1", 16, 4);
//!     config.address = Some("10.0.0.7:2000".parse()?);
//!     let station = registry.add(config, default_retry_strategy())?;
//!
//!     let mut updates = station.input_listener();
//!     loop {
//!         updates.changed().await?;
//!         let mut word = [0u8; 2];
//!         match station.read_array(0, 2, 1, &mut word) {
//!             Ok(()) => println!("word 0: {:#06X}", u16::from_ne_bytes(word)),
//!             Err(err) => eprintln!("read failed: {err}"),
//!         }
//!     }
//! }
//! ```

mod config;
mod decode;
mod error;
mod image;
mod registry;
mod retry;
mod station;
mod tcp;

pub use crate::config::StationConfig;
pub use crate::decode::DecodeLevel;
pub use crate::error::{AccessError, ConfigError, RangeError, Shutdown};
pub use crate::registry::StationRegistry;
pub use crate::retry::{
    default_retry_strategy, doubling_retry_strategy, fixed_retry_strategy, RetryStrategy,
};
pub use crate::station::{ImageAccess, Station, StationStatus, UpdateListener};
pub use crate::tcp::HostAddr;
