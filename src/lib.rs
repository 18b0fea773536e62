//! Acquisition engine for ESP32-based mixed-signal USB analyzers.
//!
//! This crate streams interleaved analog (voltage/current) and digital-logic
//! samples from a USB-attached analyzer to a consuming application in real
//! time. The pipeline has two halves sharing a fixed ring of packet slots:
//!
//! - the **driver** pulls fixed-size bulk packets from the device, decodes
//!   the frame format, folds analog values into the shared device context
//!   and publishes logic payloads into the ring;
//! - the **forwarder** drains filled slots on its own thread, streaming
//!   logic sample units to an [`OutputSink`] together with the most recent
//!   analog values.
//!
//! # Getting Started
//!
//! ```no_run
//! use mixsig_acq::{open_first, AcquisitionSession, Channel, DeviceConfig, OutputSink, Result};
//!
//! struct PrintSink;
//!
//! impl OutputSink for PrintSink {
//!     fn begin(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//!     fn emit_analog(&mut self, channel: &Channel, value: f32) -> Result<()> {
//!         println!("{channel} = {value}");
//!         Ok(())
//!     }
//!     fn emit_logic(&mut self, unit: &[u8]) -> Result<()> {
//!         println!("logic {unit:?}");
//!         Ok(())
//!     }
//!     fn end(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let transport = open_first()?;
//! let session = AcquisitionSession::start(transport, DeviceConfig::default(), PrintSink)?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! session.stop()?;
//! # Ok::<(), mixsig_acq::Error>(())
//! ```
//!
//! # Concurrency model
//!
//! One driver thread, one forwarder thread, no async runtime. The shared
//! run flag (owned by the session) is the only cancellation signal; the
//! ring's mutex guards slot state while slot buffers move by ownership, so
//! payload bytes are never touched under a lock.

pub mod context;
pub mod discovery;
mod driver;
mod error;
mod forwarder;
pub mod protocol;
pub mod ring;
pub mod sink;
pub mod transport;
pub mod types;

mod session;

// Crate-level error types
pub use error::{Error, Result};

// Core pipeline types
pub use context::DeviceContext;
pub use session::AcquisitionSession;
pub use sink::OutputSink;

// Data model
pub use protocol::{decode, AnalogEntry, DecodeError, Frame};
pub use types::{AcqStats, Channel, ChannelKind, DeviceConfig, Quantity};

// Transport seam
pub use transport::{Transport, UsbTransport};

// Discovery
pub use discovery::{list_devices, open_first, DiscoveredDevice};
