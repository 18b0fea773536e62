//! Output sink trait.
//!
//! The forwarder hands decoded, channel-labelled samples to an [`OutputSink`]
//! without knowing its wire format. A session is bracketed by `begin` and
//! `end`, matching acquisition start and stop.

use crate::error::Result;
use crate::types::Channel;

/// Consumer of decoded samples.
///
/// Implementations are driven from the forwarder thread and must be `Send`.
/// `emit_analog` receives the channel (identity, kind and measured quantity)
/// together with the latest decoded value; `emit_logic` receives one packed
/// logic sample unit, `ceil(logic_channels / 8)` bytes wide.
pub trait OutputSink: Send + 'static {
    /// Open the sink session. Called once before any sample is emitted.
    fn begin(&mut self) -> Result<()>;

    /// Emit the latest value of one analog channel.
    fn emit_analog(&mut self, channel: &Channel, value: f32) -> Result<()>;

    /// Emit one packed logic sample unit.
    fn emit_logic(&mut self, unit: &[u8]) -> Result<()>;

    /// Close the sink session. Called once after the last sample.
    fn end(&mut self) -> Result<()>;
}
