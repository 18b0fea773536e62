//! Shared per-session device state.
//!
//! Exactly one [`DeviceContext`] exists per acquisition session. It owns the
//! immutable channel table, the latest-value analog arrays and the run flag,
//! and is shared by `Arc` between the driver, the forwarder and the session —
//! there is no module-level "current device" state anywhere in this crate.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::protocol::AnalogEntry;
use crate::types::{Channel, ChannelKind, DeviceConfig};

/// Shared state of one acquisition session.
///
/// # Analog value semantics
///
/// Each analog channel holds its latest decoded value as an `AtomicU32` f32
/// bit pattern: the driver overwrites in place, the forwarder reads at
/// forward-time. A reader never observes a torn float, but no cross-channel
/// snapshot is guaranteed — "most recent value", not "simultaneous values".
pub struct DeviceContext {
    config: DeviceConfig,
    channels: Vec<Channel>,
    voltage: Vec<AtomicU32>,
    current: Vec<AtomicU32>,
    running: AtomicBool,
}

impl DeviceContext {
    /// Build the context and its channel table from a configuration.
    pub fn new(config: DeviceConfig) -> Self {
        let mut channels = Vec::new();
        for i in 0..config.voltage_channels {
            channels.push(Channel::analog(
                i,
                ChannelKind::Voltage,
                config.voltage_quantity,
            ));
        }
        for i in 0..config.current_channels {
            channels.push(Channel::analog(
                i,
                ChannelKind::Current,
                config.current_quantity,
            ));
        }
        for i in 0..config.logic_channels {
            channels.push(Channel::logic(i));
        }

        let voltage = (0..config.voltage_channels)
            .map(|_| AtomicU32::new(0f32.to_bits()))
            .collect();
        let current = (0..config.current_channels)
            .map(|_| AtomicU32::new(0f32.to_bits()))
            .collect();

        Self {
            config,
            channels,
            voltage,
            current,
            running: AtomicBool::new(false),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// All channels, voltage first, then current, then logic.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Analog channels only (the ones forwarded alongside each logic unit).
    pub fn analog_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels
            .iter()
            .filter(|c| c.kind() != ChannelKind::Logic)
    }

    /// Bytes per forwarded logic unit.
    pub fn logic_unit_size(&self) -> usize {
        self.config.logic_unit_size()
    }

    /// Store a decoded analog value. Entries addressing channels outside the
    /// configured range are dropped; the firmware should not produce them,
    /// but a corrupt packet must not index out of bounds.
    pub fn store_analog(&self, entry: &AnalogEntry) {
        let array = match entry.kind {
            ChannelKind::Voltage => &self.voltage,
            ChannelKind::Current => &self.current,
            ChannelKind::Logic => return,
        };
        if let Some(cell) = array.get(entry.index as usize) {
            cell.store(entry.value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Latest value of an analog channel, or `None` for logic channels and
    /// out-of-range indices.
    pub fn analog_value(&self, channel: &Channel) -> Option<f32> {
        let array = match channel.kind() {
            ChannelKind::Voltage => &self.voltage,
            ChannelKind::Current => &self.current,
            ChannelKind::Logic => return None,
        };
        array
            .get(channel.index() as usize)
            .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed)))
    }

    /// Whether the pipeline should keep running. Relaxed load: the flag is a
    /// liveness signal only.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Raise the run flag. Called by the session before spawning workers.
    pub(crate) fn set_running(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    /// Clear the run flag. This is the sole cancellation signal for the
    /// driver and forwarder loops; only the session calls it.
    pub(crate) fn request_stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quantity;

    #[test]
    fn test_channel_table_layout() {
        let ctx = DeviceContext::new(DeviceConfig::default());
        let labels: Vec<String> = ctx.channels().iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec!["V0", "I0", "D0", "D1", "D2", "D3", "D4", "D5", "D6", "D7"]
        );
        assert_eq!(ctx.analog_channels().count(), 2);
    }

    #[test]
    fn test_store_and_read_latest_value() {
        let ctx = DeviceContext::new(DeviceConfig::default());
        let v0 = ctx.channels()[0].clone();
        assert_eq!(ctx.analog_value(&v0), Some(0.0));

        ctx.store_analog(&AnalogEntry {
            kind: ChannelKind::Voltage,
            index: 0,
            value: 3.3,
        });
        ctx.store_analog(&AnalogEntry {
            kind: ChannelKind::Voltage,
            index: 0,
            value: 1.8,
        });
        // Latest-value semantics: overwritten in place, never appended.
        assert_eq!(ctx.analog_value(&v0), Some(1.8));
    }

    #[test]
    fn test_out_of_range_entry_is_dropped() {
        let ctx = DeviceContext::new(DeviceConfig::default());
        ctx.store_analog(&AnalogEntry {
            kind: ChannelKind::Current,
            index: 42,
            value: 9.9,
        });
        let i0 = ctx.channels()[1].clone();
        assert_eq!(ctx.analog_value(&i0), Some(0.0));
    }

    #[test]
    fn test_logic_channel_has_no_analog_value() {
        let mut config = DeviceConfig::default();
        config.current_quantity = Quantity::MicroAmperes;
        let ctx = DeviceContext::new(config);
        let d0 = ctx.channels()[2].clone();
        assert_eq!(d0.kind(), ChannelKind::Logic);
        assert_eq!(ctx.analog_value(&d0), None);
    }

    #[test]
    fn test_run_flag_transitions() {
        let ctx = DeviceContext::new(DeviceConfig::default());
        assert!(!ctx.is_running());
        ctx.set_running();
        assert!(ctx.is_running());
        ctx.request_stop();
        assert!(!ctx.is_running());
    }
}
