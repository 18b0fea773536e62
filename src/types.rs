//! Channel and configuration types for mixed-signal acquisition.
//!
//! Channels are created once when a device context is built and are immutable
//! afterwards. Analog channels carry a measured-quantity tag so the output
//! sink can label samples without knowing the device.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// The physical quantity measured by an analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quantity {
    Volts,
    MilliVolts,
    Amperes,
    MilliAmperes,
    MicroAmperes,
}

impl Quantity {
    /// Unit suffix used when labelling samples.
    pub fn unit(&self) -> &'static str {
        match self {
            Quantity::Volts => "V",
            Quantity::MilliVolts => "mV",
            Quantity::Amperes => "A",
            Quantity::MilliAmperes => "mA",
            Quantity::MicroAmperes => "uA",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit())
    }
}

/// Kind of an acquisition channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelKind {
    /// Analog voltage channel.
    Voltage,
    /// Analog current channel.
    Current,
    /// Single digital logic line.
    Logic,
}

/// One acquisition channel of the device.
///
/// Identity is `(kind, index)`; indices count per kind, starting at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    index: u8,
    kind: ChannelKind,
    quantity: Option<Quantity>,
}

impl Channel {
    pub(crate) fn analog(index: u8, kind: ChannelKind, quantity: Quantity) -> Self {
        Self {
            index,
            kind,
            quantity: Some(quantity),
        }
    }

    pub(crate) fn logic(index: u8) -> Self {
        Self {
            index,
            kind: ChannelKind::Logic,
            quantity: None,
        }
    }

    /// Per-kind channel index.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Channel kind.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Measured quantity; `None` for logic channels.
    pub fn quantity(&self) -> Option<Quantity> {
        self.quantity
    }

    /// Stable display label: `V0`, `I0`, `D3`, ...
    pub fn label(&self) -> String {
        let prefix = match self.kind {
            ChannelKind::Voltage => 'V',
            ChannelKind::Current => 'I',
            ChannelKind::Logic => 'D',
        };
        format!("{}{}", prefix, self.index)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Static configuration of one acquisition session.
///
/// The default matches the ESP32-S3 analyzer firmware: one voltage channel,
/// one current channel, eight logic lines, 10 kHz sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceConfig {
    /// Sample rate in Hz.
    pub samplerate: u32,
    /// Number of analog voltage channels.
    pub voltage_channels: u8,
    /// Number of analog current channels.
    pub current_channels: u8,
    /// Number of digital logic lines.
    pub logic_channels: u8,
    /// Quantity reported for voltage channels.
    pub voltage_quantity: Quantity,
    /// Quantity reported for current channels.
    pub current_quantity: Quantity,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            samplerate: 10_000,
            voltage_channels: 1,
            current_channels: 1,
            logic_channels: 8,
            voltage_quantity: Quantity::Volts,
            current_quantity: Quantity::Amperes,
        }
    }
}

impl DeviceConfig {
    /// Bytes per logic sample: one bit per logic line, packed.
    pub fn logic_unit_size(&self) -> usize {
        (self.logic_channels as usize).div_ceil(8)
    }
}

/// Counters maintained by the acquisition pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcqStats {
    /// Packets read from the device.
    pub packets_read: u64,
    /// Packets discarded because they failed to decode.
    pub packets_discarded: u64,
    /// Logic sample units forwarded to the sink.
    pub logic_units_forwarded: u64,
}
