//! Wire protocol for the ESP32-S3 mixed-signal analyzer.
//!
//! The device streams fixed-size bulk packets on the data-IN endpoint. Every
//! packet starts with a 9-byte header whose first byte is the frame type tag;
//! the remaining header bytes are reserved by the firmware. Three frame
//! layouts exist:
//!
//! | tag | frame  | total length | payload                                      |
//! |-----|--------|--------------|----------------------------------------------|
//! | 1   | Logic  | 64           | opaque logic bitmap, bytes `9..64`           |
//! | 2   | Analog | 9 + 5·n      | `n` analog sub-records                       |
//! | 3   | Mixed  | 64           | 2 analog sub-records, then bitmap `19..64`   |
//!
//! An analog sub-record is `[tag:1][value:f32-LE]`. The top bit of the tag
//! selects voltage (set) or current (clear); the low seven bits are the
//! channel index.
//!
//! Decoding is pure: the decoder validates the tag and length and splits the
//! payload, nothing more. Draining the logic bitmap byte-by-byte is the
//! forwarder's job.

use crate::types::ChannelKind;

// =============================================================================
// Device identity and endpoints
// =============================================================================

/// USB vendor ID of the analyzer.
pub const VENDOR_ID: u16 = 0x1a86;
/// USB product ID of the analyzer.
pub const PRODUCT_ID: u16 = 0x5678;

/// Interface carrying the sample data endpoints.
pub const DATA_INTERFACE: u8 = 0;
/// Bulk IN endpoint the device streams sample packets on.
pub const DATA_ENDPOINT_IN: u8 = 0x81;
/// Bulk OUT endpoint paired with the data interface.
pub const DATA_ENDPOINT_OUT: u8 = 0x01;

/// Interface carrying the control endpoints.
pub const CONTROL_INTERFACE: u8 = 1;
/// Bulk IN endpoint for control responses.
pub const CONTROL_ENDPOINT_IN: u8 = 0x82;
/// Bulk OUT endpoint start/stop commands are written to.
pub const CONTROL_ENDPOINT_OUT: u8 = 0x02;

/// Single-byte command instructing the device to begin streaming.
/// There is no stop command; the device stops when the host stops reading.
pub const START_STREAMING: u8 = 1;

// =============================================================================
// Frame layout
// =============================================================================

/// Size of every packet header, type tag included.
pub const HEADER_SIZE: usize = 9;
/// Offset of the frame type tag within the header.
pub const TYPE_OFFSET: usize = 0;
/// Fixed size of logic and mixed packets (and the transfer buffer size).
pub const PACKET_SIZE: usize = 64;
/// Size of one analog sub-record: tag byte plus little-endian f32.
pub const ANALOG_RECORD_SIZE: usize = 5;
/// Number of analog sub-records carried in a mixed frame.
pub const MIXED_ANALOG_RECORDS: usize = 2;
/// Offset of the logic bitmap within a logic frame.
pub const LOGIC_PAYLOAD_OFFSET: usize = HEADER_SIZE;
/// Offset of the logic bitmap within a mixed frame.
pub const MIXED_PAYLOAD_OFFSET: usize = HEADER_SIZE + MIXED_ANALOG_RECORDS * ANALOG_RECORD_SIZE;

/// Frame type tag values.
pub const TYPE_LOGIC: u8 = 1;
pub const TYPE_ANALOG: u8 = 2;
pub const TYPE_MIXED: u8 = 3;

/// Mask selecting the voltage/current bit of an analog record tag.
const RECORD_KIND_MASK: u8 = 0x80;
/// Mask selecting the channel index of an analog record tag.
const RECORD_INDEX_MASK: u8 = 0x7f;

// =============================================================================
// Decoded frames
// =============================================================================

/// One decoded analog sub-record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogEntry {
    /// `Voltage` or `Current`; never `Logic`.
    pub kind: ChannelKind,
    /// Per-kind channel index, 0..=127.
    pub index: u8,
    /// Measured value.
    pub value: f32,
}

/// The decoded contents of one raw packet.
///
/// Logic bitmaps borrow from the raw buffer; the caller keeps the buffer
/// alive (in practice: the ring slot) while the payload is drained.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<'a> {
    /// Pure logic packet.
    Logic { bitmap: &'a [u8] },
    /// Pure analog packet.
    Analog { entries: Vec<AnalogEntry> },
    /// Analog records and a logic bitmap in one packet.
    Mixed {
        entries: Vec<AnalogEntry>,
        bitmap: &'a [u8],
    },
}

impl Frame<'_> {
    /// Byte offset of the logic bitmap within the raw packet, if any.
    pub fn bitmap_offset(&self) -> Option<usize> {
        match self {
            Frame::Logic { .. } => Some(LOGIC_PAYLOAD_OFFSET),
            Frame::Mixed { .. } => Some(MIXED_PAYLOAD_OFFSET),
            Frame::Analog { .. } => None,
        }
    }
}

/// Errors produced while classifying or splitting a raw packet.
///
/// Both variants are non-fatal: the caller logs, discards the packet and
/// keeps acquiring.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Total packet length matches no declared frame size.
    #[error("unexpected packet length {0}")]
    UnexpectedLength(usize),

    /// The type tag is not one of the known frame tags.
    #[error("unrecognized frame type tag {0:#04x}")]
    UnexpectedType(u8),
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one raw packet into a typed frame.
pub fn decode(raw: &[u8]) -> Result<Frame<'_>, DecodeError> {
    if raw.len() <= HEADER_SIZE {
        return Err(DecodeError::UnexpectedLength(raw.len()));
    }

    match raw[TYPE_OFFSET] {
        TYPE_LOGIC => {
            if raw.len() != PACKET_SIZE {
                return Err(DecodeError::UnexpectedLength(raw.len()));
            }
            Ok(Frame::Logic {
                bitmap: &raw[LOGIC_PAYLOAD_OFFSET..],
            })
        }
        TYPE_ANALOG => {
            let region = raw.len() - HEADER_SIZE;
            if raw.len() > PACKET_SIZE || region % ANALOG_RECORD_SIZE != 0 {
                return Err(DecodeError::UnexpectedLength(raw.len()));
            }
            Ok(Frame::Analog {
                entries: decode_records(&raw[HEADER_SIZE..]),
            })
        }
        TYPE_MIXED => {
            if raw.len() != PACKET_SIZE {
                return Err(DecodeError::UnexpectedLength(raw.len()));
            }
            Ok(Frame::Mixed {
                entries: decode_records(&raw[HEADER_SIZE..MIXED_PAYLOAD_OFFSET]),
                bitmap: &raw[MIXED_PAYLOAD_OFFSET..],
            })
        }
        tag => Err(DecodeError::UnexpectedType(tag)),
    }
}

/// Split an analog region into sub-records.
///
/// The region length must be a multiple of [`ANALOG_RECORD_SIZE`]; callers
/// validate that before slicing.
fn decode_records(region: &[u8]) -> Vec<AnalogEntry> {
    region
        .chunks_exact(ANALOG_RECORD_SIZE)
        .map(|record| {
            let kind = if record[0] & RECORD_KIND_MASK != 0 {
                ChannelKind::Voltage
            } else {
                ChannelKind::Current
            };
            let value = f32::from_le_bytes([record[1], record[2], record[3], record[4]]);
            AnalogEntry {
                kind,
                index: record[0] & RECORD_INDEX_MASK,
                value,
            }
        })
        .collect()
}

// =============================================================================
// Encoding
//
// Used by tests and by mock transports standing in for the device. The
// firmware is the producing side in production.
// =============================================================================

/// Encode one analog sub-record.
pub fn encode_analog_record(kind: ChannelKind, index: u8, value: f32) -> [u8; ANALOG_RECORD_SIZE] {
    debug_assert!(index <= RECORD_INDEX_MASK);
    let tag = match kind {
        ChannelKind::Voltage => RECORD_KIND_MASK | index,
        _ => index,
    };
    let v = value.to_le_bytes();
    [tag, v[0], v[1], v[2], v[3]]
}

/// Encode a pure analog packet carrying the given sub-records.
pub fn encode_analog_frame(entries: &[AnalogEntry]) -> Vec<u8> {
    let mut packet = vec![0u8; HEADER_SIZE];
    packet[TYPE_OFFSET] = TYPE_ANALOG;
    for entry in entries {
        packet.extend_from_slice(&encode_analog_record(entry.kind, entry.index, entry.value));
    }
    packet
}

/// Encode a pure logic packet. The bitmap is truncated or zero-padded to
/// fill the fixed packet size.
pub fn encode_logic_frame(bitmap: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; PACKET_SIZE];
    packet[TYPE_OFFSET] = TYPE_LOGIC;
    let n = bitmap.len().min(PACKET_SIZE - LOGIC_PAYLOAD_OFFSET);
    packet[LOGIC_PAYLOAD_OFFSET..LOGIC_PAYLOAD_OFFSET + n].copy_from_slice(&bitmap[..n]);
    packet
}

/// Encode a mixed packet: exactly [`MIXED_ANALOG_RECORDS`] analog records
/// followed by the logic bitmap (truncated or zero-padded).
pub fn encode_mixed_frame(entries: &[AnalogEntry; MIXED_ANALOG_RECORDS], bitmap: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; PACKET_SIZE];
    packet[TYPE_OFFSET] = TYPE_MIXED;
    for (i, entry) in entries.iter().enumerate() {
        let offset = HEADER_SIZE + i * ANALOG_RECORD_SIZE;
        packet[offset..offset + ANALOG_RECORD_SIZE]
            .copy_from_slice(&encode_analog_record(entry.kind, entry.index, entry.value));
    }
    let n = bitmap.len().min(PACKET_SIZE - MIXED_PAYLOAD_OFFSET);
    packet[MIXED_PAYLOAD_OFFSET..MIXED_PAYLOAD_OFFSET + n].copy_from_slice(&bitmap[..n]);
    packet
}
