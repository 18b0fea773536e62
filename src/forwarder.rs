//! Forwarder: the consuming side of the pipeline.
//!
//! A dedicated thread scans the ring for filled slots and streams their logic
//! bitmaps out to the sink in fixed-size units, one unit per sample. Each
//! unit is accompanied by the current value of every analog channel, read
//! from the device context at forward-time — latest-value semantics, not
//! per-frame buffering.

use std::sync::Arc;
use std::time::Duration;

use crate::context::DeviceContext;
use crate::ring::{FilledSlot, SlotRing};
use crate::sink::OutputSink;
use crate::types::Channel;

/// How long one empty-ring wait parks on the ring's condition variable
/// before rechecking the run flag.
const EMPTY_WAIT: Duration = Duration::from_micros(500);

/// The consuming half of the acquisition pipeline.
pub struct Forwarder<S: OutputSink> {
    ctx: Arc<DeviceContext>,
    ring: Arc<SlotRing>,
    sink: S,
    units_forwarded: u64,
}

impl<S: OutputSink> Forwarder<S> {
    pub fn new(ctx: Arc<DeviceContext>, ring: Arc<SlotRing>, sink: S) -> Self {
        Self {
            ctx,
            ring,
            sink,
            units_forwarded: 0,
        }
    }

    /// Drain loop. Runs while the run flag is up, then drains whatever is
    /// already filled, closes the sink session and returns.
    pub fn run(&mut self) {
        while self.ctx.is_running() {
            match self.ring.wait_filled(EMPTY_WAIT) {
                Some(slot) => self.drain_slot(slot),
                None => continue,
            }
        }

        // Stop drains rather than discards: anything the driver published
        // before the flag cleared still reaches the sink.
        while let Some(slot) = self.ring.find_filled() {
            self.drain_slot(slot);
        }

        if let Err(err) = self.sink.end() {
            log::warn!("failed to close sink session: {err}");
        }
        log::debug!("forwarder exited: {} logic units", self.units_forwarded);
    }

    /// Stream one slot's logic payload out unit by unit, then return the
    /// slot to the free pool. A sink error abandons the rest of this slot's
    /// payload but never the loop.
    fn drain_slot(&mut self, mut slot: FilledSlot) {
        let unit = self.ctx.logic_unit_size();
        if unit == 0 {
            self.ring.release_drained(slot);
            return;
        }

        let analog: Vec<Channel> = self.ctx.analog_channels().cloned().collect();
        while slot.remaining() >= unit {
            for channel in &analog {
                if let Some(value) = self.ctx.analog_value(channel) {
                    if let Err(err) = self.sink.emit_analog(channel, value) {
                        log::warn!("sink rejected analog sample on {channel}: {err}");
                        self.ring.release_drained(slot);
                        return;
                    }
                }
            }
            let next = slot.cursor + unit;
            if let Err(err) = self.sink.emit_logic(&slot.buf[slot.cursor..next]) {
                log::warn!("sink rejected logic unit: {err}");
                self.ring.release_drained(slot);
                return;
            }
            slot.cursor = next;
            self.units_forwarded += 1;
        }
        self.ring.release_drained(slot);
    }

    /// Logic units forwarded so far.
    pub fn units_forwarded(&self) -> u64 {
        self.units_forwarded
    }

    /// Open the sink session. Called by the session before the loop starts.
    pub(crate) fn begin_sink(&mut self) -> crate::Result<()> {
        self.sink.begin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::{AnalogEntry, HEADER_SIZE, PACKET_SIZE};
    use crate::types::{ChannelKind, DeviceConfig};
    use std::sync::Mutex;
    use std::thread;

    #[derive(Debug, PartialEq)]
    enum Emitted {
        Analog(String, f32),
        Logic(Vec<u8>),
        End,
    }

    #[derive(Clone)]
    struct CollectingSink {
        emitted: Arc<Mutex<Vec<Emitted>>>,
        fail_after_units: Option<usize>,
        units: usize,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                emitted: Arc::new(Mutex::new(Vec::new())),
                fail_after_units: None,
                units: 0,
            }
        }
    }

    impl OutputSink for CollectingSink {
        fn begin(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn emit_analog(&mut self, channel: &Channel, value: f32) -> crate::Result<()> {
            self.emitted
                .lock()
                .unwrap()
                .push(Emitted::Analog(channel.label(), value));
            Ok(())
        }

        fn emit_logic(&mut self, unit: &[u8]) -> crate::Result<()> {
            if self.fail_after_units == Some(self.units) {
                return Err(Error::msg("sink full"));
            }
            self.units += 1;
            self.emitted
                .lock()
                .unwrap()
                .push(Emitted::Logic(unit.to_vec()));
            Ok(())
        }

        fn end(&mut self) -> crate::Result<()> {
            self.emitted.lock().unwrap().push(Emitted::End);
            Ok(())
        }
    }

    fn setup() -> (Arc<DeviceContext>, Arc<SlotRing>) {
        (
            Arc::new(DeviceContext::new(DeviceConfig::default())),
            Arc::new(SlotRing::new(4, PACKET_SIZE)),
        )
    }

    fn fill_slot(ring: &SlotRing, payload: &[u8]) {
        let mut slot = ring.acquire_free().unwrap();
        slot.buf[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
        ring.release_filled(slot, HEADER_SIZE..HEADER_SIZE + payload.len());
    }

    #[test]
    fn test_drains_units_with_analog_values_alongside() {
        let (ctx, ring) = setup();
        ctx.store_analog(&AnalogEntry {
            kind: ChannelKind::Voltage,
            index: 0,
            value: 3.3,
        });
        fill_slot(&ring, &[0xaa, 0xbb]);

        let sink = CollectingSink::new();
        let emitted = Arc::clone(&sink.emitted);
        let mut forwarder = Forwarder::new(Arc::clone(&ctx), Arc::clone(&ring), sink);
        let slot = ring.find_filled().unwrap();
        forwarder.drain_slot(slot);

        let emitted = emitted.lock().unwrap();
        // Unit size is 1 byte (8 logic lines): two units, each preceded by
        // the two analog channels.
        assert_eq!(
            *emitted,
            vec![
                Emitted::Analog("V0".into(), 3.3),
                Emitted::Analog("I0".into(), 0.0),
                Emitted::Logic(vec![0xaa]),
                Emitted::Analog("V0".into(), 3.3),
                Emitted::Analog("I0".into(), 0.0),
                Emitted::Logic(vec![0xbb]),
            ]
        );
        assert_eq!(forwarder.units_forwarded(), 2);
        assert!(ring.all_slots_parked());
    }

    #[test]
    fn test_two_byte_units_for_wide_logic() {
        let mut config = DeviceConfig::default();
        config.logic_channels = 16;
        let ctx = Arc::new(DeviceContext::new(config));
        let ring = Arc::new(SlotRing::new(4, PACKET_SIZE));
        fill_slot(&ring, &[1, 2, 3, 4, 5]); // 5 bytes: two full units, one leftover

        let sink = CollectingSink::new();
        let emitted = Arc::clone(&sink.emitted);
        let mut forwarder = Forwarder::new(ctx, Arc::clone(&ring), sink);
        let slot = ring.find_filled().unwrap();
        forwarder.drain_slot(slot);

        let units: Vec<Vec<u8>> = emitted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Emitted::Logic(u) => Some(u.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(units, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_sink_error_abandons_slot_but_returns_it() {
        let (ctx, ring) = setup();
        fill_slot(&ring, &[0x01, 0x02, 0x03]);

        let mut sink = CollectingSink::new();
        sink.fail_after_units = Some(1);
        let mut forwarder = Forwarder::new(ctx, Arc::clone(&ring), sink);
        let slot = ring.find_filled().unwrap();
        forwarder.drain_slot(slot);

        assert_eq!(forwarder.units_forwarded(), 1);
        assert!(ring.all_slots_parked());
        assert_eq!(ring.filled_count(), 0);
    }

    #[test]
    fn test_run_drains_remaining_slots_after_stop() {
        let (ctx, ring) = setup();
        fill_slot(&ring, &[0x11]);
        fill_slot(&ring, &[0x22]);

        let sink = CollectingSink::new();
        let emitted = Arc::clone(&sink.emitted);
        // Run flag is already down: run() must still drain both slots and
        // close the sink.
        let mut forwarder = Forwarder::new(Arc::clone(&ctx), Arc::clone(&ring), sink);
        forwarder.run();

        let emitted = emitted.lock().unwrap();
        let logic: Vec<&Emitted> = emitted
            .iter()
            .filter(|e| matches!(e, Emitted::Logic(_)))
            .collect();
        assert_eq!(logic.len(), 2);
        assert_eq!(emitted.last(), Some(&Emitted::End));
        assert!(ring.all_slots_parked());
    }

    #[test]
    fn test_run_loop_consumes_while_running() {
        let (ctx, ring) = setup();
        ctx.set_running();

        let sink = CollectingSink::new();
        let emitted = Arc::clone(&sink.emitted);
        let handle = {
            let ctx = Arc::clone(&ctx);
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut forwarder = Forwarder::new(ctx, ring, sink);
                forwarder.run();
            })
        };

        fill_slot(&ring, &[0x77]);
        // Wait until the forwarder picked it up, then stop.
        for _ in 0..1000 {
            if ring.filled_count() == 0 && ring.all_slots_parked() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        ctx.request_stop();
        handle.join().unwrap();

        let emitted = emitted.lock().unwrap();
        assert!(emitted.contains(&Emitted::Logic(vec![0x77])));
        assert_eq!(emitted.last(), Some(&Emitted::End));
    }
}
