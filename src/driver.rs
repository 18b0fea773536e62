//! Acquisition driver: the producing side of the pipeline.
//!
//! The driver runs synchronous polling mode on a dedicated thread: claim a
//! free ring slot, perform one bounded blocking bulk read, decode, fold any
//! analog values into the device context, and either publish the slot as
//! filled (a logic bitmap awaits the forwarder) or return it free right away
//! (pure-analog packets leave nothing to drain).
//!
//! Device preparation and teardown bracket the read loop. Preparation that
//! fails partway unwinds every interface already claimed or detached, in
//! reverse, so no partial-start state survives an error. Teardown tolerates
//! and logs release failures instead of propagating them.

use std::sync::Arc;
use std::time::Duration;

use crate::context::DeviceContext;
use crate::protocol::{
    decode, Frame, CONTROL_ENDPOINT_OUT, CONTROL_INTERFACE, DATA_ENDPOINT_IN, DATA_INTERFACE,
    PACKET_SIZE, START_STREAMING,
};
use crate::ring::SlotRing;
use crate::transport::{self, Transport};
use crate::types::AcqStats;

/// Timeout for one data-endpoint bulk read. Expiry just means the device had
/// nothing to send within the window; the loop retries.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Timeout for control-endpoint transfers.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// USB configuration the analyzer firmware exposes its interfaces on.
const ACTIVE_CONFIGURATION: u8 = 1;

/// Back-off applied when the ring has no free slot (consumer is behind).
const SATURATED_BACKOFF: Duration = Duration::from_micros(500);

/// The producing half of the acquisition pipeline.
pub struct AcquisitionDriver<T: Transport> {
    transport: T,
    ctx: Arc<DeviceContext>,
    ring: Arc<SlotRing>,
    /// Interfaces claimed so far, in claim order.
    claimed: Vec<u8>,
    /// Interfaces whose kernel driver we detached, in detach order.
    detached: Vec<u8>,
    stats: AcqStats,
}

impl<T: Transport> AcquisitionDriver<T> {
    pub fn new(transport: T, ctx: Arc<DeviceContext>, ring: Arc<SlotRing>) -> Self {
        Self {
            transport,
            ctx,
            ring,
            claimed: Vec::new(),
            detached: Vec::new(),
            stats: AcqStats::default(),
        }
    }

    /// Prepare the device for streaming: reset, select the configuration,
    /// take over the data and control interfaces from the kernel, and send
    /// the start command.
    ///
    /// On error every claim and detach already performed is undone in
    /// reverse order before the error propagates.
    pub fn prepare(&mut self) -> transport::Result<()> {
        if let Err(err) = self.prepare_inner() {
            self.unwind_interfaces();
            return Err(err);
        }
        Ok(())
    }

    fn prepare_inner(&mut self) -> transport::Result<()> {
        self.transport.reset()?;
        self.transport
            .set_active_configuration(ACTIVE_CONFIGURATION)?;

        for interface in [DATA_INTERFACE, CONTROL_INTERFACE] {
            if matches!(self.transport.kernel_driver_active(interface), Ok(true)) {
                self.transport.detach_kernel_driver(interface)?;
                self.detached.push(interface);
            }
            self.transport.claim_interface(interface)?;
            self.claimed.push(interface);
        }

        self.transport
            .write_bulk(CONTROL_ENDPOINT_OUT, &[START_STREAMING], CONTROL_TIMEOUT)?;
        log::debug!("device prepared, streaming started");
        Ok(())
    }

    /// Run the read loop until the run flag clears or the transport fails
    /// fatally. The termination check sits at the top of the loop: once the
    /// flag is down no further read is issued.
    pub fn run(&mut self) {
        while self.ctx.is_running() {
            if let Err(err) = self.poll_once() {
                log::error!("data transfer failed: {err}");
                break;
            }
        }
        log::debug!(
            "driver loop exited: {} packets read, {} discarded",
            self.stats.packets_read,
            self.stats.packets_discarded
        );
    }

    /// One polling step: slot, read, decode, publish.
    ///
    /// Decode failures and read timeouts are absorbed here (the slot reverts
    /// to free); only fatal transport errors propagate.
    pub fn poll_once(&mut self) -> transport::Result<()> {
        let Some(mut slot) = self.ring.acquire_free() else {
            // Ring saturated: the forwarder is behind. Stall briefly rather
            // than growing anything.
            std::thread::sleep(SATURATED_BACKOFF);
            return Ok(());
        };

        let read_len = PACKET_SIZE.min(slot.buf.len());
        let n = match self
            .transport
            .read_bulk(DATA_ENDPOINT_IN, &mut slot.buf[..read_len], READ_TIMEOUT)
        {
            Ok(n) => n,
            Err(err) if err.is_timeout() => {
                self.ring.release_free(slot);
                return Ok(());
            }
            Err(err) => {
                self.ring.release_free(slot);
                return Err(err);
            }
        };

        if n == 0 {
            self.ring.release_free(slot);
            return Ok(());
        }
        self.stats.packets_read += 1;

        match decode(&slot.buf[..n]) {
            Ok(frame) => {
                let payload = frame.bitmap_offset().map(|offset| offset..n);
                let entries = match frame {
                    Frame::Analog { entries } | Frame::Mixed { entries, .. } => entries,
                    Frame::Logic { .. } => Vec::new(),
                };
                for entry in &entries {
                    self.ctx.store_analog(entry);
                }
                match payload {
                    Some(range) => self.ring.release_filled(slot, range),
                    None => self.ring.release_free(slot),
                }
            }
            Err(err) => {
                log::warn!("discarding packet ({n} bytes): {err}");
                self.stats.packets_discarded += 1;
                self.ring.release_free(slot);
            }
        }
        Ok(())
    }

    /// Release everything [`prepare`](Self::prepare) acquired, in reverse
    /// order. Failures are logged, never propagated: a device that vanished
    /// mid-session would otherwise make stop impossible.
    pub fn teardown(&mut self) {
        self.unwind_interfaces();
        log::debug!("device released");
    }

    fn unwind_interfaces(&mut self) {
        while let Some(interface) = self.claimed.pop() {
            if let Err(err) = self.transport.release_interface(interface) {
                log::warn!("failed to release interface {interface}: {err}");
            }
        }
        while let Some(interface) = self.detached.pop() {
            if let Err(err) = self.transport.attach_kernel_driver(interface) {
                log::warn!("failed to reattach kernel driver on interface {interface}: {err}");
            }
        }
    }

    /// Counters maintained by the read loop.
    pub fn stats(&self) -> AcqStats {
        self.stats
    }
}

impl<T: Transport> Drop for AcquisitionDriver<T> {
    fn drop(&mut self) {
        // Backstop for drivers dropped without an explicit teardown();
        // unwinding is idempotent.
        self.unwind_interfaces();
    }
}
