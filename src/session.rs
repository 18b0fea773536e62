//! Acquisition session lifecycle.
//!
//! [`AcquisitionSession::start`] wires the whole pipeline together: device
//! context, slot ring, driver and forwarder, each on its own named thread.
//! The session owns the run flag; clearing it in [`stop`] is the sole
//! cancellation signal both loops observe.
//!
//! The session handle is the lifecycle capability: `stop` consumes it, so
//! stop-without-start and double-stop are unrepresentable. A second
//! concurrent start on the same device surfaces as an interface-claim error
//! from device preparation.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::context::DeviceContext;
use crate::driver::AcquisitionDriver;
use crate::error::{Error, Result};
use crate::forwarder::Forwarder;
use crate::protocol::PACKET_SIZE;
use crate::ring::SlotRing;
use crate::sink::OutputSink;
use crate::transport::Transport;
use crate::types::{Channel, DeviceConfig};

/// Number of reusable packet slots in the ring.
const RING_SLOTS: usize = 4;

/// A running acquisition pipeline.
pub struct AcquisitionSession {
    ctx: Arc<DeviceContext>,
    driver_thread: Option<JoinHandle<()>>,
    forwarder_thread: Option<JoinHandle<()>>,
}

impl AcquisitionSession {
    /// Start acquiring: prepare the device, open the sink session, raise the
    /// run flag and spawn the driver and forwarder threads.
    ///
    /// Any failure unwinds whatever was acquired before it, in reverse
    /// order; no interface claim or sink session outlives a failed start.
    pub fn start<T, S>(transport: T, config: DeviceConfig, sink: S) -> Result<Self>
    where
        T: Transport,
        S: OutputSink,
    {
        let ctx = Arc::new(DeviceContext::new(config));
        let ring = Arc::new(SlotRing::new(RING_SLOTS, PACKET_SIZE));

        let mut driver = AcquisitionDriver::new(transport, Arc::clone(&ctx), Arc::clone(&ring));
        driver.prepare()?;

        let mut forwarder = Forwarder::new(Arc::clone(&ctx), Arc::clone(&ring), sink);
        if let Err(err) = forwarder.begin_sink() {
            driver.teardown();
            return Err(err);
        }

        ctx.set_running();

        let driver_thread = thread::Builder::new()
            .name("acq-driver".into())
            .spawn(move || {
                driver.run();
                driver.teardown();
            })
            .map_err(|err| {
                // The closure (and with it the driver) is dropped; its Drop
                // impl releases the device.
                ctx.request_stop();
                Error::msg(format!("failed to spawn driver thread: {err}"))
            })?;

        let forwarder_thread = match thread::Builder::new()
            .name("acq-forwarder".into())
            .spawn(move || forwarder.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                ctx.request_stop();
                let _ = driver_thread.join();
                return Err(Error::msg(format!(
                    "failed to spawn forwarder thread: {err}"
                )));
            }
        };

        log::debug!("acquisition session started");
        Ok(Self {
            ctx,
            driver_thread: Some(driver_thread),
            forwarder_thread: Some(forwarder_thread),
        })
    }

    /// The session's channel table.
    pub fn channels(&self) -> &[Channel] {
        self.ctx.channels()
    }

    /// Whether the pipeline is still running. Turns false on `stop`, or
    /// early if the session is being torn down.
    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    /// Stop acquiring: clear the run flag and join both threads. The driver
    /// releases the device on its own thread after its loop exits; the
    /// forwarder drains what is left and closes the sink session.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.ctx.request_stop();

        let mut result = Ok(());
        if let Some(handle) = self.driver_thread.take() {
            if handle.join().is_err() {
                result = Err(Error::ThreadPanicked("acq-driver"));
            }
        }
        if let Some(handle) = self.forwarder_thread.take() {
            if handle.join().is_err() && result.is_ok() {
                result = Err(Error::ThreadPanicked("acq-forwarder"));
            }
        }
        log::debug!("acquisition session stopped");
        result
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        // Best-effort stop for sessions dropped without an explicit stop().
        if self.driver_thread.is_some() || self.forwarder_thread.is_some() {
            let _ = self.shutdown();
        }
    }
}
