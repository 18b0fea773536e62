//! Fixed-capacity slot ring shared by the acquisition driver and forwarder.
//!
//! The ring is an arena of reusable byte buffers. The driver checks a free
//! slot out, fills it with one raw packet and either hands it back as
//! *filled* (a logic payload awaits draining) or as *free* again (nothing to
//! drain). The forwarder checks filled slots out, drains them and hands them
//! back free.
//!
//! # Ownership model
//!
//! Checking a slot out moves its buffer into the returned handle, so at most
//! one side ever holds a given slot's bytes; the `Mutex` only guards the slot
//! metadata, never payload access. A checked-out slot is invisible to both
//! scans until its handle is returned.
//!
//! # Bounded scans
//!
//! Every scan starts one past the slot last examined by that scan and probes
//! at most one full revolution, returning `None` instead of blocking when
//! nothing matches. Saturation therefore surfaces as backpressure to the
//! caller rather than as an unbounded wait.

use std::ops::Range;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A free slot checked out for filling.
///
/// Read the packet into [`buf`](Self::buf), then return the slot with
/// [`SlotRing::release_filled`] or [`SlotRing::release_free`].
#[derive(Debug)]
pub struct FreeSlot {
    index: usize,
    /// The slot's packet buffer, sized to the ring's slot size.
    pub buf: Box<[u8]>,
}

impl FreeSlot {
    /// Arena index of this slot.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A filled slot checked out for draining.
#[derive(Debug)]
pub struct FilledSlot {
    index: usize,
    /// The slot's packet buffer.
    pub buf: Box<[u8]>,
    /// Read cursor: next undrained byte of the payload.
    pub cursor: usize,
    /// End of the payload within the buffer.
    pub end: usize,
}

impl FilledSlot {
    /// Arena index of this slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes of payload not yet drained.
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.cursor)
    }
}

/// Per-slot metadata. A `None` buffer marks the slot as checked out.
#[derive(Debug)]
struct Slot {
    buf: Option<Box<[u8]>>,
    filled: bool,
    cursor: usize,
    end: usize,
}

#[derive(Debug)]
struct RingState {
    slots: Vec<Slot>,
    /// Slot index the last free-scan stopped at.
    free_scan: usize,
    /// Slot index the last filled-scan stopped at.
    filled_scan: usize,
}

impl RingState {
    /// Walk one revolution starting after `*scan_pos`, returning the first
    /// index whose slot has its buffer parked and matches `filled`.
    fn scan(&mut self, filled: bool) -> Option<usize> {
        let capacity = self.slots.len();
        let start = if filled {
            self.filled_scan
        } else {
            self.free_scan
        };
        for step in 1..=capacity {
            let index = (start + step) % capacity;
            let slot = &self.slots[index];
            if slot.buf.is_some() && slot.filled == filled {
                if filled {
                    self.filled_scan = index;
                } else {
                    self.free_scan = index;
                }
                return Some(index);
            }
        }
        None
    }
}

/// Fixed ring of reusable packet slots.
pub struct SlotRing {
    state: Mutex<RingState>,
    /// Signalled whenever a slot transitions to filled.
    filled_cv: Condvar,
    capacity: usize,
    slot_size: usize,
}

impl SlotRing {
    /// Create a ring of `capacity` slots, each owning a `slot_size` buffer.
    pub fn new(capacity: usize, slot_size: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be nonzero");
        let slots = (0..capacity)
            .map(|_| Slot {
                buf: Some(vec![0u8; slot_size].into_boxed_slice()),
                filled: false,
                cursor: 0,
                end: 0,
            })
            .collect();
        Self {
            state: Mutex::new(RingState {
                slots,
                free_scan: capacity - 1,
                filled_scan: capacity - 1,
            }),
            filled_cv: Condvar::new(),
            capacity,
            slot_size,
        }
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffer size of each slot.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Check out a free slot, or `None` if no slot is free within one
    /// revolution (ring saturated — the producer should back off).
    pub fn acquire_free(&self) -> Option<FreeSlot> {
        let mut state = self.state.lock().unwrap();
        let index = state.scan(false)?;
        let buf = state.slots[index].buf.take().unwrap();
        Some(FreeSlot { index, buf })
    }

    /// Return a slot as filled. `payload` is the byte range of the logic
    /// bitmap within the slot buffer; the forwarder drains exactly that span.
    pub fn release_filled(&self, slot: FreeSlot, payload: Range<usize>) {
        debug_assert!(payload.end <= slot.buf.len());
        {
            let mut state = self.state.lock().unwrap();
            let entry = &mut state.slots[slot.index];
            debug_assert!(entry.buf.is_none(), "slot released twice");
            entry.buf = Some(slot.buf);
            entry.filled = true;
            entry.cursor = payload.start;
            entry.end = payload.end;
        }
        self.filled_cv.notify_one();
    }

    /// Return a slot unfilled (nothing to drain, or the packet was discarded).
    pub fn release_free(&self, slot: FreeSlot) {
        let mut state = self.state.lock().unwrap();
        let entry = &mut state.slots[slot.index];
        debug_assert!(entry.buf.is_none(), "slot released twice");
        entry.buf = Some(slot.buf);
        entry.filled = false;
        entry.cursor = 0;
        entry.end = 0;
    }

    /// Check out a filled slot, or `None` if no slot is filled within one
    /// revolution.
    pub fn find_filled(&self) -> Option<FilledSlot> {
        let mut state = self.state.lock().unwrap();
        self.take_filled(&mut state)
    }

    /// Like [`find_filled`](Self::find_filled), but parks on the ring's
    /// condition variable for up to `timeout` when the ring is empty instead
    /// of making the caller spin.
    pub fn wait_filled(&self, timeout: Duration) -> Option<FilledSlot> {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = self.take_filled(&mut state) {
            return Some(slot);
        }
        let (mut state, _timed_out) = self.filled_cv.wait_timeout(state, timeout).unwrap();
        self.take_filled(&mut state)
    }

    fn take_filled(&self, state: &mut RingState) -> Option<FilledSlot> {
        let index = state.scan(true)?;
        let entry = &mut state.slots[index];
        let buf = entry.buf.take().unwrap();
        Some(FilledSlot {
            index,
            buf,
            cursor: entry.cursor,
            end: entry.end,
        })
    }

    /// Return a fully drained slot to the free pool, resetting its cursor.
    pub fn release_drained(&self, slot: FilledSlot) {
        let mut state = self.state.lock().unwrap();
        let entry = &mut state.slots[slot.index];
        debug_assert!(entry.buf.is_none(), "slot released twice");
        entry.buf = Some(slot.buf);
        entry.filled = false;
        entry.cursor = 0;
        entry.end = 0;
    }

    /// Number of slots currently marked filled (checked-out slots excluded).
    pub fn filled_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .slots
            .iter()
            .filter(|s| s.buf.is_some() && s.filled)
            .count()
    }

    /// True when every slot's buffer is parked in the arena. Used to verify
    /// nothing leaked after shutdown.
    pub fn all_slots_parked(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.slots.iter().all(|s| s.buf.is_some())
    }
}
