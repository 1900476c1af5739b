//! Probe slot buffers, optionally registered with io_uring.
//!
//! One element-sized buffer per probe slot, carved out of a single
//! page-aligned anonymous mapping. When registered via
//! `IORING_REGISTER_BUFFERS` the slots are referenced by index in
//! `ReadFixed` SQEs and the kernel skips per-I/O page pinning.
//!
//! Slot lifecycle: `Free -> InFlight -> Free`. The kernel writes a slot
//! while it is in flight, so its bytes are only read back in
//! [`SlotBufferPool::complete`], after the completion for that slot has
//! been reaped.

use std::io;
use std::ptr::NonNull;

use nix::libc;

use crate::interval::ELEMENT_WIDTH;

/// Page size used to round the mapping
pub const PAGE_SIZE: usize = 4096;

/// Bytes per slot
pub const SLOT_SIZE: usize = ELEMENT_WIDTH as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    InFlight,
}

/// Fixed pool of probe buffers, one per slot.
pub struct SlotBufferPool {
    memory: NonNull<u8>,
    mapped_len: usize,
    states: Vec<SlotState>,
    in_flight: usize,
}

impl SlotBufferPool {
    /// Map a pool with `slots` element buffers.
    pub fn new(slots: usize) -> io::Result<Self> {
        if slots == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "slot pool cannot be empty"));
        }
        let mapped_len = (slots * SLOT_SIZE).div_ceil(PAGE_SIZE) * PAGE_SIZE;
        let memory = Self::map_anonymous(mapped_len)?;

        Ok(Self { memory, mapped_len, states: vec![SlotState::Free; slots], in_flight: 0 })
    }

    fn map_anonymous(len: usize) -> io::Result<NonNull<u8>> {
        use libc::{mmap, MAP_ANONYMOUS, MAP_PRIVATE, PROT_READ, PROT_WRITE};

        // SAFETY: anonymous private mapping, no fd, kernel picks the address
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned null"))
    }

    /// Number of slots
    pub fn slots(&self) -> usize {
        self.states.len()
    }

    /// Slots currently owned by the kernel
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// One iovec per slot, in slot order, for `register_buffers`.
    pub fn iovecs(&self) -> Vec<libc::iovec> {
        (0..self.slots())
            .map(|slot| libc::iovec { iov_base: self.slot_ptr(slot).cast(), iov_len: SLOT_SIZE })
            .collect()
    }

    fn slot_ptr(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.slots());
        // SAFETY: slot < slots and slots * SLOT_SIZE <= mapped_len
        unsafe { self.memory.as_ptr().add(slot * SLOT_SIZE) }
    }

    /// Hand `slot` to the kernel. Returns the buffer pointer for the SQE.
    ///
    /// `None` if the slot does not exist or is already in flight.
    pub fn begin(&mut self, slot: usize) -> Option<*mut u8> {
        match self.states.get_mut(slot) {
            Some(state @ SlotState::Free) => {
                *state = SlotState::InFlight;
                self.in_flight += 1;
                Some(self.slot_ptr(slot))
            }
            _ => None,
        }
    }

    /// Take `slot` back after its completion was reaped and read its value.
    ///
    /// `None` if the slot was not in flight (stray or duplicate token).
    pub fn complete(&mut self, slot: usize) -> Option<u64> {
        self.release(slot)?;
        let mut bytes = [0u8; SLOT_SIZE];
        // SAFETY: the kernel finished writing this slot (its CQE was reaped)
        // and nothing else holds a reference into the mapping
        unsafe {
            std::ptr::copy_nonoverlapping(self.slot_ptr(slot), bytes.as_mut_ptr(), SLOT_SIZE);
        }
        Some(u64::from_ne_bytes(bytes))
    }

    /// Take `slot` back without reading it (failed or short read).
    pub fn release(&mut self, slot: usize) -> Option<()> {
        match self.states.get_mut(slot) {
            Some(state @ SlotState::InFlight) => {
                *state = SlotState::Free;
                self.in_flight -= 1;
                Some(())
            }
            _ => None,
        }
    }
}

impl Drop for SlotBufferPool {
    fn drop(&mut self) {
        // SAFETY: we mapped exactly mapped_len bytes at memory
        unsafe {
            libc::munmap(self.memory.as_ptr().cast(), self.mapped_len);
        }
    }
}
