// SPDX-License-Identifier: GPL-2.0-or-later
//! Host-synchronized stand-in for the renderer's master semaphore.
//!
//! The frontend serializes and paces all GPU work across its own frame
//! loop; duplicating that with local fences or semaphores would be
//! redundant and could deadlock a queue this adapter does not control.
//! So the gate keeps the semaphore interface shape — tick out, tick
//! completed — while every wait resolves immediately.

use crate::binding;
use crate::AdapterError;
use ash::vk;
use portable_atomic::AtomicU64;
use std::slice;
use std::sync::atomic::Ordering;
use tracing::error;

pub struct SubmissionGate {
    current_tick: AtomicU64,
    completed_tick: AtomicU64,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGate {
    pub fn new() -> Self {
        SubmissionGate {
            current_tick: AtomicU64::new(1),
            completed_tick: AtomicU64::new(0),
        }
    }

    /// Tick value the next submission will sign with.
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// Last tick published as complete. Monotonic.
    pub fn completed_tick(&self) -> u64 {
        self.completed_tick.load(Ordering::Acquire)
    }

    /// Claims the next tick for a submission.
    pub fn next_tick(&self) -> u64 {
        self.current_tick.fetch_add(1, Ordering::AcqRel)
    }

    pub fn is_free(&self, tick: u64) -> bool {
        self.completed_tick() >= tick
    }

    /// Catches the completion counter up to the submission counter. The
    /// frontend is trusted to have paced the GPU behind it.
    pub fn refresh(&self) {
        self.completed_tick
            .store(self.current_tick.load(Ordering::Acquire), Ordering::Release);
    }

    /// Never blocks. Real waiting, if any, happens inside the frontend's
    /// `wait_sync_index` during frame acquisition, not here.
    pub fn wait(&self, tick: u64) {
        self.completed_tick.fetch_max(tick, Ordering::AcqRel);
    }

    /// Ends recording and submits on the frontend's queue, under its
    /// queue lock when one is exposed. The caller's semaphores are
    /// dropped on purpose: the frontend cannot interoperate with
    /// semaphores it does not own.
    ///
    /// A lost device here is unrecoverable and aborts the process; other
    /// submit errors propagate after the queue lock is released.
    pub fn submit_work(
        &self,
        device: &ash::Device,
        cmdbuf: vk::CommandBuffer,
        _wait: vk::Semaphore,
        _signal: vk::Semaphore,
        signal_value: u64,
    ) -> Result<(), AdapterError> {
        let Some(host) = binding::current() else {
            error!("Vulkan interface unavailable for command submission");
            return Err(AdapterError::InterfaceUnavailable);
        };

        unsafe { device.end_command_buffer(cmdbuf)? };

        let submit_info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 0,
            command_buffer_count: 1,
            p_command_buffers: &cmdbuf,
            signal_semaphore_count: 0,
            ..Default::default()
        };

        host.lock_queue();
        let result = unsafe {
            device.queue_submit(host.queue(), slice::from_ref(&submit_info), vk::Fence::null())
        };
        host.unlock_queue();

        match result {
            Ok(()) => {}
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                panic!("device lost during submit");
            }
            Err(err) => return Err(err.into()),
        }

        // Completion is published immediately; the frontend owns the
        // real GPU progress.
        self.completed_tick.store(signal_value, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_never_blocks_and_marks_the_tick_done() {
        let gate = SubmissionGate::new();
        assert_eq!(gate.completed_tick(), 0);
        gate.wait(5);
        assert_eq!(gate.completed_tick(), 5);
        assert!(gate.is_free(5));
        assert!(!gate.is_free(6));
    }

    #[test]
    fn completed_tick_is_monotonic() {
        let gate = SubmissionGate::new();
        gate.wait(10);
        gate.wait(3);
        assert_eq!(gate.completed_tick(), 10);
    }

    #[test]
    fn refresh_catches_up_to_submissions() {
        let gate = SubmissionGate::new();
        assert_eq!(gate.next_tick(), 1);
        assert_eq!(gate.next_tick(), 2);
        gate.refresh();
        assert_eq!(gate.completed_tick(), gate.current_tick());
    }
}
