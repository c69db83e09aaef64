// SPDX-License-Identifier: GPL-2.0-or-later
//! Vulkan presentation adapter for a frontend-owned device.
//!
//! The frontend creates the instance, physical device, logical device and
//! queue, and paces every frame through its sync-index machinery. This
//! crate impersonates a regular renderer window/instance pair on top of
//! those borrowed handles: it owns only its output image, command pool and
//! per-frame bookkeeping, and defers all real synchronization to the host.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod binding;
mod caps;
mod cursor;
mod gate;
mod instance;
mod present;

pub use caps::CapabilityRecord;
pub use cursor::VulkanCursor;
pub use gate::SubmissionGate;
pub use instance::AdapterInstance;
pub use present::{Frame, PresentationWindow, FRAME_COUNT, OUTPUT_FORMAT};

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("hardware render interface not available")]
    InterfaceUnavailable,
    #[error("frontend exposed a non-Vulkan render interface (type {0})")]
    WrongInterface(u32),
    #[error("frontend provided a null {0}")]
    NullHandle(&'static str),
    #[error("invalid output dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("no suitable memory type for the output image")]
    NoSuitableMemoryType,
    #[error("Vulkan API error: {0}")]
    Api(#[from] vk::Result),
}
