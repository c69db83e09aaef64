// SPDX-License-Identifier: GPL-2.0-or-later
//! Frontend ABI surface consumed by the adapter: the hardware-render
//! Vulkan interface and the input-polling contract.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod input;
pub mod vulkan;
