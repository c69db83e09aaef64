// SPDX-License-Identifier: GPL-2.0-or-later
//! Pointer/touch tracking: fuses mouse, absolute pointer and analog
//! stick input into one cursor over the bottom screen, and renders it
//! through the backend matching the active graphics API.
#![deny(unsafe_op_in_unsafe_fn)]

mod analog;
mod tracker;

pub use analog::{shape_deflection, speed_multiplier, SPEED_LEVELS};
pub use tracker::{CursorBackend, PointerTracker};
