// SPDX-License-Identifier: GPL-2.0-or-later
//! Process-wide handle to the frontend's Vulkan interface.
//!
//! The frontend may swap the interface pointer without notice (a
//! fullscreen toggle does not always trigger a context reset), so the
//! pointer is re-resolved at every frame acquisition instead of being
//! treated as stable for the adapter's lifetime.

use crate::AdapterError;
use ash::vk;
use retro3ds_env::vulkan::{
    HwRenderInterfaceVulkan, RetroVulkanImage, HW_RENDER_INTERFACE_VULKAN_VERSION,
};
use std::ffi::CStr;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Queries the frontend for its current hardware-render interface; this is
/// the environment callback behind `GET_HW_RENDER_INTERFACE`.
pub type InterfaceResolver =
    Box<dyn Fn() -> Option<NonNull<HwRenderInterfaceVulkan>> + Send + Sync>;

static RESOLVER: Mutex<Option<InterfaceResolver>> = Mutex::new(None);
static CURRENT: AtomicPtr<HwRenderInterfaceVulkan> = AtomicPtr::new(ptr::null_mut());

pub fn install_resolver(resolver: InterfaceResolver) {
    *RESOLVER.lock().unwrap() = Some(resolver);
}

fn resolve() -> Option<NonNull<HwRenderInterfaceVulkan>> {
    let guard = RESOLVER.lock().unwrap();
    guard.as_ref().and_then(|r| r())
}

/// Re-resolves the interface at context reset. Must succeed before the
/// adapter instance is constructed.
pub fn reset_context() -> Result<(), AdapterError> {
    let intf = resolve().ok_or(AdapterError::InterfaceUnavailable)?;
    let raw = unsafe { intf.as_ref() };
    if !raw.is_vulkan() {
        error!("frontend returned interface type {}", raw.interface_type);
        return Err(AdapterError::WrongInterface(raw.interface_type));
    }
    if raw.interface_version != HW_RENDER_INTERFACE_VULKAN_VERSION {
        warn!(
            "frontend interface version {} (expected {})",
            raw.interface_version, HW_RENDER_INTERFACE_VULKAN_VERSION
        );
    }
    CURRENT.store(intf.as_ptr(), Ordering::Release);
    info!("Vulkan render interface bound at {:p}", intf.as_ptr());
    Ok(())
}

/// Drops the cached interface pointer at context destruction.
pub fn clear() {
    CURRENT.store(ptr::null_mut(), Ordering::Release);
}

/// The last successfully resolved interface, if any.
pub fn current() -> Option<HostVulkan> {
    NonNull::new(CURRENT.load(Ordering::Acquire)).map(|intf| HostVulkan { intf })
}

/// Re-resolves the interface and publishes any change. When resolution
/// fails mid-session the cached pointer is kept: a stale interface is
/// recoverable, a crash is not.
pub fn refresh() -> Option<HostVulkan> {
    match resolve() {
        Some(intf) => {
            let previous = CURRENT.swap(intf.as_ptr(), Ordering::AcqRel);
            if previous != intf.as_ptr() && !previous.is_null() {
                info!(
                    "Vulkan interface changed during runtime from {:p} to {:p}",
                    previous,
                    intf.as_ptr()
                );
            }
            Some(HostVulkan { intf })
        }
        None => {
            warn!("failed to re-resolve the Vulkan interface, keeping the cached one");
            current()
        }
    }
}

/// Null-checked accessor over the frontend interface. Copyable view; the
/// pointee is owned by the frontend and outlives the render context.
#[derive(Clone, Copy)]
pub struct HostVulkan {
    intf: NonNull<HwRenderInterfaceVulkan>,
}

// The interface table is written by the frontend before context reset and
// only read from the render thread afterwards.
unsafe impl Send for HostVulkan {}
unsafe impl Sync for HostVulkan {}

impl HostVulkan {
    #[cfg(test)]
    pub(crate) fn for_test(intf: NonNull<HwRenderInterfaceVulkan>) -> Self {
        HostVulkan { intf }
    }

    fn raw(&self) -> &HwRenderInterfaceVulkan {
        unsafe { self.intf.as_ref() }
    }

    pub fn raw_ptr(&self) -> *const HwRenderInterfaceVulkan {
        self.intf.as_ptr()
    }

    pub fn instance(&self) -> vk::Instance {
        self.raw().instance
    }

    pub fn gpu(&self) -> vk::PhysicalDevice {
        self.raw().gpu
    }

    pub fn device(&self) -> vk::Device {
        self.raw().device
    }

    pub fn queue(&self) -> vk::Queue {
        self.raw().queue
    }

    pub fn queue_index(&self) -> u32 {
        self.raw().queue_index
    }

    pub fn get_instance_proc_addr(&self) -> Option<vk::PFN_vkGetInstanceProcAddr> {
        self.raw().get_instance_proc_addr
    }

    /// Whether the frontend's loader can resolve an instance-level entry
    /// point by name.
    pub fn has_instance_fn(&self, name: &CStr) -> bool {
        match self.raw().get_instance_proc_addr {
            Some(gipa) => unsafe { gipa(self.raw().instance, name.as_ptr()).is_some() },
            None => false,
        }
    }

    /// Whether a device-level entry point actually resolved on the
    /// frontend's device. Extension strings alone are not proof: the
    /// frontend may not have loaded the functions behind them.
    pub fn has_device_fn(&self, name: &CStr) -> bool {
        let raw = self.raw();
        let gdpa = raw.get_device_proc_addr.or_else(|| {
            let gipa = raw.get_instance_proc_addr?;
            let looked_up =
                unsafe { gipa(raw.instance, c"vkGetDeviceProcAddr".as_ptr()) }?;
            Some(unsafe {
                std::mem::transmute::<unsafe extern "system" fn(), vk::PFN_vkGetDeviceProcAddr>(
                    looked_up,
                )
            })
        });
        match gdpa {
            Some(gdpa) => unsafe { gdpa(raw.device, name.as_ptr()).is_some() },
            None => false,
        }
    }

    pub fn wait_sync_index(&self) {
        let raw = self.raw();
        if let Some(wait) = raw.wait_sync_index {
            unsafe { wait(raw.handle) };
        }
    }

    pub fn sync_index(&self) -> Option<u32> {
        let raw = self.raw();
        raw.get_sync_index.map(|get| unsafe { get(raw.handle) })
    }

    pub fn sync_index_mask(&self) -> Option<u32> {
        let raw = self.raw();
        raw.get_sync_index_mask.map(|get| unsafe { get(raw.handle) })
    }

    pub fn lock_queue(&self) {
        let raw = self.raw();
        if let Some(lock) = raw.lock_queue {
            unsafe { lock(raw.handle) };
        }
    }

    pub fn unlock_queue(&self) {
        let raw = self.raw();
        if let Some(unlock) = raw.unlock_queue {
            unsafe { unlock(raw.handle) };
        }
    }

    /// Hands the finished image to the frontend with zero wait semaphores;
    /// the frontend performs its own synchronization.
    pub fn set_image(&self, image: *const RetroVulkanImage, src_queue_family: u32) {
        let raw = self.raw();
        if let Some(set_image) = raw.set_image {
            unsafe { set_image(raw.handle, image, 0, ptr::null(), src_queue_family) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro3ds_env::vulkan::HW_RENDER_INTERFACE_VULKAN;
    use std::ffi::c_void;

    struct FakeHost {
        sync_sequence: Vec<u32>,
        cursor: usize,
        waits: u32,
        locks: u32,
        unlocks: u32,
    }

    unsafe extern "C" fn fake_get_sync_index(handle: *mut c_void) -> u32 {
        let state = unsafe { &mut *(handle as *mut FakeHost) };
        let value = state.sync_sequence[state.cursor % state.sync_sequence.len()];
        state.cursor += 1;
        value
    }

    unsafe extern "C" fn fake_wait_sync_index(handle: *mut c_void) {
        let state = unsafe { &mut *(handle as *mut FakeHost) };
        state.waits += 1;
    }

    unsafe extern "C" fn fake_lock_queue(handle: *mut c_void) {
        let state = unsafe { &mut *(handle as *mut FakeHost) };
        state.locks += 1;
    }

    unsafe extern "C" fn fake_unlock_queue(handle: *mut c_void) {
        let state = unsafe { &mut *(handle as *mut FakeHost) };
        state.unlocks += 1;
    }

    fn interface_over(state: &mut FakeHost) -> HwRenderInterfaceVulkan {
        HwRenderInterfaceVulkan {
            interface_type: HW_RENDER_INTERFACE_VULKAN,
            interface_version: HW_RENDER_INTERFACE_VULKAN_VERSION,
            handle: state as *mut FakeHost as *mut c_void,
            instance: vk::Instance::null(),
            gpu: vk::PhysicalDevice::null(),
            device: vk::Device::null(),
            get_device_proc_addr: None,
            get_instance_proc_addr: None,
            queue: vk::Queue::null(),
            queue_index: 0,
            set_image: None,
            get_sync_index: Some(fake_get_sync_index),
            get_sync_index_mask: None,
            set_command_buffers: None,
            wait_sync_index: Some(fake_wait_sync_index),
            lock_queue: Some(fake_lock_queue),
            unlock_queue: Some(fake_unlock_queue),
            set_signal_semaphore: None,
        }
    }

    #[test]
    fn sync_index_follows_the_host_sequence() {
        let mut state = FakeHost {
            sync_sequence: vec![0, 1, 0, 1],
            cursor: 0,
            waits: 0,
            locks: 0,
            unlocks: 0,
        };
        let mut intf = interface_over(&mut state);
        let host = HostVulkan::for_test(NonNull::from(&mut intf));

        let slots: Vec<usize> = (0..4)
            .map(|_| {
                host.wait_sync_index();
                crate::present::slot_for_sync_index(host.sync_index().unwrap(), 2)
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1]);
        assert_eq!(state.waits, 4);
    }

    #[test]
    fn null_callbacks_are_tolerated() {
        let mut state = FakeHost {
            sync_sequence: vec![0],
            cursor: 0,
            waits: 0,
            locks: 0,
            unlocks: 0,
        };
        let mut intf = interface_over(&mut state);
        intf.wait_sync_index = None;
        intf.get_sync_index = None;
        intf.lock_queue = None;
        let host = HostVulkan::for_test(NonNull::from(&mut intf));

        host.wait_sync_index();
        host.lock_queue();
        host.unlock_queue();
        assert_eq!(host.sync_index(), None);
        assert!(!host.has_instance_fn(c"vkGetPhysicalDeviceProperties2"));
        assert!(!host.has_device_fn(c"vkCmdSetCullModeEXT"));
        assert_eq!(state.waits, 0);
        assert_eq!(state.unlocks, 1);
    }

    #[test]
    fn resolver_lifecycle_publishes_and_refreshes() {
        // The only test touching the process-wide binding state.
        let state = Box::leak(Box::new(FakeHost {
            sync_sequence: vec![0],
            cursor: 0,
            waits: 0,
            locks: 0,
            unlocks: 0,
        }));
        let first = Box::leak(Box::new(interface_over(state)));
        let first_addr = first as *mut HwRenderInterfaceVulkan as usize;

        install_resolver(Box::new(move || {
            NonNull::new(first_addr as *mut HwRenderInterfaceVulkan)
        }));
        assert!(reset_context().is_ok());
        assert_eq!(current().unwrap().raw_ptr() as usize, first_addr);

        // The frontend silently swaps the interface; refresh publishes it.
        let second = Box::leak(Box::new(interface_over(state)));
        let second_addr = second as *mut HwRenderInterfaceVulkan as usize;
        install_resolver(Box::new(move || {
            NonNull::new(second_addr as *mut HwRenderInterfaceVulkan)
        }));
        assert_eq!(refresh().unwrap().raw_ptr() as usize, second_addr);

        clear();
        assert!(current().is_none());
    }

    #[test]
    fn queue_lock_pairs_reach_the_host() {
        let mut state = FakeHost {
            sync_sequence: vec![0],
            cursor: 0,
            waits: 0,
            locks: 0,
            unlocks: 0,
        };
        let mut intf = interface_over(&mut state);
        let host = HostVulkan::for_test(NonNull::from(&mut intf));
        host.lock_queue();
        host.unlock_queue();
        assert_eq!((state.locks, state.unlocks), (1, 1));
    }
}
