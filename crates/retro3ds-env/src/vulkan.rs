// SPDX-License-Identifier: GPL-2.0-or-later
//! `retro_hw_render_interface_vulkan` (interface v5) expressed with ash
//! handle types. The frontend owns every handle in here; the struct is a
//! borrowed view into frontend memory, valid from `context_reset` until
//! `context_destroy`.

use ash::vk;
use std::ffi::c_void;

pub const HW_RENDER_INTERFACE_VULKAN: u32 = 0;
pub const HW_RENDER_INTERFACE_VULKAN_VERSION: u32 = 5;

/// Image hand-off record passed to the frontend's `set_image`.
///
/// The frontend may keep the pointer it receives across calls (frame
/// duplication while paused), so the core-side storage for this struct
/// must be a stable allocation, never a stack temporary.
#[derive(Clone)]
#[repr(C)]
pub struct RetroVulkanImage {
    pub image_view: vk::ImageView,
    pub image_layout: vk::ImageLayout,
    pub create_info: vk::ImageViewCreateInfo<'static>,
}

impl Default for RetroVulkanImage {
    fn default() -> Self {
        RetroVulkanImage {
            image_view: vk::ImageView::null(),
            image_layout: vk::ImageLayout::UNDEFINED,
            create_info: vk::ImageViewCreateInfo::default(),
        }
    }
}

pub type SetImageFn = unsafe extern "C" fn(
    handle: *mut c_void,
    image: *const RetroVulkanImage,
    num_semaphores: u32,
    semaphores: *const vk::Semaphore,
    src_queue_family: u32,
);
pub type GetSyncIndexFn = unsafe extern "C" fn(handle: *mut c_void) -> u32;
pub type GetSyncIndexMaskFn = unsafe extern "C" fn(handle: *mut c_void) -> u32;
pub type SetCommandBuffersFn =
    unsafe extern "C" fn(handle: *mut c_void, num_cmd: u32, cmd: *const vk::CommandBuffer);
pub type WaitSyncIndexFn = unsafe extern "C" fn(handle: *mut c_void);
pub type LockQueueFn = unsafe extern "C" fn(handle: *mut c_void);
pub type UnlockQueueFn = unsafe extern "C" fn(handle: *mut c_void);
pub type SetSignalSemaphoreFn =
    unsafe extern "C" fn(handle: *mut c_void, semaphore: vk::Semaphore);

/// The function-pointer table the frontend hands out at context reset.
/// Every callback slot may legally be null; callers must tolerate that.
#[repr(C)]
pub struct HwRenderInterfaceVulkan {
    pub interface_type: u32,
    pub interface_version: u32,

    /// Opaque frontend handle, passed back through every callback.
    pub handle: *mut c_void,

    pub instance: vk::Instance,
    pub gpu: vk::PhysicalDevice,
    pub device: vk::Device,

    pub get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
    pub get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,

    /// Graphics queue shared with the frontend; also the present queue.
    pub queue: vk::Queue,
    pub queue_index: u32,

    pub set_image: Option<SetImageFn>,
    pub get_sync_index: Option<GetSyncIndexFn>,
    pub get_sync_index_mask: Option<GetSyncIndexMaskFn>,
    pub set_command_buffers: Option<SetCommandBuffersFn>,
    pub wait_sync_index: Option<WaitSyncIndexFn>,
    pub lock_queue: Option<LockQueueFn>,
    pub unlock_queue: Option<UnlockQueueFn>,
    pub set_signal_semaphore: Option<SetSignalSemaphoreFn>,
}

impl HwRenderInterfaceVulkan {
    pub fn is_vulkan(&self) -> bool {
        self.interface_type == HW_RENDER_INTERFACE_VULKAN
    }
}
