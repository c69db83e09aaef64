// SPDX-License-Identifier: GPL-2.0-or-later
//! Off-screen presentation window over the frontend's frame pacing.
//!
//! There is no swapchain on this side: the window owns a single output
//! image that every frame record aliases, and the frontend multiplexes
//! frames through its own sync index. Local fences exist only to make
//! teardown safe; per-frame pacing is entirely the frontend's.

use crate::binding;
use crate::instance::{find_memory_type, AdapterInstance};
use crate::AdapterError;
use ash::vk;
use retro3ds_env::vulkan::RetroVulkanImage;
use std::slice;
use tracing::{debug, error, info, trace, warn};

pub const FRAME_COUNT: usize = 2;
pub const OUTPUT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Per-slot bundle of command/sync objects. The image and view are the
/// window's shared output texture, never owned by the frame.
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub cmdbuf: vk::CommandBuffer,
    pub render_ready: vk::Semaphore,
    pub present_done: vk::Fence,
}

struct OutputTexture {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    view_info: vk::ImageViewCreateInfo<'static>,
    width: u32,
    height: u32,
}

/// Stable-address storage for the image descriptor handed to the
/// frontend. The frontend may keep the pointer across calls to duplicate
/// frames while paused, so this must never live on the stack.
pub(crate) struct PersistentImage(Box<RetroVulkanImage>);

impl PersistentImage {
    fn new() -> Self {
        PersistentImage(Box::new(RetroVulkanImage::default()))
    }

    pub(crate) fn write(
        &mut self,
        image_view: vk::ImageView,
        image_layout: vk::ImageLayout,
        create_info: vk::ImageViewCreateInfo<'static>,
    ) -> *const RetroVulkanImage {
        let image = &mut *self.0;
        image.image_view = image_view;
        image.image_layout = image_layout;
        image.create_info = create_info;
        image as *const RetroVulkanImage
    }

    pub(crate) fn as_ptr(&self) -> *const RetroVulkanImage {
        &*self.0 as *const RetroVulkanImage
    }
}

/// Whether the requested dimensions force a texture reallocation.
pub(crate) fn needs_new_texture(current: Option<(u32, u32)>, want: (u32, u32)) -> bool {
    current != Some(want)
}

/// Frame slot chosen for a host sync index: the adapter must agree with
/// the frontend's own double/triple buffering, not run a local counter.
pub(crate) fn slot_for_sync_index(sync_index: u32, pool_len: usize) -> usize {
    sync_index as usize % pool_len
}

pub struct PresentationWindow {
    device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_family_index: u32,
    command_pool: vk::CommandPool,
    render_pass: vk::RenderPass,
    output: Option<OutputTexture>,
    frames: Vec<Frame>,
    current_frame: usize,
    libretro_image: PersistentImage,
    swap_hook: Box<dyn FnMut() + Send>,
}

impl PresentationWindow {
    /// Builds the window at the layout's current dimensions. `swap_hook`
    /// is invoked after each image hand-off to trigger the frontend's
    /// video refresh.
    pub fn new(
        instance: &AdapterInstance,
        width: u32,
        height: u32,
        swap_hook: Box<dyn FnMut() + Send>,
    ) -> Result<Self, AdapterError> {
        let device = instance.device().clone();

        info!("initializing presentation window ({width}x{height})");

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                | vk::CommandPoolCreateFlags::TRANSIENT,
            queue_family_index: instance.graphics_queue_family_index(),
            ..Default::default()
        };
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        let render_pass = match Self::create_render_pass(&device) {
            Ok(rp) => rp,
            Err(err) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(err);
            }
        };

        let mut window = PresentationWindow {
            device,
            memory_properties: *instance.memory_properties(),
            queue_family_index: instance.graphics_queue_family_index(),
            command_pool,
            render_pass,
            output: None,
            frames: Vec::new(),
            current_frame: 0,
            libretro_image: PersistentImage::new(),
            swap_hook,
        };
        window.create_output_texture(width, height)?;
        window.create_frame_resources()?;

        Ok(window)
    }

    /// Single color attachment, cleared on load, left in
    /// `SHADER_READ_ONLY_OPTIMAL` so the frontend can sample or copy the
    /// image straight away — there is no present layout here.
    fn create_render_pass(device: &ash::Device) -> Result<vk::RenderPass, AdapterError> {
        let color_attachment = vk::AttachmentDescription {
            format: OUTPUT_FORMAT,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ..Default::default()
        };

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };

        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };

        let rp_info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_attachment,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };

        Ok(unsafe { device.create_render_pass(&rp_info, None)? })
    }

    /// (Re)creates the shared output image. No-op when an image of the
    /// requested size already exists; zero dimensions and allocation
    /// failures are fatal.
    pub fn create_output_texture(&mut self, width: u32, height: u32) -> Result<(), AdapterError> {
        if width == 0 || height == 0 {
            error!("invalid output texture dimensions: {width}x{height}");
            return Err(AdapterError::InvalidDimensions { width, height });
        }

        let current = self.output.as_ref().map(|o| (o.width, o.height));
        if !needs_new_texture(current, (width, height)) {
            return Ok(());
        }
        self.destroy_output_texture();

        let device = &self.device;
        let image_info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: OUTPUT_FORMAT,
            extent: vk::Extent3D { width, height, depth: 1 },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            // The frontend consumes the image by sampling or copying it,
            // never by a swapchain present.
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_DST,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { device.create_image(&image_info, None)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = find_memory_type(
            &self.memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .ok_or_else(|| {
            unsafe { device.destroy_image(image, None) };
            error!("no device-local memory type for the output image");
            AdapterError::NoSuitableMemoryType
        })?;
        let alloc_info = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: requirements.size,
            memory_type_index: memory_type,
            ..Default::default()
        };
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(image, None) };
                error!("failed to allocate output image memory: {err}");
                return Err(err.into());
            }
        };
        if let Err(err) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(err.into());
        }

        let view_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: OUTPUT_FORMAT,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(err) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(err.into());
            }
        };

        self.output = Some(OutputTexture { image, memory, view, view_info, width, height });
        debug!("created output texture: {width}x{height}");
        Ok(())
    }

    /// Safe to call repeatedly; the second call is a no-op.
    pub fn destroy_output_texture(&mut self) {
        let Some(output) = self.output.take() else {
            return;
        };
        unsafe {
            self.device.destroy_image_view(output.view, None);
            self.device.destroy_image(output.image, None);
            self.device.free_memory(output.memory, None);
        }
    }

    /// Rebuilds the frame pool against the current output texture. Every
    /// frame aliases the one shared image/view; only command and sync
    /// objects are per-frame, because the frontend owns frame
    /// multiplexing through its sync index.
    pub fn create_frame_resources(&mut self) -> Result<(), AdapterError> {
        let output = self
            .output
            .as_ref()
            .ok_or(AdapterError::InvalidDimensions { width: 0, height: 0 })?;
        let (width, height) = (output.width, output.height);
        let (image, view) = (output.image, output.view);

        self.destroy_frame_resources();

        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: FRAME_COUNT as u32,
            ..Default::default()
        };
        let command_buffers = unsafe { self.device.allocate_command_buffers(&alloc_info)? };

        for cmdbuf in command_buffers {
            let render_ready =
                unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };
            // Pre-signaled so the very first acquisition never blocks.
            let fence_info = vk::FenceCreateInfo {
                s_type: vk::StructureType::FENCE_CREATE_INFO,
                flags: vk::FenceCreateFlags::SIGNALED,
                ..Default::default()
            };
            let present_done = unsafe { self.device.create_fence(&fence_info, None)? };

            let fb_info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: 1,
                p_attachments: &view,
                width,
                height,
                layers: 1,
                ..Default::default()
            };
            let framebuffer = unsafe { self.device.create_framebuffer(&fb_info, None)? };

            self.frames.push(Frame {
                width,
                height,
                image,
                image_view: view,
                framebuffer,
                cmdbuf,
                render_ready,
                present_done,
            });
        }

        debug!("created {FRAME_COUNT} frame records");
        Ok(())
    }

    fn destroy_frame_resources(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        let cmdbufs: Vec<vk::CommandBuffer> = self.frames.iter().map(|f| f.cmdbuf).collect();
        unsafe {
            for frame in &self.frames {
                self.device.destroy_framebuffer(frame.framebuffer, None);
                self.device.destroy_semaphore(frame.render_ready, None);
                self.device.destroy_fence(frame.present_done, None);
            }
            self.device.free_command_buffers(self.command_pool, &cmdbufs);
        }
        self.frames.clear();
        self.current_frame = 0;
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Picks the frame slot for this iteration of the render loop.
    ///
    /// Re-resolves the interface first — the frontend can swap it without
    /// a context reset — then blocks in the frontend's `wait_sync_index`
    /// (the only suspension point on this path) and selects the slot the
    /// frontend's sync index names. Falls back to the last-used slot when
    /// re-resolution fails.
    pub fn acquire_render_frame(&mut self) -> Option<usize> {
        if self.frames.is_empty() {
            error!("no frames available in the presentation window");
            return None;
        }

        let Some(host) = binding::refresh() else {
            error!("failed to resolve the Vulkan interface; reusing frame {}", self.current_frame);
            return Some(self.current_frame);
        };

        host.wait_sync_index();

        if let Some(sync_index) = host.sync_index() {
            self.current_frame = slot_for_sync_index(sync_index, self.frames.len());
            trace!("host sync index {sync_index}, using frame {}", self.current_frame);
        }

        Some(self.current_frame)
    }

    /// Resizes by full teardown: waits until the frame's last hand-off
    /// completed, then recreates the output texture and the whole pool.
    /// Frames are never resized in place.
    pub fn recreate_frame(
        &mut self,
        frame_index: usize,
        width: u32,
        height: u32,
    ) -> Result<(), AdapterError> {
        let Some(frame) = self.frames.get(frame_index) else {
            warn!("recreate requested for missing frame {frame_index}");
            return Ok(());
        };
        if frame.width == width && frame.height == height {
            return Ok(());
        }

        debug!(
            "recreating frame {frame_index}: {}x{} -> {width}x{height}",
            frame.width, frame.height
        );

        unsafe {
            self.device
                .wait_for_fences(slice::from_ref(&frame.present_done), true, u64::MAX)
                .ok();
        }

        self.create_output_texture(width, height)?;
        self.create_frame_resources()?;

        info!("frame pool recreated for {width}x{height}");
        Ok(())
    }

    /// Hands the frame to the frontend and fires the buffer-swap hook.
    /// No semaphores are attached; the frontend paces the queue itself.
    pub fn present(&mut self, frame_index: usize) {
        if self.frames.get(frame_index).is_none() {
            warn!("present called with no frame");
            return;
        }
        let Some(output) = self.output.as_ref() else {
            warn!("present called without an output texture");
            return;
        };
        let Some(host) = binding::current() else {
            error!("Vulkan interface unavailable for presentation");
            return;
        };

        self.libretro_image.write(
            output.view,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            output.view_info,
        );
        host.set_image(self.libretro_image.as_ptr(), self.queue_family_index);

        // Tells the frontend a frame is ready; this ends in the video
        // refresh callback.
        (self.swap_hook)();

        trace!("frame {frame_index} presented");
    }

    /// Waits out every frame's hand-off fence; teardown only.
    pub fn wait_present(&self) {
        if self.frames.is_empty() {
            return;
        }
        let fences: Vec<vk::Fence> = self.frames.iter().map(|f| f.present_done).collect();
        unsafe {
            self.device.wait_for_fences(&fences, true, u64::MAX).ok();
        }
    }

    /// There are no surfaces in this model; the notification is consumed.
    pub fn notify_surface_changed(&self) {
        debug!("surface change notification ignored; the frontend owns presentation");
    }
}

impl Drop for PresentationWindow {
    fn drop(&mut self) {
        debug!("destroying presentation window");
        self.wait_present();
        unsafe {
            self.device.device_wait_idle().ok();
        }
        self.destroy_frame_resources();
        self.destroy_output_texture();
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_guard_skips_identical_dimensions() {
        assert!(needs_new_texture(None, (400, 240)));
        assert!(needs_new_texture(Some((400, 240)), (800, 480)));
        // Second request at the same size performs no reallocation.
        assert!(!needs_new_texture(Some((400, 240)), (400, 240)));
    }

    #[test]
    fn slot_selection_tracks_the_sync_index() {
        let slots: Vec<usize> = [0u32, 1, 0, 1]
            .iter()
            .map(|&i| slot_for_sync_index(i, FRAME_COUNT))
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1]);
        // Triple-buffered hosts wrap into the two-slot pool.
        assert_eq!(slot_for_sync_index(2, FRAME_COUNT), 0);
        assert_eq!(slot_for_sync_index(5, FRAME_COUNT), 1);
    }

    #[test]
    fn persistent_image_address_is_stable_across_writes() {
        let mut image = PersistentImage::new();
        let first = image.write(
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageViewCreateInfo::default(),
        );
        let second = image.write(
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageViewCreateInfo {
                view_type: vk::ImageViewType::TYPE_2D,
                ..Default::default()
            },
        );
        assert_eq!(first, second);
        assert_eq!(first, image.as_ptr());
    }
}
