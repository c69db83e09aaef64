// SPDX-License-Identifier: GPL-2.0-or-later
use crate::binding::{self, HostVulkan};
use crate::caps::{self, CapabilityRecord};
use crate::AdapterError;
use ash::vk;
use std::ffi::CStr;
use tracing::{error, info};

/// First memory type matching the filter bits and property flags.
pub(crate) fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        type_filter & (1 << i) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

/// Maps a PCI vendor id to a display name.
pub(crate) fn vendor_name(vendor_id: u32) -> String {
    match vendor_id {
        0x1002 => "AMD".to_string(),
        0x1010 => "ImgTec".to_string(),
        0x106B => "Apple".to_string(),
        0x10DE => "NVIDIA".to_string(),
        0x13B5 => "ARM".to_string(),
        0x5143 => "Qualcomm".to_string(),
        0x8086 => "Intel".to_string(),
        other => format!("Unknown (0x{other:X})"),
    }
}

/// The emulator-facing rendering instance built over the frontend's
/// device/queue/physical-device triple.
///
/// Nothing in here is owned: the handles belong to the frontend, so this
/// type deliberately has no `Drop`. It carries only derived metadata and
/// the loaded dispatch tables.
pub struct AdapterInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    queue_family_index: u32,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    driver_name: String,
    caps: CapabilityRecord,
}

impl AdapterInstance {
    /// Builds the instance from the currently bound interface.
    ///
    /// Fatal when the interface or any of its mandatory handles is null;
    /// a partially working adapter must never be exposed. Loads the
    /// process dispatch tables from the frontend's loader *before* any
    /// capability probing runs.
    pub fn new() -> Result<Self, AdapterError> {
        let host = binding::current().ok_or_else(|| {
            error!("Vulkan render interface not bound; was reset_context called?");
            AdapterError::InterfaceUnavailable
        })?;
        Self::from_host(host)
    }

    fn from_host(host: HostVulkan) -> Result<Self, AdapterError> {
        if host.gpu() == vk::PhysicalDevice::null() {
            error!("frontend provided an invalid physical device");
            return Err(AdapterError::NullHandle("physical device"));
        }
        if host.queue() == vk::Queue::null() {
            error!("frontend provided an invalid graphics queue");
            return Err(AdapterError::NullHandle("graphics queue"));
        }
        let gipa = host
            .get_instance_proc_addr()
            .ok_or(AdapterError::NullHandle("instance loader"))?;

        // Dispatch tables must exist before any other Vulkan call; the
        // probe below relies on them.
        let entry = unsafe { ash::Entry::from_static_fn(ash::StaticFn {
            get_instance_proc_addr: gipa,
        }) };
        let instance = unsafe { ash::Instance::load(entry.static_fn(), host.instance()) };
        let device = unsafe { ash::Device::load(instance.fp_v1_0(), host.device()) };

        let properties = unsafe { instance.get_physical_device_properties(host.gpu()) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(host.gpu()) };

        let caps = caps::probe(&instance, host, host.gpu());
        let driver_name = Self::query_driver_name(&instance, host, &caps);

        let device_name = properties
            .device_name_as_c_str()
            .unwrap_or(c"<invalid name>")
            .to_string_lossy()
            .into_owned();
        info!(
            "adapter instance ready: {} ({})",
            device_name,
            vendor_name(properties.vendor_id)
        );
        info!("driver: {driver_name}");

        Ok(AdapterInstance {
            entry,
            instance,
            device,
            physical_device: host.gpu(),
            queue: host.queue(),
            queue_family_index: host.queue_index(),
            properties,
            memory_properties,
            driver_name,
            caps,
        })
    }

    fn query_driver_name(
        instance: &ash::Instance,
        host: HostVulkan,
        caps: &CapabilityRecord,
    ) -> String {
        if host.has_instance_fn(c"vkGetPhysicalDeviceProperties2") {
            let mut driver = vk::PhysicalDeviceDriverProperties::default();
            let mut props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut driver);
            unsafe { instance.get_physical_device_properties2(host.gpu(), &mut props2) };
            let name = unsafe { CStr::from_ptr(driver.driver_name.as_ptr()) };
            if !name.is_empty() {
                return name.to_string_lossy().into_owned();
            }
        }
        format!("{:?}", caps.driver_id)
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The one queue the frontend shares; graphics and present alike.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn graphics_queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn vendor_name(&self) -> String {
        vendor_name(self.properties.vendor_id)
    }

    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    pub fn caps(&self) -> &CapabilityRecord {
        &self.caps
    }

    /// First memory type matching the filter bits and property flags.
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        find_memory_type(&self.memory_properties, type_filter, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_table_covers_the_usual_ids() {
        assert_eq!(vendor_name(0x1002), "AMD");
        assert_eq!(vendor_name(0x10DE), "NVIDIA");
        assert_eq!(vendor_name(0x8086), "Intel");
        assert_eq!(vendor_name(0x5143), "Qualcomm");
    }

    #[test]
    fn unknown_vendor_keeps_the_id_visible() {
        assert_eq!(vendor_name(0xBEEF), "Unknown (0xBEEF)");
    }
}
