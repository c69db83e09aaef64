// SPDX-License-Identifier: GPL-2.0-or-later
//! Capability probing for the frontend-owned physical device.
//!
//! Probing never fails: every missing extension, unloadable entry point
//! or failed feature query degrades exactly one capability flag and logs
//! the downgrade. The adapter has to run on whatever device the frontend
//! picked, with whatever subset of extensions it loaded.

use crate::binding::HostVulkan;
use ash::{ext, khr, vk};
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use tracing::{debug, warn};

/// Immutable after `probe`; a flag is true only when the extension string
/// was enumerated *and* the entry points behind it resolved non-null.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CapabilityRecord {
    pub timeline_semaphores: bool,
    pub extended_dynamic_state: bool,
    pub custom_border_color: bool,
    pub index_type_uint8: bool,
    pub fragment_shader_interlock: bool,
    pub fragment_shader_barycentric: bool,
    pub shader_stencil_export: bool,
    pub external_memory_host: bool,
    /// No reliable query exists; assumed supported.
    pub triangle_fan: bool,
    pub min_vertex_stride_alignment: u32,
    pub min_imported_host_pointer_alignment: vk::DeviceSize,
    pub vendor_id: u32,
    pub driver_id: vk::DriverId,
}

/// Entry points the renderer actually calls when the corresponding flag
/// is set. The frontend's device may advertise the extension without
/// having loaded these.
const EXTENDED_DYNAMIC_STATE_FNS: [&CStr; 4] = [
    c"vkCmdSetCullModeEXT",
    c"vkCmdSetDepthTestEnableEXT",
    c"vkCmdSetDepthWriteEnableEXT",
    c"vkCmdSetFrontFaceEXT",
];
const TIMELINE_SEMAPHORE_FNS: [&CStr; 1] = [c"vkGetSemaphoreCounterValueKHR"];

/// Step 3: extension-string presence alone.
fn flags_from_extensions(caps: &mut CapabilityRecord, extensions: &BTreeSet<CString>) {
    let has = |name: &CStr| extensions.contains(name);
    caps.timeline_semaphores = has(khr::timeline_semaphore::NAME);
    caps.extended_dynamic_state = has(ext::extended_dynamic_state::NAME);
    caps.custom_border_color = has(ext::custom_border_color::NAME);
    caps.index_type_uint8 = has(ext::index_type_uint8::NAME);
    caps.fragment_shader_interlock = has(ext::fragment_shader_interlock::NAME);
    caps.fragment_shader_barycentric = has(khr::fragment_shader_barycentric::NAME);
    caps.shader_stencil_export = has(ext::shader_stencil_export::NAME);
    caps.external_memory_host = has(ext::external_memory_host::NAME);
}

/// Step 4: drivers whose shader translation cannot express what an
/// extension promises lose the flag outright.
fn apply_driver_workarounds(caps: &mut CapabilityRecord) {
    if caps.driver_id == vk::DriverId::QUALCOMM_PROPRIETARY && caps.fragment_shader_barycentric {
        warn!("qualcomm proprietary driver cannot address per-vertex inputs, disabling barycentrics");
        caps.fragment_shader_barycentric = false;
    }
}

/// Step 5: confirm the entry points behind the risky flags resolved.
fn verify_function_pointers(
    caps: &mut CapabilityRecord,
    mut has_fn: impl FnMut(&CStr) -> bool,
) {
    if caps.extended_dynamic_state && !EXTENDED_DYNAMIC_STATE_FNS.iter().all(|n| has_fn(n)) {
        warn!("extended dynamic state entry points missing on the frontend device, disabling");
        caps.extended_dynamic_state = false;
    }
    if caps.timeline_semaphores && !TIMELINE_SEMAPHORE_FNS.iter().all(|n| has_fn(n)) {
        warn!("timeline semaphore entry points missing on the frontend device, disabling");
        caps.timeline_semaphores = false;
    }
}

pub(crate) fn probe(
    instance: &ash::Instance,
    host: HostVulkan,
    physical_device: vk::PhysicalDevice,
) -> CapabilityRecord {
    // Step 1: base properties and features.
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let _features = unsafe { instance.get_physical_device_features(physical_device) };

    // Step 2: enumerate extension strings.
    let extensions: BTreeSet<CString> =
        match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
            Ok(props) => props
                .iter()
                .filter_map(|p| p.extension_name_as_c_str().ok())
                .map(CString::from)
                .collect(),
            Err(err) => {
                warn!("failed to enumerate device extensions: {err}");
                BTreeSet::new()
            }
        };

    let mut caps = CapabilityRecord {
        vendor_id: properties.vendor_id,
        ..Default::default()
    };
    flags_from_extensions(&mut caps, &extensions);

    // Driver identity comes through the properties2 chain when the
    // loader exposes it; without it no workaround can match.
    if host.has_instance_fn(c"vkGetPhysicalDeviceProperties2") {
        let mut driver = vk::PhysicalDeviceDriverProperties::default();
        let mut props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut driver);
        unsafe { instance.get_physical_device_properties2(physical_device, &mut props2) };
        caps.driver_id = driver.driver_id;
    } else {
        debug!("vkGetPhysicalDeviceProperties2 unavailable, skipping driver identification");
    }
    apply_driver_workarounds(&mut caps);

    verify_function_pointers(&mut caps, |name| host.has_device_fn(name));

    // Step 6: extension strings promise, feature bits confirm.
    if host.has_instance_fn(c"vkGetPhysicalDeviceFeatures2") {
        let mut timeline = vk::PhysicalDeviceTimelineSemaphoreFeatures::default();
        let mut barycentric = vk::PhysicalDeviceFragmentShaderBarycentricFeaturesKHR::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut timeline)
            .push_next(&mut barycentric);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        if caps.timeline_semaphores && timeline.timeline_semaphore == vk::FALSE {
            warn!("timeline semaphore feature not enabled on the frontend device, disabling");
            caps.timeline_semaphores = false;
        }
        if caps.fragment_shader_barycentric
            && barycentric.fragment_shader_barycentric == vk::FALSE
        {
            warn!("barycentric feature not enabled on the frontend device, disabling");
            caps.fragment_shader_barycentric = false;
        }
    } else {
        if caps.timeline_semaphores {
            warn!("cannot confirm timeline semaphore features, disabling");
            caps.timeline_semaphores = false;
        }
    }

    // Step 7: imported-pointer alignment, gated on the same chain.
    if caps.external_memory_host {
        if host.has_instance_fn(c"vkGetPhysicalDeviceProperties2") {
            let mut host_props = vk::PhysicalDeviceExternalMemoryHostPropertiesEXT::default();
            let mut props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut host_props);
            unsafe { instance.get_physical_device_properties2(physical_device, &mut props2) };
            if host_props.min_imported_host_pointer_alignment == 0 {
                warn!("external memory host alignment query failed, disabling");
                caps.external_memory_host = false;
            } else {
                caps.min_imported_host_pointer_alignment =
                    host_props.min_imported_host_pointer_alignment;
            }
        } else {
            warn!("cannot query external memory host properties, disabling");
            caps.external_memory_host = false;
        }
    }

    // Step 8: defaults with no query behind them.
    caps.triangle_fan = true;
    caps.min_vertex_stride_alignment =
        (properties.limits.min_texel_buffer_offset_alignment.max(1)) as u32;

    debug!(?caps, "device capabilities probed");
    caps
}
