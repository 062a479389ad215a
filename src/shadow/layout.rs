//! GPU record mirrors, uniform blocks and the binding registry.
//!
//! Everything here is `#[repr(C)]` Pod and must match `assets/shaders/splat_shadow_*.wgsl`
//! byte for byte. Vector members are written as plain arrays on both sides so no
//! WGSL alignment padding sneaks in.

use glam::{Mat4, Vec3, Vec4};
use half::f16;

use crate::splat::MaterialParameters;

/// One per active splat. Written by the shared-data kernel, read by every face.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SharedLightDatum {
    /// World space.
    pub position: [f32; 3],
    /// Object-space covariance, upper triangle: (xx, xy, xz).
    pub cov_a: [f32; 3],
    /// (yy, yz, zz).
    pub cov_b: [f32; 3],
    pub opacity: f16,
    pub _padding: u16,
}

/// One per active splat, rewritten for every face.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightViewDatum {
    /// `w == 0` marks a culled splat.
    pub clip_position: [f32; 4],
    /// Screen-space footprint axes in pixels.
    pub axis1: [f32; 2],
    pub axis2: [f32; 2],
    pub opacity: f16,
    pub _padding: u16,
}

/// Quantization bounds for a run of [`crate::splat::SPLATS_PER_CHUNK`] splats.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplatChunkRecord {
    pub position_min: [f32; 3],
    pub position_max: [f32; 3],
    pub scale_min: [f32; 3],
    pub scale_max: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<SharedLightDatum>() == 40);
const _: () = assert!(std::mem::size_of::<LightViewDatum>() == 36);
const _: () = assert!(std::mem::size_of::<SplatChunkRecord>() == 48);

/// Element layout of a structured buffer; a change of stride forces reallocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementLayout {
    pub label: &'static str,
    pub stride: u32,
}

impl ElementLayout {
    pub const SHARED_LIGHT_DATA: ElementLayout = ElementLayout {
        label: "splat shadow shared data",
        stride: std::mem::size_of::<SharedLightDatum>() as u32,
    };
    pub const LIGHT_VIEW_DATA: ElementLayout = ElementLayout {
        label: "splat shadow view data",
        stride: std::mem::size_of::<LightViewDatum>() as u32,
    };

    pub fn byte_size(&self, element_count: u32) -> u64 {
        self.stride as u64 * element_count as u64
    }
}

pub const DEFAULT_WORKGROUP_SIZE: u32 = 256;
/// Pipeline-overridable constant carrying the kernels' X thread-group width.
pub const WORKGROUP_SIZE_CONSTANT: &str = "workgroup_size_x";

pub const SHARED_KERNEL_ENTRY: &str = "calc_shared_light_data";
pub const VIEW_KERNEL_ENTRY: &str = "calc_light_view_data";
pub const CASTER_VERTEX_ENTRY: &str = "vs_main";
pub const CASTER_FRAGMENT_ENTRY: &str = "fs_main";

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SharedParamsUniform {
    pub object_to_world: [[f32; 4]; 4],
    /// (splat scale, opacity scale, 0, 0)
    pub scales: [f32; 4],
    /// (active count, total count, chunk count, format word)
    pub counts: [u32; 4],
}

impl SharedParamsUniform {
    pub fn new(
        object_to_world: Mat4,
        splat_scale: f32,
        opacity_scale: f32,
        active_count: u32,
        total_count: u32,
        chunk_count: u32,
        format_word: u32,
    ) -> Self {
        Self {
            object_to_world: object_to_world.to_cols_array_2d(),
            scales: [splat_scale, opacity_scale, 0.0, 0.0],
            counts: [active_count, total_count, chunk_count, format_word],
        }
    }
}

/// Per-face block of view matrices and screen parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewParamsUniform {
    pub light_view: [[f32; 4]; 4],
    pub light_model_view: [[f32; 4]; 4],
    pub light_proj: [[f32; 4]; 4],
    /// (width, height, near, far)
    pub screen_params: [f32; 4],
    /// (active count, chunk count, format word, edit bits valid)
    pub counts: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawParamsUniform {
    /// (width, height, near, far)
    pub screen_params: [f32; 4],
    /// (splat scale, opacity scale, point display size, alpha cutoff)
    pub scales: [f32; 4],
    /// (active count, 0, 0, 0)
    pub counts: [u32; 4],
}

const _: () = assert!(std::mem::size_of::<SharedParamsUniform>() == 96);
const _: () = assert!(std::mem::size_of::<ViewParamsUniform>() == 224);
const _: () = assert!(std::mem::size_of::<DrawParamsUniform>() == 48);

pub fn align_up(value: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Uniform,
    StorageRead,
    StorageReadWrite,
    /// Unfilterable float texture read with `textureLoad`.
    Texture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingSlot {
    pub name: &'static str,
    pub binding: u32,
    pub kind: BindingKind,
}

const fn slot(name: &'static str, binding: u32, kind: BindingKind) -> BindingSlot {
    BindingSlot { name, binding, kind }
}

pub mod compute_slot {
    use super::{slot, BindingKind, BindingSlot};

    pub const SHARED_PARAMS: BindingSlot = slot("shared_params", 0, BindingKind::Uniform);
    pub const VIEW_PARAMS: BindingSlot = slot("view_params", 1, BindingKind::Uniform);
    pub const SPLAT_POS: BindingSlot = slot("splat_pos", 2, BindingKind::StorageRead);
    pub const SPLAT_OTHER: BindingSlot = slot("splat_other", 3, BindingKind::StorageRead);
    pub const SPLAT_CHUNKS: BindingSlot = slot("splat_chunks", 4, BindingKind::StorageRead);
    pub const SPLAT_COLOR: BindingSlot = slot("splat_color", 5, BindingKind::Texture);
    pub const SHARED_DATA_OUT: BindingSlot = slot("shared_light_data_output", 6, BindingKind::StorageReadWrite);
    pub const SHARED_DATA_IN: BindingSlot = slot("shared_light_data_input", 7, BindingKind::StorageRead);
    pub const VIEW_DATA_OUT: BindingSlot = slot("light_view_data_output", 8, BindingKind::StorageReadWrite);
    pub const EDIT_SELECTED: BindingSlot = slot("edit_selected", 9, BindingKind::StorageRead);
    pub const EDIT_DELETED: BindingSlot = slot("edit_deleted", 10, BindingKind::StorageRead);
}

pub mod draw_slot {
    use super::{slot, BindingKind, BindingSlot};

    pub const DRAW_PARAMS: BindingSlot = slot("draw_params", 0, BindingKind::Uniform);
    pub const VIEW_DATA: BindingSlot = slot("light_view_data", 1, BindingKind::StorageRead);
    pub const ORDER: BindingSlot = slot("splat_order", 2, BindingKind::StorageRead);
}

pub const SHARED_KERNEL_BINDINGS: [BindingSlot; 6] = [
    compute_slot::SHARED_PARAMS,
    compute_slot::SPLAT_POS,
    compute_slot::SPLAT_OTHER,
    compute_slot::SPLAT_CHUNKS,
    compute_slot::SPLAT_COLOR,
    compute_slot::SHARED_DATA_OUT,
];

pub const VIEW_KERNEL_BINDINGS: [BindingSlot; 8] = [
    compute_slot::VIEW_PARAMS,
    compute_slot::SPLAT_POS,
    compute_slot::SPLAT_CHUNKS,
    compute_slot::SPLAT_COLOR,
    compute_slot::SHARED_DATA_IN,
    compute_slot::VIEW_DATA_OUT,
    compute_slot::EDIT_SELECTED,
    compute_slot::EDIT_DELETED,
];

pub const CASTER_BINDINGS: [BindingSlot; 3] = [draw_slot::DRAW_PARAMS, draw_slot::VIEW_DATA, draw_slot::ORDER];

/// Uniform names on the primary shading material.
pub mod material_property {
    pub const POINT_LIGHT_POSITION: &str = "point_light_position";
    pub const SHADOW_BIAS: &str = "shadow_bias";
    pub const LIGHT_FAR_PLANE: &str = "light_far_plane";
    pub const LIGHT_NEAR_PLANE: &str = "light_near_plane";
}

/// Receiver-side uniform block for compositors that take the shadow parameters as raw bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowReceiverUniform {
    /// xyz = light position, w = 1.
    pub light_position: [f32; 4],
    /// (bias, near, far, 0)
    pub params: [f32; 4],
}

impl ShadowReceiverUniform {
    pub fn light_position(&self) -> Vec3 {
        Vec3::new(self.light_position[0], self.light_position[1], self.light_position[2])
    }
}

impl MaterialParameters for ShadowReceiverUniform {
    fn set_float(&mut self, name: &str, value: f32) {
        match name {
            material_property::SHADOW_BIAS => self.params[0] = value,
            material_property::LIGHT_NEAR_PLANE => self.params[1] = value,
            material_property::LIGHT_FAR_PLANE => self.params[2] = value,
            _ => {}
        }
    }

    fn set_vector(&mut self, name: &str, value: Vec4) {
        if name == material_property::POINT_LIGHT_POSITION {
            self.light_position = value.to_array();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn records_have_packed_strides() {
        assert_eq!(ElementLayout::SHARED_LIGHT_DATA.stride, 40);
        assert_eq!(ElementLayout::LIGHT_VIEW_DATA.stride, 36);
        assert_eq!(ElementLayout::LIGHT_VIEW_DATA.byte_size(10), 360);
    }

    #[test]
    fn opacity_sits_in_low_half_of_last_word() {
        let datum = SharedLightDatum { opacity: f16::from_f32(0.5), ..Default::default() };
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&datum));
        assert_eq!(words.len(), 10);
        assert_eq!(words[9] & 0xffff, f16::from_f32(0.5).to_bits() as u32);
        assert_eq!(words[9] >> 16, 0);
    }

    #[test]
    fn binding_tables_have_unique_slots() {
        for table in [&SHARED_KERNEL_BINDINGS[..], &VIEW_KERNEL_BINDINGS[..], &CASTER_BINDINGS[..]] {
            let bindings: HashSet<_> = table.iter().map(|slot| slot.binding).collect();
            let names: HashSet<_> = table.iter().map(|slot| slot.name).collect();
            assert_eq!(bindings.len(), table.len());
            assert_eq!(names.len(), table.len());
        }
        assert!(VIEW_KERNEL_BINDINGS.contains(&compute_slot::SHARED_DATA_IN));
        assert!(!VIEW_KERNEL_BINDINGS.contains(&compute_slot::SHARED_DATA_OUT));
    }

    #[test]
    fn receiver_uniform_collects_pushed_parameters() {
        let mut uniform = ShadowReceiverUniform::default();
        uniform.set_vector(material_property::POINT_LIGHT_POSITION, Vec4::new(1.0, 2.0, 3.0, 1.0));
        uniform.set_float(material_property::SHADOW_BIAS, 0.01);
        uniform.set_float(material_property::LIGHT_NEAR_PLANE, 0.5);
        uniform.set_float(material_property::LIGHT_FAR_PLANE, 80.0);
        uniform.set_float("unrelated", 9.0);
        assert_eq!(uniform.light_position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(uniform.params, [0.01, 0.5, 80.0, 0.0]);
    }

    #[test]
    fn align_up_rounds_to_device_alignment() {
        assert_eq!(align_up(224, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(0, 256), 0);
    }
}
