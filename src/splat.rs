//! Contracts with the primary splat renderer.
//!
//! The shadow core never owns splat data. The primary renderer exposes its per-splat
//! buffers through [`SplatSource`] each frame and receives the final shadow parameters
//! through [`MaterialParameters`].

use std::borrow::Cow;
use std::fmt;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::shadow::{ShadowBackend, StructuredBuffer};

/// Splats per chunk record when quantized positions/scales are in use.
pub const SPLATS_PER_CHUNK: u32 = 256;
/// Row width of the splat color texture; splat `i` lives at texel `(i % width, i / width)`.
pub const COLOR_TEXTURE_WIDTH: u32 = 2048;

/// Content fingerprint of a splat asset or shader source.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash(")?;
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "…)")
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VectorFormat {
    /// Three little-endian f32 words.
    #[default]
    Float32 = 0,
    /// One word, 11/10/11 bits, dequantized against the owning chunk's bounds.
    Norm11 = 1,
}

impl VectorFormat {
    pub const fn words(self) -> u32 {
        match self {
            VectorFormat::Float32 => 3,
            VectorFormat::Norm11 => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplatFormat {
    pub position: VectorFormat,
    pub scale: VectorFormat,
    pub color: u8,
}

impl SplatFormat {
    /// Packed word handed to the kernels: position | scale << 8 | color << 16.
    pub fn packed_word(&self) -> u32 {
        self.position as u32 | (self.scale as u32) << 8 | (self.color as u32) << 16
    }

    /// Words per splat in the packed "other" buffer: one rotation word plus the scale.
    pub fn other_stride_words(&self) -> u32 {
        1 + self.scale.words()
    }
}

/// Per-frame scalar state of the primary renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplatRenderState {
    pub object_to_world: Mat4,
    pub splat_scale: f32,
    pub opacity_scale: f32,
    pub point_display_size: f32,
    pub splat_count: u32,
    /// Splats surviving filtering; never larger than `splat_count`.
    pub active_splat_count: u32,
    pub format: SplatFormat,
    /// `None` while no asset is bound.
    pub content_version: Option<ContentHash>,
}

impl Default for SplatRenderState {
    fn default() -> Self {
        Self {
            object_to_world: Mat4::IDENTITY,
            splat_scale: 1.0,
            opacity_scale: 1.0,
            point_display_size: 0.0,
            splat_count: 0,
            active_splat_count: 0,
            format: SplatFormat::default(),
            content_version: None,
        }
    }
}

impl SplatRenderState {
    pub fn has_asset(&self) -> bool {
        self.content_version.is_some()
    }
}

/// Read-only GPU buffers owned by the primary renderer.
pub struct SplatInputs<'a, B: ShadowBackend + ?Sized> {
    pub positions: &'a B::Buffer,
    pub other: &'a B::Buffer,
    pub chunks: Option<&'a B::Buffer>,
    pub color: &'a B::Texture,
    /// Pre-sorted draw order from the main render, reused as-is.
    pub order: &'a B::Buffer,
    pub edit_selected: Option<&'a B::Buffer>,
    pub edit_deleted: Option<&'a B::Buffer>,
}

impl<'a, B: ShadowBackend + ?Sized> SplatInputs<'a, B> {
    /// Required buffers are still alive. The primary renderer may drop them when its asset changes.
    pub fn is_valid(&self) -> bool {
        self.positions.is_valid() && self.other.is_valid() && self.order.is_valid()
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunks.filter(|chunks| chunks.is_valid()).map(|chunks| chunks.element_count()).unwrap_or(0)
    }

    /// Edit bits are only honoured when both the selection and deletion buffers are usable.
    pub fn edit_bits_valid(&self) -> bool {
        matches!(
            (self.edit_selected, self.edit_deleted),
            (Some(selected), Some(deleted)) if selected.is_valid() && deleted.is_valid()
        )
    }
}

/// Implemented by the primary splat renderer.
pub trait SplatSource<B: ShadowBackend> {
    fn render_state(&self) -> SplatRenderState;

    /// `None` while the renderer has no valid GPU setup.
    fn gpu_inputs(&self) -> Option<SplatInputs<'_, B>>;
}

/// Uniform state of a shading material.
pub trait MaterialParameters {
    fn set_float(&mut self, name: &str, value: f32);
    fn set_vector(&mut self, name: &str, value: Vec4);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Float(f32),
    Vector(Vec4),
}

/// Named property overrides, applied on top of a material for one draw.
#[derive(Clone, Debug, Default)]
pub struct PropertyBlock {
    values: Vec<(Cow<'static, str>, PropertyValue)>,
}

impl PropertyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.values.iter().find(|(key, _)| key == name).map(|(_, value)| *value)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            PropertyValue::Float(value) => Some(value),
            PropertyValue::Vector(_) => None,
        }
    }

    pub fn vector(&self, name: &str) -> Option<Vec4> {
        match self.get(name)? {
            PropertyValue::Vector(value) => Some(value),
            PropertyValue::Float(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    fn insert(&mut self, name: &str, value: PropertyValue) {
        if let Some(slot) = self.values.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value;
        } else {
            self.values.push((Cow::Owned(name.to_string()), value));
        }
    }
}

impl MaterialParameters for PropertyBlock {
    fn set_float(&mut self, name: &str, value: f32) {
        self.insert(name, PropertyValue::Float(value));
    }

    fn set_vector(&mut self, name: &str, value: Vec4) {
        self.insert(name, PropertyValue::Vector(value));
    }
}

/// CPU description of one splat, used to build test scenes and the bake tool's cloud.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplatPoint {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub color: Vec3,
    pub opacity: f32,
}

impl SplatPoint {
    pub fn sphere(position: Vec3, radius: f32) -> Self {
        Self { position, rotation: Quat::IDENTITY, scale: Vec3::splat(radius), color: Vec3::ONE, opacity: 1.0 }
    }
}

/// Float32-format buffer contents for a set of splats.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedSplats {
    pub positions: Vec<u32>,
    pub other: Vec<u32>,
    pub colors: Vec<[f32; 4]>,
    pub order: Vec<u32>,
}

impl EncodedSplats {
    pub fn format() -> SplatFormat {
        SplatFormat { position: VectorFormat::Float32, scale: VectorFormat::Float32, color: 0 }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(bytemuck::cast_slice(&self.positions));
        hasher.update(bytemuck::cast_slice(&self.other));
        hasher.update(bytemuck::cast_slice(&self.colors));
        ContentHash::from_bytes(*hasher.finalize().as_bytes())
    }
}

pub fn encode_splats(points: &[SplatPoint]) -> EncodedSplats {
    let mut encoded = EncodedSplats {
        positions: Vec::with_capacity(points.len() * 3),
        other: Vec::with_capacity(points.len() * 4),
        colors: Vec::with_capacity(points.len()),
        order: (0..points.len() as u32).collect(),
    };
    for point in points {
        encoded.positions.extend(point.position.to_array().map(f32::to_bits));
        encoded.other.push(encode_rotation(point.rotation));
        encoded.other.extend(point.scale.to_array().map(f32::to_bits));
        encoded.colors.push(point.color.extend(point.opacity.clamp(0.0, 1.0)).to_array());
    }
    encoded
}

const ROTATION_RANGE: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Smallest-three quaternion packing: 10/10/10 bits for the three smaller components
/// in ascending index order, 2 bits for the index of the dropped largest one.
pub fn encode_rotation(rotation: Quat) -> u32 {
    let mut q = rotation.normalize().to_array();
    let largest = (0..4)
        .max_by(|&a, &b| q[a].abs().total_cmp(&q[b].abs()))
        .unwrap_or(3);
    if q[largest] < 0.0 {
        q = q.map(|c| -c);
    }
    let mut packed = (largest as u32) << 30;
    let mut shift = 0;
    for (index, component) in q.iter().enumerate() {
        if index == largest {
            continue;
        }
        let unit = (component / ROTATION_RANGE * 0.5 + 0.5).clamp(0.0, 1.0);
        packed |= ((unit * 1023.0).round() as u32) << shift;
        shift += 10;
    }
    packed
}

pub fn decode_rotation(packed: u32) -> Quat {
    let largest = (packed >> 30) as usize;
    let mut small = [0.0f32; 3];
    for (slot, value) in small.iter_mut().enumerate() {
        let bits = (packed >> (slot * 10)) & 1023;
        *value = (bits as f32 / 1023.0 * 2.0 - 1.0) * ROTATION_RANGE;
    }
    let missing = (1.0 - small.iter().map(|c| c * c).sum::<f32>()).max(0.0).sqrt();
    let mut q = [0.0f32; 4];
    let mut next = 0;
    for (index, component) in q.iter_mut().enumerate() {
        if index == largest {
            *component = missing;
        } else {
            *component = small[next];
            next += 1;
        }
    }
    Quat::from_array(q)
}

/// Texel of the color texture that holds splat `index` (row-major, `width` texels per row).
pub fn color_texel(index: u32, width: u32) -> (u32, u32) {
    let width = width.max(1);
    (index % width, index / width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_format_word_matches_kernel_layout() {
        let format = SplatFormat { position: VectorFormat::Norm11, scale: VectorFormat::Float32, color: 3 };
        assert_eq!(format.packed_word(), 1 | (3 << 16));
        assert_eq!(format.other_stride_words(), 4);
    }

    #[test]
    fn rotation_packing_survives_quantisation() {
        let rotations = [
            Quat::IDENTITY,
            Quat::from_rotation_y(1.1),
            Quat::from_euler(glam::EulerRot::XYZ, 0.3, -2.0, 0.7),
            Quat::from_xyzw(-0.9, 0.1, 0.3, 0.2).normalize(),
        ];
        for rotation in rotations {
            let decoded = decode_rotation(encode_rotation(rotation));
            assert!(decoded.dot(rotation).abs() > 0.999, "{rotation:?} -> {decoded:?}");
        }
    }

    #[test]
    fn encoding_writes_float32_layout() {
        let encoded = encode_splats(&[
            SplatPoint::sphere(Vec3::new(1.0, 2.0, 3.0), 0.5),
            SplatPoint::sphere(Vec3::ZERO, 0.25),
        ]);
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded.positions.len(), 6);
        assert_eq!(f32::from_bits(encoded.positions[2]), 3.0);
        assert_eq!(encoded.other.len(), 2 * EncodedSplats::format().other_stride_words() as usize);
        assert_eq!(f32::from_bits(encoded.other[5]), 0.25);
        assert_eq!(encoded.order, vec![0, 1]);
        assert_eq!(encoded.colors[0][3], 1.0);
    }

    #[test]
    fn content_hash_tracks_data() {
        let a = encode_splats(&[SplatPoint::sphere(Vec3::ZERO, 1.0)]);
        let b = encode_splats(&[SplatPoint::sphere(Vec3::X, 1.0)]);
        assert_eq!(a.content_hash(), a.clone().content_hash());
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn property_block_overwrites_by_name() {
        let mut block = PropertyBlock::new();
        block.set_float("bias", 0.1);
        block.set_float("bias", 0.2);
        block.set_vector("light", Vec4::ONE);
        assert_eq!(block.len(), 2);
        assert_eq!(block.float("bias"), Some(0.2));
        assert_eq!(block.vector("bias"), None);
        assert_eq!(block.vector("light"), Some(Vec4::ONE));
    }

    #[test]
    fn color_texels_are_row_major() {
        assert_eq!(color_texel(0, 4), (0, 0));
        assert_eq!(color_texel(5, 4), (1, 1));
    }
}
