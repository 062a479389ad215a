use glam::{Mat4, Vec2, Vec3, Vec4};

pub const CUBE_FACE_COUNT: usize = 6;

/// Every face covers a quarter turn so the six frusta tile the light's sphere.
pub const FACE_FOV_Y_RADIANS: f32 = std::f32::consts::FRAC_PI_2;

/// One perspective face of the point light's cube map, in render order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; CUBE_FACE_COUNT] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn label(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "+X",
            CubeFace::NegativeX => "-X",
            CubeFace::PositiveY => "+Y",
            CubeFace::NegativeY => "-Y",
            CubeFace::PositiveZ => "+Z",
            CubeFace::NegativeZ => "-Z",
        }
    }

    /// Name under which the host binds this face's depth target for the composite pass.
    pub const fn global_texture_name(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "shadow_map_face_px",
            CubeFace::NegativeX => "shadow_map_face_nx",
            CubeFace::PositiveY => "shadow_map_face_py",
            CubeFace::NegativeY => "shadow_map_face_ny",
            CubeFace::PositiveZ => "shadow_map_face_pz",
            CubeFace::NegativeZ => "shadow_map_face_nz",
        }
    }

    pub const fn profile_label(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "SplatShadow.DrawFace_PX",
            CubeFace::NegativeX => "SplatShadow.DrawFace_NX",
            CubeFace::PositiveY => "SplatShadow.DrawFace_PY",
            CubeFace::NegativeY => "SplatShadow.DrawFace_NY",
            CubeFace::PositiveZ => "SplatShadow.DrawFace_PZ",
            CubeFace::NegativeZ => "SplatShadow.DrawFace_NZ",
        }
    }

    pub fn look_direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    pub fn up_direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }

    /// Face whose frustum contains `direction` (major-axis selection, ties go to X then Y).
    pub fn for_direction(direction: Vec3) -> Self {
        let abs = direction.abs();
        if abs.x >= abs.y && abs.x >= abs.z {
            if direction.x >= 0.0 {
                CubeFace::PositiveX
            } else {
                CubeFace::NegativeX
            }
        } else if abs.y >= abs.z {
            if direction.y >= 0.0 {
                CubeFace::PositiveY
            } else {
                CubeFace::NegativeY
            }
        } else if direction.z >= 0.0 {
            CubeFace::PositiveZ
        } else {
            CubeFace::NegativeZ
        }
    }
}

/// Right-handed look-at from the light toward `light_position + look_direction`.
///
/// View space looks down -Z, matching the projection from [`face_projection`]. The depth
/// draw disables face culling, so the per-face up vectors only fix the image orientation
/// and never the triangle winding.
pub fn view_matrix_for_face(light_position: Vec3, face: CubeFace) -> Mat4 {
    Mat4::look_to_rh(light_position, face.look_direction(), face.up_direction())
}

/// 90 degree, aspect 1 perspective with wgpu's [0, 1] clip depth.
pub fn face_projection(near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(FACE_FOV_Y_RADIANS, 1.0, near, far)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceSample {
    pub face: CubeFace,
    /// Texture coordinates with the origin at the top-left texel.
    pub uv: Vec2,
    pub depth: f32,
}

impl FaceSample {
    pub fn texel(&self, resolution: u32) -> (u32, u32) {
        let max = resolution.saturating_sub(1) as f32;
        let x = (self.uv.x * resolution as f32).floor().clamp(0.0, max) as u32;
        let y = (self.uv.y * resolution as f32).floor().clamp(0.0, max) as u32;
        (x, y)
    }
}

/// Projects a world point into the face that sees it, the same way the depth draw does.
pub fn project_to_face(light_position: Vec3, point: Vec3, near: f32, far: f32) -> Option<FaceSample> {
    let face = CubeFace::for_direction(point - light_position);
    let clip = face_projection(near, far) * view_matrix_for_face(light_position, face) * point.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc: Vec4 = clip / clip.w;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some(FaceSample { face, uv: Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5), depth: ndc.z })
}
