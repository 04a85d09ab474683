// q_shared.rs -- math and flag definitions shared by every engine module

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Column-major 4x4 matrix, laid out the way the device expects it.
pub type Mat4 = [f32; 16];

pub const M_TAU_F: f32 = std::f32::consts::TAU;

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

pub const AXIS_DEFAULT: [Vec3; 3] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

pub const MAT4_IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

// ============================================================
// Console variable flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        /// Saved to the config file.
        const ARCHIVE    = 0x0001;
        /// Only settable from code.
        const NOSET      = 0x0008;
        /// Changes wait until the next restart.
        const LATCH      = 0x0010;
        const CHEAT      = 0x0200;
    }
}
pub const CVAR_ZERO: CvarFlags = CvarFlags::empty();
pub const CVAR_ARCHIVE: CvarFlags = CvarFlags::ARCHIVE;
pub const CVAR_NOSET: CvarFlags = CvarFlags::NOSET;
pub const CVAR_LATCH: CvarFlags = CvarFlags::LATCH;
pub const CVAR_CHEAT: CvarFlags = CvarFlags::CHEAT;

// ============================================================
// Vector math
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

/// veca + scale * vecb
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Plane in normal/distance form.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
}

// ============================================================
// Matrix math
// ============================================================

/// `a * b` for column-major matrices.
pub fn mat4_mult(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += a[k * 4 + row] * b[col * 4 + k];
            }
            out[col * 4 + row] = sum;
        }
    }
    out
}

/// Row-by-row product used when composing an entity transform with the
/// world view matrix: `out[i][j] = sum(a[i][k] * b[k][j])`.
pub fn mult_matrix(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for i in 0..4 {
        for j in 0..4 {
            out[i * 4 + j] = a[i * 4] * b[j]
                + a[i * 4 + 1] * b[4 + j]
                + a[i * 4 + 2] * b[8 + j]
                + a[i * 4 + 3] * b[12 + j];
        }
    }
    out
}

/// Pure translation matrix.
pub fn mat4_reset_translate(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = MAT4_IDENTITY;
    m[12] = x;
    m[13] = y;
    m[14] = z;
    m
}

/// Orthographic projection, same parameters as glOrtho.
pub fn mat4_ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = [0.0; 16];
    m[0] = 2.0 / (right - left);
    m[5] = 2.0 / (top - bottom);
    m[10] = -2.0 / (far - near);
    m[12] = -(right + left) / (right - left);
    m[13] = -(top + bottom) / (top - bottom);
    m[14] = -(far + near) / (far - near);
    m[15] = 1.0;
    m
}
