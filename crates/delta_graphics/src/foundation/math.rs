//! Math utilities and types
//!
//! Provides the nalgebra aliases used across the crate plus the conversions
//! needed by the SMD format: 8.8 fixed-point scalars, the `PI / 2048`
//! angle encoding, and row-major (row-vector) matrices.
//!
//! All matrices in this crate follow nalgebra's column-vector convention. A
//! row-vector product `A * B` read from the file is therefore `B * A` here.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Integer 3D vector, used for fixed-point Euler rotations
pub type IVec3 = Vector3<i32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Scale of the 8.8 fixed-point values stored in model files
    pub const FIXED_POINT_SCALE: f32 = 256.0;

    /// Divisor of fixed-point angles: `radians = units * PI / 2048`
    pub const ANGLE_UNIT_DIVISOR: f32 = 2048.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Decode an 8.8 fixed-point integer
    pub fn fixed_to_float(value: i32) -> f32 {
        value as f32 / constants::FIXED_POINT_SCALE
    }

    /// Encode a float as an 8.8 fixed-point integer (truncating)
    pub fn float_to_fixed(value: f32) -> i32 {
        (value * constants::FIXED_POINT_SCALE) as i32
    }

    /// Decode three fixed-point integers into a vector
    pub fn fixed_to_vec3(value: [i32; 3]) -> Vec3 {
        Vec3::new(fixed_to_float(value[0]), fixed_to_float(value[1]), fixed_to_float(value[2]))
    }

    /// Convert fixed-point angle units to radians.
    ///
    /// The scale is `PI / 2048` per unit.
    pub fn angle_to_radians(units: i32) -> f32 {
        units as f32 * constants::PI / constants::ANGLE_UNIT_DIVISOR
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with conventions used by the model format
pub trait Mat4Ext {
    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Build a matrix from 16 floats in row-major, row-vector order
    fn from_row_vector_layout(values: &[f32; 16]) -> Mat4;

    /// Swap the Y and Z outputs of the transform (file space to render space)
    fn flipped_yz(&self) -> Mat4;

    /// Translation part of an affine matrix
    fn translation_part(&self) -> Vec3;

    /// Overwrite the translation part of an affine matrix
    fn set_translation_part(&mut self, translation: Vec3);

    /// Pack the first three rows of the axis-flipped matrix as 12 floats
    fn to_flipped_3x4(&self) -> [f32; 12];
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn from_row_vector_layout(values: &[f32; 16]) -> Mat4 {
        // Each stored row becomes a column
        Mat4::from_column_slice(values)
    }

    fn flipped_yz(&self) -> Mat4 {
        let mut result = *self;
        result.swap_rows(1, 2);
        result
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }

    fn set_translation_part(&mut self, translation: Vec3) {
        self[(0, 3)] = translation.x;
        self[(1, 3)] = translation.y;
        self[(2, 3)] = translation.z;
    }

    fn to_flipped_3x4(&self) -> [f32; 12] {
        let flipped = self.flipped_yz();
        let mut out = [0.0; 12];
        for row in 0..3 {
            for column in 0..4 {
                out[row * 4 + column] = flipped[(row, column)];
            }
        }
        out
    }
}

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color from components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Pack as `0xAARRGGBB`
    pub fn to_argb(self) -> u32 {
        let channel = |v: f32| u32::from((v.clamp(0.0, 1.0) * 255.0).round() as u8);
        (channel(self.a) << 24) | (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Components as an array, for effect parameters
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Add for Color {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl Sub for Color {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b, self.a - rhs.a)
    }
}

impl Mul<f32> for Color {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.r * rhs, self.g * rhs, self.b * rhs, self.a * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fixed_point_round_trip_within_one_unit() {
        for &x in &[0.0_f32, 1.0, -1.0, 3.25, -127.99, 1000.123, 0.001] {
            let decoded = utils::fixed_to_float(utils::float_to_fixed(x));
            assert!((decoded - x).abs() < 1.0 / 256.0, "{x} decoded as {decoded}");
        }
    }

    #[test]
    fn angle_units_use_pi_over_2048() {
        assert_relative_eq!(utils::angle_to_radians(2048), constants::PI, epsilon = 1e-6);
        assert_relative_eq!(utils::angle_to_radians(0), 0.0);
    }

    #[test]
    fn row_vector_layout_is_transposed() {
        let mut values = [0.0; 16];
        values[0] = 1.0;
        values[5] = 1.0;
        values[10] = 1.0;
        values[15] = 1.0;
        // Row-vector translation lives in the fourth row
        values[12] = 5.0;
        values[13] = 6.0;
        values[14] = 7.0;

        let m = Mat4::from_row_vector_layout(&values);
        assert_relative_eq!(m.translation_part(), Vec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn flipped_yz_swaps_outputs() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let p = m.flipped_yz().transform_point(&Point3::origin());
        assert_relative_eq!(p.coords, Vec3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn packed_3x4_rows_follow_flip() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let packed = m.to_flipped_3x4();
        assert_relative_eq!(packed[3], 1.0);
        assert_relative_eq!(packed[7], 3.0);
        assert_relative_eq!(packed[11], 2.0);
    }

    #[test]
    fn color_packs_as_argb() {
        assert_eq!(Color::WHITE.to_argb(), 0xFFFF_FFFF);
        assert_eq!(Color::new(1.0, 0.0, 0.0, 1.0).to_argb(), 0xFFFF_0000);
    }
}
