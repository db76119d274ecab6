//! Spatial types
//!
//! World space is the tracker's: right-handed, metres, y up, camera looking
//! down -z. Poses, anchors and scene nodes all use [`Transform`].

pub use nalgebra::{Matrix4, Point3 as NPoint3, Quaternion, Unit, Vector3, Vector4};

/// Position or direction in metres
pub type Vec3 = Vector3<f32>;

/// Location in world space
pub type Point3 = NPoint3<f32>;

/// Homogeneous coordinate
pub type Vec4 = Vector4<f32>;

/// Column-major 4x4 matrix
pub type Mat4 = Matrix4<f32>;

/// Orientation
pub type Quat = Unit<Quaternion<f32>>;

/// Placement of something in its parent's space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Offset from the parent origin
    pub position: Vec3,
    /// Orientation relative to the parent
    pub rotation: Quat,
    /// Per-axis scale; tracked poses always carry 1.0
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::repeat(1.0),
        }
    }
}

impl Transform {
    /// No offset, no rotation, unit scale
    pub fn identity() -> Self {
        Self::default()
    }

    /// Pure translation
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Rigid placement, as reported by a tracker
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    /// Matrix form (translate · rotate · scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// `child` expressed in the space `self` lives in
    pub fn combine(&self, child: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * self.scale.component_mul(&child.position),
            rotation: self.rotation * child.rotation,
            scale: self.scale.component_mul(&child.scale),
        }
    }

    /// Transform taking the parent space back into this one
    pub fn inverse(&self) -> Transform {
        let scale = self.scale.map(f32::recip);
        let rotation = self.rotation.inverse();
        Transform {
            position: rotation * -self.position.component_mul(&scale),
            rotation,
            scale,
        }
    }

    /// Straight-line distance between the two origins
    pub fn translation_distance(&self, other: &Transform) -> f32 {
        (self.position - other.position).norm()
    }

    /// Angle in radians of the rotation between the two orientations
    pub fn rotation_angle(&self, other: &Transform) -> f32 {
        self.rotation.angle_to(&other.rotation)
    }
}

/// Scalar helpers
pub mod utils {
    /// Linear interpolation between `a` and `b`
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Clamp `value` into `[min, max]`
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        value.max(min).min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_undoes_placement() {
        let pose = Transform::from_position_rotation(
            Vec3::new(1.0, 2.0, -3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
        );
        let round_trip = pose.combine(&pose.inverse());
        assert_relative_eq!(round_trip.position, Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(round_trip.rotation.angle(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_offset_follows_device_heading() {
        // Device turned 90° left: "one metre ahead" points down -x
        let device = Transform::from_position_rotation(
            Vec3::new(0.0, 1.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2),
        );
        let ahead = device.combine(&Transform::from_position(Vec3::new(0.0, 0.0, -1.0)));
        assert_relative_eq!(ahead.position, Vec3::new(-1.0, 1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_matrix_matches_combine() {
        let parent = Transform::from_position_rotation(
            Vec3::new(0.5, 0.0, 2.0),
            Quat::from_axis_angle(&Vec3::x_axis(), 0.3),
        );
        let child = Transform::from_position(Vec3::new(0.0, -0.3, -1.5));
        let via_matrix = parent.to_matrix() * child.to_matrix();
        assert_relative_eq!(via_matrix, parent.combine(&child).to_matrix(), epsilon = 1e-5);
        assert_relative_eq!(parent.translation_distance(&Transform::identity()), 0.5f32.hypot(2.0), epsilon = 1e-5);
        assert_relative_eq!(parent.rotation_angle(&Transform::identity()), 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_scalar_utils() {
        assert_relative_eq!(utils::lerp(2.0, 4.0, 0.25), 2.5);
        assert_eq!(utils::clamp(1.7, 0.0, 1.0), 1.0);
        assert_eq!(utils::clamp(-0.2, 0.0, 1.0), 0.0);
        assert_eq!(Point3::origin() + Vec3::new(1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0));
    }
}
