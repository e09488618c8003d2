//! Matrix and vector helpers used by the scene graph.
//!
//! All matrices are glam [`Mat4`] values stored column-major, so element `[12]`, `[13]`, `[14]`
//! of [`Mat4::to_cols_array`] is the translation column. Every function here is pure: inputs
//! are taken by value (or copied out of a reference before the result is built), which makes
//! `m = multiply(m, x)` and `m = affine_inverse(&m)` safe without any temporaries at the call
//! site.
//!
//! # Conventions
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`compose`] | `T · R · S`, so points are scaled, then rotated, then translated |
//! | [`perspective`] | right-handed, clip-space z in `[-1, 1]` |
//! | [`orthogonal`] | right-handed, symmetric around the view axis |
//! | [`lookat`] | local (eye) space to parent space |
//! | [`inverse_lookat`] | parent space to eye space, the form a camera uses |

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Returns the 4×4 identity matrix.
pub fn identity() -> Mat4 {
    Mat4::IDENTITY
}

/// Builds a local matrix from optional translation, rotation and scale.
///
/// A missing component contributes nothing: zero translation, no rotation, unit scale.
///
/// # Example
///
/// ```
/// use pegasus3d::math::compose;
/// use pegasus3d::Vec3;
///
/// let m = compose(Some(Vec3::new(1.0, 2.0, 3.0)), None, None);
/// assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
/// ```
pub fn compose(origin: Option<Vec3>, orientation: Option<Quat>, scale: Option<Vec3>) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        scale.unwrap_or(Vec3::ONE),
        orientation.unwrap_or(Quat::IDENTITY),
        origin.unwrap_or(Vec3::ZERO),
    )
}

/// Standard 4×4 product `a · b`.
pub fn multiply(a: Mat4, b: Mat4) -> Mat4 {
    a * b
}

/// Closed-form inverse of an affine matrix.
///
/// The bottom row of `m` is assumed to be `[0, 0, 0, 1]`; if it is not, the result is
/// meaningless. A singular upper 3×3 produces non-finite values. Use [`try_affine_inverse`]
/// when the input is not known to be invertible.
pub fn affine_inverse(m: &Mat4) -> Mat4 {
    let linear = Mat3::from_mat4(*m);
    let translation = m.w_axis.truncate();
    let inv = linear.inverse();
    let t = -(inv * translation);
    Mat4::from_cols(
        inv.x_axis.extend(0.0),
        inv.y_axis.extend(0.0),
        inv.z_axis.extend(0.0),
        t.extend(1.0),
    )
}

/// Like [`affine_inverse`], but returns `None` when the linear part cannot be inverted.
pub fn try_affine_inverse(m: &Mat4) -> Option<Mat4> {
    let det = Mat3::from_mat4(*m).determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inv = affine_inverse(m);
    inv.is_finite().then_some(inv)
}

/// Perspective projection from a vertical field of view in degrees.
///
/// Element `[11]` is `-1` and element `[10]` is `(far + near) / (near - far)`.
/// The caller guarantees `0 < near < far`.
pub fn perspective(fov_degrees: f32, near: f32, far: f32, aspect: f32) -> Mat4 {
    let tan_half_fov = (fov_degrees.to_radians() * 0.5).tan();
    Mat4::from_cols(
        Vec4::new(1.0 / (tan_half_fov * aspect), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0 / tan_half_fov, 0.0, 0.0),
        Vec4::new(0.0, 0.0, (far + near) / (near - far), -1.0),
        Vec4::new(0.0, 0.0, 2.0 * far * near / (near - far), 0.0),
    )
}

/// Perspective projection whose frustum is `height` tall (half extent) at the near plane.
pub fn perspective_height(height: f32, near: f32, far: f32, aspect: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(near / (height * aspect), 0.0, 0.0, 0.0),
        Vec4::new(0.0, near / height, 0.0, 0.0),
        Vec4::new(0.0, 0.0, (far + near) / (near - far), -1.0),
        Vec4::new(0.0, 0.0, 2.0 * far * near / (near - far), 0.0),
    )
}

/// Orthogonal projection showing `height` units above and below the view axis.
pub fn orthogonal(height: f32, near: f32, far: f32, aspect: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(1.0 / (height * aspect), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0 / height, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 2.0 / (near - far), 0.0),
        Vec4::new(0.0, 0.0, (far + near) / (near - far), 1.0),
    )
}

/// Orthonormal basis `(right, up, forward)` for a viewer at `eye` looking at `target`.
///
/// When `up` is parallel to the view direction any vector perpendicular to it is used
/// instead, and a zero-length view direction looks down -Z.
fn view_basis(eye: Vec3, target: Vec3, up: Vec3) -> (Vec3, Vec3, Vec3) {
    let forward = (target - eye).normalize_or(Vec3::NEG_Z);
    let right = match forward.cross(up).try_normalize() {
        Some(right) => right,
        None => forward.cross(forward.any_orthonormal_vector()).normalize(),
    };
    let true_up = right.cross(forward);
    (right, true_up, forward)
}

/// Matrix taking eye-space coordinates into the parent space of a viewer at `eye`.
pub fn lookat(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let (right, up, forward) = view_basis(eye, target, up);
    Mat4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        (-forward).extend(0.0),
        eye.extend(1.0),
    )
}

/// Matrix taking parent-space coordinates into the eye space of a viewer at `eye`.
pub fn inverse_lookat(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let (right, up, forward) = view_basis(eye, target, up);
    Mat4::from_cols(
        Vec4::new(right.x, up.x, -forward.x, 0.0),
        Vec4::new(right.y, up.y, -forward.y, 0.0),
        Vec4::new(right.z, up.z, -forward.z, 0.0),
        Vec4::new(-right.dot(eye), -up.dot(eye), forward.dot(eye), 1.0),
    )
}

/// Transforms `v` as a point (`w = 1`), ignoring the projective row.
pub fn multiply_vector(m: &Mat4, v: Vec3) -> Vec3 {
    m.transform_point3(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_affine() -> Mat4 {
        compose(
            Some(Vec3::new(3.0, -2.0, 7.5)),
            Some(Quat::from_euler(glam::EulerRot::YXZ, 0.4, -1.1, 0.25)),
            Some(Vec3::new(2.0, 0.5, 1.5)),
        )
    }

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
        }
    }

    #[test]
    fn identity_is_neutral_for_multiply() {
        let m = sample_affine() * perspective(60.0, 0.5, 50.0, 1.5);
        assert_mat_eq(multiply(identity(), m), m);
        assert_mat_eq(multiply(m, identity()), m);
    }

    #[test]
    fn affine_inverse_round_trips_to_identity() {
        let m = sample_affine();
        assert_mat_eq(multiply(m, affine_inverse(&m)), identity());
        assert_mat_eq(multiply(affine_inverse(&m), m), identity());
    }

    #[test]
    fn multiply_in_place_reads_inputs_first() {
        let step = compose(Some(Vec3::X), Some(Quat::from_rotation_z(0.3)), None);
        let mut m = step;
        m = multiply(m, m);
        assert_mat_eq(m, step * step);
        m = affine_inverse(&m);
        assert_mat_eq(m, (step * step).inverse());
    }

    #[test]
    fn try_affine_inverse_rejects_singular() {
        let flat = compose(None, None, Some(Vec3::new(1.0, 0.0, 1.0)));
        assert!(try_affine_inverse(&flat).is_none());
        assert!(try_affine_inverse(&sample_affine()).is_some());
    }

    #[test]
    fn compose_applies_scale_then_rotation_then_translation() {
        let m = compose(
            Some(Vec3::new(10.0, 0.0, 0.0)),
            Some(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
            Some(Vec3::splat(2.0)),
        );
        let p = multiply_vector(&m, Vec3::X);
        assert_abs_diff_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn perspective_matches_documented_layout() {
        let (near, far) = (0.1f32, 1000.0f32);
        let m = perspective(50.0, near, far, 1.0).to_cols_array();
        assert_eq!(m[11], -1.0);
        assert_eq!(m[10], (far + near) / (near - far));
        assert_eq!(m[14], 2.0 * far * near / (near - far));
        assert_eq!(m[15], 0.0);
        let tan = (25.0f32).to_radians().tan();
        assert_abs_diff_eq!(m[5], 1.0 / tan, epsilon = 1e-6);
        assert_abs_diff_eq!(m[0], m[5], epsilon = 1e-6);
    }

    #[test]
    fn perspective_agrees_with_glam() {
        let ours = perspective(70.0, 0.5, 200.0, 16.0 / 9.0);
        let theirs = Mat4::perspective_rh_gl(70f32.to_radians(), 16.0 / 9.0, 0.5, 200.0);
        assert_mat_eq(ours, theirs);
    }

    #[test]
    fn height_perspective_scales_by_near_plane() {
        let m = perspective_height(2.0, 0.5, 100.0, 2.0).to_cols_array();
        assert_abs_diff_eq!(m[0], 0.125);
        assert_abs_diff_eq!(m[5], 0.25);
        assert_eq!(m[11], -1.0);
    }

    #[test]
    fn orthogonal_maps_view_box_to_clip_cube() {
        let m = orthogonal(10.0, 1.0, 101.0, 2.0);
        let corner = m.project_point3(Vec3::new(20.0, 10.0, -101.0));
        assert_abs_diff_eq!(corner.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(corner.y, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(corner.z, 1.0, epsilon = 1e-5);
        let near = m.project_point3(Vec3::new(0.0, 0.0, -1.0));
        assert_abs_diff_eq!(near.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn inverse_lookat_inverts_lookat() {
        let eye = Vec3::new(4.0, 3.0, 8.0);
        let target = Vec3::new(-1.0, 0.5, 0.0);
        let forward = lookat(eye, target, Vec3::Y);
        let backward = inverse_lookat(eye, target, Vec3::Y);
        assert_mat_eq(forward * backward, identity());
        let seen = multiply_vector(&backward, target);
        assert_abs_diff_eq!(seen.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(seen.y, 0.0, epsilon = 1e-5);
        assert!(seen.z < 0.0);
    }

    #[test]
    fn lookat_survives_parallel_up() {
        let m = lookat(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), Vec3::Y);
        assert!(m.is_finite());
        assert_mat_eq(m * affine_inverse(&m), identity());
        let at_target = multiply_vector(&inverse_lookat(Vec3::ZERO, Vec3::Y, Vec3::Y), Vec3::Y);
        assert_abs_diff_eq!(at_target.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn multiply_vector_applies_translation() {
        let m = compose(Some(Vec3::new(1.0, 2.0, 3.0)), None, None);
        assert_eq!(multiply_vector(&m, Vec3::ONE), Vec3::new(2.0, 3.0, 4.0));
    }
}
