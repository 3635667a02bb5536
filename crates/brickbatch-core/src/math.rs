use glam::{Mat4, Vec3};

/// Signed determinant of an instance transform. Negative means the
/// transform mirrors geometry and flips triangle winding.
pub fn determinant(transform: &Mat4) -> f32 {
    transform.determinant()
}

/// Counter-clockwise front faces are kept only for strictly positive
/// determinants; degenerate transforms fall back to clockwise.
pub fn is_counter_clockwise(transform: &Mat4) -> bool {
    determinant(transform) > 0.0
}

/// Inverse-transpose of the world matrix, used to transform normals.
/// Singular matrices yield a zero matrix.
pub fn normal_matrix(transform: &Mat4) -> Mat4 {
    if determinant(transform) == 0.0 {
        return Mat4::ZERO;
    }
    transform.inverse().transpose()
}

/// Hash a stream position into a deterministic pseudo-random u32.
fn color_hash(seed: u32, index: u32) -> u32 {
    let mut state = seed
        .wrapping_mul(0x9E3779B9)
        .wrapping_add(index.wrapping_mul(0x517CC1B7));

    state = state ^ (state >> 16);
    state = state.wrapping_mul(0x45D9F3B);
    state = state ^ (state >> 16);
    state = state.wrapping_mul(0x45D9F3B);
    state = state ^ (state >> 16);

    state
}

/// Convert a hash value to a float in [0, 1).
fn hash_to_unit(hash: u32) -> f32 {
    (hash >> 8) as f32 / 16_777_216.0 // 2^24
}

/// Stream of pseudo-random debug colors, re-seeded every frame.
#[derive(Debug, Clone)]
pub struct DebugColors {
    seed: u32,
    cursor: u32,
}

impl DebugColors {
    pub fn new(seed: u32) -> Self {
        Self { seed, cursor: 0 }
    }

    /// Next opaque color of the stream.
    pub fn next_color(&mut self) -> [f32; 4] {
        let base = self.cursor;
        self.cursor = self.cursor.wrapping_add(3);
        [
            hash_to_unit(color_hash(self.seed, base)),
            hash_to_unit(color_hash(self.seed, base + 1)),
            hash_to_unit(color_hash(self.seed, base + 2)),
            1.0,
        ]
    }
}

/// Area-weighted face normal of a triangle (not normalized).
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_flips_winding() {
        let identity = Mat4::IDENTITY;
        let mirrored = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        assert!(is_counter_clockwise(&identity));
        assert!(!is_counter_clockwise(&mirrored));
        assert!(determinant(&mirrored) < 0.0);
    }

    #[test]
    fn test_degenerate_transform_is_clockwise() {
        let flat = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(!is_counter_clockwise(&flat));
        assert_eq!(normal_matrix(&flat), Mat4::ZERO);
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale() {
        let m = Mat4::from_scale(Vec3::splat(2.0));
        let n = normal_matrix(&m);
        let v = n.transform_vector3(Vec3::Y);
        assert!((v - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_debug_colors_reset_per_seed() {
        let mut a = DebugColors::new(1123);
        let mut b = DebugColors::new(1123);
        let first = a.next_color();
        assert_eq!(first, b.next_color());
        assert_ne!(first, a.next_color());
        for c in first.iter() {
            assert!((0.0..=1.0).contains(c));
        }
    }

    #[test]
    fn test_face_normal_orientation() {
        let n = face_normal(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert_eq!(n, Vec3::Z);
    }
}
