use glam::{Mat4, Vec4};

/// Builds a matrix from four rows written in reading order.
///
/// glam stores matrices column-major, so the rows are assembled as columns
/// and transposed.
pub fn mat4_from_rows(r0: Vec4, r1: Vec4, r2: Vec4, r3: Vec4) -> Mat4 {
    Mat4::from_cols(r0, r1, r2, r3).transpose()
}

/// Permutation that swaps the second and third axes.
///
/// The camera works in a Z-up world while clip space treats the second axis as
/// vertical and the third as depth. The matrix is its own inverse.
pub fn axis_swap() -> Mat4 {
    mat4_from_rows(
        Vec4::new(1.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.0, 1.0),
    )
}

/// Horizontal squash that compensates for a non-square viewport.
pub fn aspect_correction(aspect_ratio: f32) -> Mat4 {
    if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
        return Mat4::IDENTITY;
    }
    Mat4::from_diagonal(Vec4::new(1.0 / aspect_ratio, 1.0, 1.0, 1.0))
}

/// Orthographic projection for the Z-up convention.
///
/// The second row maps the depth axis `[near, far]` onto `[-1, 1]`.
pub fn orthographic_z_up(span: f32, near: f32, far: f32) -> Mat4 {
    let depth = far - near;
    mat4_from_rows(
        Vec4::new(1.0 / span, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / depth, 0.0, (-2.0 * near / depth) - 1.0),
        Vec4::new(0.0, 0.0, 1.0 / span, 0.0),
        Vec4::new(0.0, 0.0, 0.0, 1.0),
    )
}

/// Perspective projection for the Z-up convention.
///
/// Depth travels along the second axis, which is also copied into `w` for the
/// perspective divide.
pub fn perspective_z_up(fov_y: f32, near: f32, far: f32) -> Mat4 {
    let half = fov_y / 2.0;
    let edge_length = far / half.cos();
    let far_span = edge_length * half.sin();
    mat4_from_rows(
        Vec4::new(far / far_span, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / (far - near), 0.0, -near / (far - near)),
        Vec4::new(0.0, 0.0, far / far_span, 0.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
    )
}

/// `count` evenly spaced samples covering `[start, end]` inclusively.
pub fn linspace(start: f32, end: f32, count: usize) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f32;
            (0..count)
                .map(|i| if i + 1 == count { end } else { start + step * i as f32 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn rows_are_laid_out_in_reading_order() {
        let m = mat4_from_rows(
            Vec4::new(1.0, 2.0, 3.0, 4.0),
            Vec4::ZERO,
            Vec4::ZERO,
            Vec4::ZERO,
        );
        assert_eq!(m.row(0), Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(m.col(3), Vec4::new(4.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn axis_swap_is_an_involution() {
        let swap = axis_swap();
        assert_eq!(swap * swap, Mat4::IDENTITY);
        assert_eq!(
            swap.transform_vector3(Vec3::new(1.0, 2.0, 3.0)),
            Vec3::new(1.0, 3.0, 2.0)
        );
    }

    #[test]
    fn aspect_correction_scales_first_axis_only() {
        let m = aspect_correction(2.0);
        assert_eq!(
            m.transform_vector3(Vec3::new(4.0, 4.0, 4.0)),
            Vec3::new(2.0, 4.0, 4.0)
        );
        assert_eq!(aspect_correction(0.0), Mat4::IDENTITY);
    }

    #[test]
    fn orthographic_matches_expected_entries() {
        let m = orthographic_z_up(2.0, 0.5, 5.5);
        assert!((m.row(0).x - 0.5).abs() < 1e-6);
        assert!((m.row(1).w - ((-2.0 * 0.5 / 5.0) - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn perspective_keeps_horizontal_axes_symmetric() {
        let m = perspective_z_up(60f32.to_radians(), 0.5, 5.0);
        assert_eq!(m.row(0).y, 0.0);
        assert_eq!(m.row(1).x, 0.0);
        assert!(m.row(0).x > 0.0 && m.row(2).z > 0.0);
        assert_eq!(m.row(0).x, m.row(2).z);
        assert_eq!(m.row(3), Vec4::new(0.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace(-1.0, 1.0, 3), vec![-1.0, 0.0, 1.0]);
        assert_eq!(linspace(0.0, 1.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
