pub use glam::{Mat4, Vec2, vec2};

/// Orthographic projection mapping `(x, y)..(x + width, y + height)` onto the viewport,
/// y pointing up & `z = 0` landing inside the clip volume
pub fn ortho_2d(x: f32, y: f32, width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(x, x + width, y, y + height, 0.0, 1.0)
}

/// Region of a texture in pixels, y pointing down from the top-left corner of the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SourceRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the top-left corner (min coords)
    pub fn min(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Returns the bottom-right corner (max coords)
    pub fn max(&self) -> (i32, i32) {
        (self.x + self.width, self.y + self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec4;

    #[test]
    fn ortho_maps_viewport_corners_to_ndc() {
        let proj = ortho_2d(0.0, 0.0, 800.0, 600.0);

        let bottom_left = proj * vec4(0.0, 0.0, 0.0, 1.0);
        let top_right = proj * vec4(800.0, 600.0, 0.0, 1.0);

        assert!((bottom_left.x + 1.0).abs() < 1e-5 && (bottom_left.y + 1.0).abs() < 1e-5);
        assert!((top_right.x - 1.0).abs() < 1e-5 && (top_right.y - 1.0).abs() < 1e-5);
        assert!((0.0..=1.0).contains(&bottom_left.z));
    }

    #[test]
    fn source_rect_extents() {
        let rect = SourceRect::new(4, 8, 16, 32);
        assert_eq!(rect.min(), (4, 8));
        assert_eq!(rect.max(), (20, 40));
    }
}
