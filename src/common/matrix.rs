use super::geometry::{RectI, Vector2f};

/// A 2D affine transform stored row-major as `[a, b, tx, c, d, ty]`.
///
/// Maps `(x, y)` to `(a*x + b*y + tx, c*x + d*y + ty)`. Composes
/// parent→child during the prepare pass and is handed to the drawing backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
    pub data: [f32; 6],
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    };

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            data: [1.0, 0.0, x, 0.0, 1.0, y],
        }
    }

    /// Rotation around the origin, in degrees.
    pub fn rotate_degrees(angle_degrees: f32) -> Self {
        let (sin, cos) = angle_degrees.to_radians().sin_cos();
        Self {
            data: [cos, -sin, 0.0, sin, cos, 0.0],
        }
    }

    pub fn scale_xy(sx: f32, sy: f32) -> Self {
        Self {
            data: [sx, 0.0, 0.0, 0.0, sy, 0.0],
        }
    }

    /// Node-local transform: scale and rotation around `pivot` (absolute,
    /// in node coordinates), then translation by `offset`.
    pub fn node_local(offset: Vector2f, pivot: Vector2f, rotation: f32, scale: Vector2f) -> Self {
        let mut local = Self::translate(offset.x, offset.y);
        if rotation != 0.0 || scale != Vector2f::ONE {
            local = local
                .then(&Self::translate(pivot.x, pivot.y))
                .then(&Self::rotate_degrees(rotation))
                .then(&Self::scale_xy(scale.x, scale.y))
                .then(&Self::translate(-pivot.x, -pivot.y));
        }
        local
    }

    /// `self * other`: applies `other` first, then `self`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        let [a0, b0, tx0, c0, d0, ty0] = self.data;
        let [a1, b1, tx1, c1, d1, ty1] = other.data;
        Matrix {
            data: [
                a0 * a1 + b0 * c1,
                a0 * b1 + b0 * d1,
                a0 * tx1 + b0 * ty1 + tx0,
                c0 * a1 + d0 * c1,
                c0 * b1 + d0 * d1,
                c0 * tx1 + d0 * ty1 + ty0,
            ],
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, tx, c, d, ty] = self.data;
        (a * x + b * y + tx, c * x + d * y + ty)
    }

    /// Integer bounding box of the `width` x `height` rectangle at the local
    /// origin once transformed.
    pub fn map_rect(&self, width: f32, height: f32) -> RectI {
        let corners = [
            self.transform_point(0.0, 0.0),
            self.transform_point(width, 0.0),
            self.transform_point(0.0, height),
            self.transform_point(width, height),
        ];
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let left = min_x.floor() as i32;
        let top = min_y.floor() as i32;
        RectI::new(
            left,
            top,
            (max_x.ceil() as i32 - left).max(0),
            (max_y.ceil() as i32 - top).max(0),
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
