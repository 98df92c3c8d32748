use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::contours::{Contour, Point};

/// Centre of mass and orientation of a tracked object.
///
/// `angle` is in radians, `-π/2 < angle <= π/2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

/// Spatial, central and normalized central moments up to second order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
    pub nu20: f64,
    pub nu11: f64,
    pub nu02: f64,
}

impl Moments {
    /// Moments of the region enclosed by a polygon (Green's theorem).
    ///
    /// A polygon without area yields all-zero spatial moments.
    pub fn of_polygon(points: &[Point]) -> Self {
        let Some(&last) = points.last() else {
            return Self::default();
        };

        let (mut a00, mut a10, mut a01, mut a20, mut a11, mut a02) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let (mut xi_1, mut yi_1) = (last.x as f64, last.y as f64);
        for p in points {
            let (xi, yi) = (p.x as f64, p.y as f64);
            let dxy = xi_1 * yi - xi * yi_1;
            let xii_1 = xi_1 + xi;
            let yii_1 = yi_1 + yi;

            a00 += dxy;
            a10 += dxy * xii_1;
            a01 += dxy * yii_1;
            a20 += dxy * (xi_1 * xii_1 + xi * xi);
            a11 += dxy * (xi_1 * (yii_1 + yi_1) + xi * (yii_1 + yi));
            a02 += dxy * (yi_1 * yii_1 + yi * yi);

            xi_1 = xi;
            yi_1 = yi;
        }

        let mut m = Self::default();
        if a00.abs() > f64::from(f32::EPSILON) {
            // orientation of the polygon must not flip the sign of the mass
            let sign = a00.signum();
            m.m00 = sign * a00 / 2.0;
            m.m10 = sign * a10 / 6.0;
            m.m01 = sign * a01 / 6.0;
            m.m20 = sign * a20 / 12.0;
            m.m11 = sign * a11 / 24.0;
            m.m02 = sign * a02 / 12.0;
        }
        m.complete()
    }

    fn complete(mut self) -> Self {
        let (cx, cy, inv_m00) = if self.m00.abs() > f64::EPSILON {
            (self.m10 / self.m00, self.m01 / self.m00, 1.0 / self.m00)
        } else {
            (0.0, 0.0, 0.0)
        };
        self.mu20 = self.m20 - self.m10 * cx;
        self.mu11 = self.m11 - self.m10 * cy;
        self.mu02 = self.m02 - self.m01 * cy;

        let s2 = inv_m00 * inv_m00;
        self.nu20 = self.mu20 * s2;
        self.nu11 = self.mu11 * s2;
        self.nu02 = self.mu02 * s2;
        self
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 == 0.0 {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Principal axis angle, folded into `(-π/2, π/2]`.
    pub fn orientation(&self) -> f64 {
        let theta = 0.5 * (2.0 * self.nu11).atan2(self.nu20 - self.nu02);
        if theta <= -FRAC_PI_2 {
            theta + std::f64::consts::PI
        } else {
            theta
        }
    }
}

/// Centre and orientation of a contour from its image moments. Contours that
/// enclose no area fall back to the mean of their points.
pub fn contour_info(contour: &Contour) -> FeatureVector {
    let moments = Moments::of_polygon(&contour.points);
    let (x, y) = moments
        .centroid()
        .unwrap_or_else(|| mean_point(contour));
    FeatureVector {
        x,
        y,
        angle: moments.orientation(),
    }
}

fn mean_point(contour: &Contour) -> (f64, f64) {
    if contour.is_empty() {
        return (0.0, 0.0);
    }
    let n = contour.len() as f64;
    let (sx, sy) = contour
        .points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    (sx / n, sy / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image_processing::contours::tests::canvas;
    use crate::core::image_processing::contours::find_contours;
    use std::f64::consts::FRAC_PI_4;

    fn contour(points: &[(i32, i32)]) -> Contour {
        Contour::new(points.iter().map(|&p| Point::from(p)).collect())
    }

    #[test]
    fn test_square_moments() {
        let m = Moments::of_polygon(&contour(&[(0, 0), (10, 0), (10, 10), (0, 10)]).points);
        assert!((m.m00 - 100.0).abs() < 1e-9);
        let (cx, cy) = m.centroid().unwrap();
        assert!((cx - 5.0).abs() < 1e-9);
        assert!((cy - 5.0).abs() < 1e-9);
        assert!(m.mu11.abs() < 1e-9);
        assert!((m.mu20 - m.mu02).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_independent_of_winding() {
        let cw = Moments::of_polygon(&contour(&[(0, 0), (0, 10), (10, 10), (10, 0)]).points);
        let ccw = Moments::of_polygon(&contour(&[(0, 0), (10, 0), (10, 10), (0, 10)]).points);
        assert!((cw.m00 - ccw.m00).abs() < 1e-9);
        assert!(cw.m00 > 0.0);
    }

    #[test]
    fn test_traced_rectangle_centroid() {
        let img = canvas(40, 40, &[(10, 20, 19, 29)]);
        let contours = find_contours(&img, 128, None, false);
        let info = contour_info(&contours[0]);
        assert!((info.x - 14.5).abs() < 1e-6);
        assert!((info.y - 24.5).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_of_triangle() {
        let info = contour_info(&contour(&[(0, 0), (9, 0), (0, 6)]));
        assert!((info.x - 3.0).abs() < 1e-6);
        assert!((info.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_of_elongated_shapes() {
        let wide = contour_info(&contour(&[(0, 0), (20, 0), (20, 4), (0, 4)]));
        assert!(wide.angle.abs() < 1e-9);

        let tall = contour_info(&contour(&[(0, 0), (4, 0), (4, 20), (0, 20)]));
        assert!((tall.angle - FRAC_PI_2).abs() < 1e-9);

        // long axis along y = x
        let diagonal = contour_info(&contour(&[(0, 1), (1, 0), (20, 19), (19, 20)]));
        assert!((diagonal.angle - FRAC_PI_4).abs() < 1e-6);

        let anti = contour_info(&contour(&[(0, 19), (1, 20), (20, 1), (19, 0)]));
        assert!((anti.angle + FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_two_point_contour() {
        let info = contour_info(&contour(&[(2, 3), (6, 8)]));
        assert_eq!(info.x, 4.0);
        assert_eq!(info.y, 5.5);
        assert_eq!(info.angle, 0.0);
    }

    #[test]
    fn test_collinear_and_empty_contours() {
        let info = contour_info(&contour(&[(0, 0), (2, 2), (4, 4)]));
        assert_eq!((info.x, info.y), (2.0, 2.0));
        assert!(info.angle.is_finite());

        let info = contour_info(&Contour::default());
        assert_eq!((info.x, info.y, info.angle), (0.0, 0.0, 0.0));
    }
}
