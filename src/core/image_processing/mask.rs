use image::{GrayImage, Luma};

use super::contours::{Contour, Point};

/// Boolean canvas with the shape of the masked image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data[self.offset(x, y)]
    }

    /// Number of pixels inside the mask.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&inside| inside).count()
    }

    /// 255 inside, 0 outside.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.contains(x, y) { 255 } else { 0 }])
        })
    }

    /// Fills the region enclosed by `contour`, boundary included.
    pub fn fill_contour(&mut self, contour: &Contour) {
        let points = &contour.points;
        if points.is_empty() {
            return;
        }
        self.fill_interior(points);
        for (i, &a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            self.draw_line(a, b);
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn set(&mut self, x: i64, y: i64) {
        if x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64 {
            let offset = self.offset(x as u32, y as u32);
            self.data[offset] = true;
        }
    }

    // even-odd scanline fill sampled at pixel centres, edges half-open in y
    fn fill_interior(&mut self, points: &[Point]) {
        let (min_y, max_y) = points
            .iter()
            .fold((i32::MAX, i32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        let mut crossings = Vec::new();
        for y in min_y..=max_y {
            crossings.clear();
            let yf = y as f64;
            for (i, a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                if a.y == b.y {
                    continue;
                }
                let (lo, hi) = if a.y < b.y { (a, &b) } else { (&b, a) };
                if yf < lo.y as f64 || yf >= hi.y as f64 {
                    continue;
                }
                let t = (yf - lo.y as f64) / (hi.y - lo.y) as f64;
                crossings.push(lo.x as f64 + t * (hi.x - lo.x) as f64);
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for pair in crossings.chunks_exact(2) {
                let start = pair[0].ceil() as i64;
                let end = pair[1].floor() as i64;
                for x in start..=end {
                    self.set(x, y as i64);
                }
            }
        }
    }

    fn draw_line(&mut self, a: Point, b: Point) {
        let (mut x, mut y) = (a.x as i64, a.y as i64);
        let (x1, y1) = (b.x as i64, b.y as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x, y);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Keeps the pixels of `image` that lie inside any of `contours` and zeroes
/// the rest. With `equalize`, the masked image is histogram-equalized last.
pub fn mask(image: &GrayImage, contours: &[Contour], equalize: bool) -> (Mask, GrayImage) {
    let (width, height) = image.dimensions();
    let mut canvas = Mask::new(width, height);
    for contour in contours {
        canvas.fill_contour(contour);
    }

    let mut masked = GrayImage::new(width, height);
    for (x, y, pixel) in masked.enumerate_pixels_mut() {
        if canvas.contains(x, y) {
            *pixel = *image.get_pixel(x, y);
        }
    }

    if equalize {
        masked = equalize_hist(&masked);
    }
    (canvas, masked)
}

/// 直方图均衡化
///
/// The lowest occupied level maps to 0 and the cumulative histogram above it
/// is stretched to 255. A single-valued image is returned unchanged.
pub fn equalize_hist(image: &GrayImage) -> GrayImage {
    let mut hist = [0u64; 256];
    for pixel in image.pixels() {
        hist[pixel[0] as usize] += 1;
    }
    let total: u64 = hist.iter().sum();

    let Some(lowest) = hist.iter().position(|&count| count > 0) else {
        return image.clone();
    };
    if hist[lowest] == total {
        return image.clone();
    }

    let scale = 255.0 / (total - hist[lowest]) as f64;
    let mut lut = [0u8; 256];
    let mut sum = 0u64;
    for level in lowest + 1..256 {
        sum += hist[level];
        lut[level] = (sum as f64 * scale).round().min(255.0) as u8;
    }

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = lut[pixel[0] as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image_processing::contours::find_contours;
    use crate::core::image_processing::contours::tests::canvas;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + y * width) % 251) as u8 + 1]))
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Contour {
        Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x0, y1),
            Point::new(x1, y1),
            Point::new(x1, y0),
        ])
    }

    #[test]
    fn test_mask_keeps_inside_and_zeroes_outside() {
        let image = gradient(30, 20);
        let contour = rect(5, 4, 14, 9);
        let (canvas, masked) = mask(&image, &[contour], false);

        assert_eq!(canvas.count(), 10 * 6);
        for (x, y, pixel) in masked.enumerate_pixels() {
            let inside = (5..=14).contains(&x) && (4..=9).contains(&y);
            assert_eq!(canvas.contains(x, y), inside, "({x}, {y})");
            if inside {
                assert_eq!(pixel, image.get_pixel(x, y));
            } else {
                assert_eq!(pixel[0], 0);
            }
        }
    }

    #[test]
    fn test_mask_of_traced_contour_covers_blob() {
        let image = canvas(40, 40, &[(3, 3, 12, 8), (20, 20, 29, 34)]);
        let contours = find_contours(&image, 128, None, false);
        let (canvas, masked) = mask(&image, &contours, false);

        assert_eq!(canvas.count(), 10 * 6 + 10 * 15);
        assert_eq!(masked, image);
    }

    #[test]
    fn test_mask_of_triangle_includes_boundary() {
        let image = gradient(20, 20);
        let contour = Contour::new(vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)]);
        let (canvas, _) = mask(&image, &[contour], false);

        assert!(canvas.contains(0, 0));
        assert!(canvas.contains(10, 0));
        assert!(canvas.contains(0, 10));
        assert!(canvas.contains(5, 5));
        assert!(canvas.contains(3, 3));
        assert!(!canvas.contains(6, 6));
        assert!(!canvas.contains(11, 0));
    }

    #[test]
    fn test_union_of_overlapping_contours() {
        let image = gradient(30, 30);
        let (canvas, _) = mask(&image, &[rect(0, 0, 9, 9), rect(5, 5, 14, 14)], false);
        assert_eq!(canvas.count(), 100 + 100 - 25);
    }

    #[test]
    fn test_contour_outside_image_is_clipped() {
        let image = gradient(10, 10);
        let (canvas, masked) = mask(&image, &[rect(-5, -5, 4, 4)], false);
        assert_eq!(canvas.count(), 25);
        assert_eq!(masked.get_pixel(4, 4), image.get_pixel(4, 4));
        assert_eq!(masked.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn test_no_contours_gives_blank_output() {
        let image = gradient(8, 8);
        let (canvas, masked) = mask(&image, &[], true);
        assert_eq!(canvas.count(), 0);
        assert!(masked.pixels().all(|p| p[0] == 0));
        assert!(canvas.to_image().pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_equalize_hist_stretches_levels() {
        let image = GrayImage::from_raw(4, 1, vec![10, 20, 20, 30]).unwrap();
        let out = equalize_hist(&image);
        // lowest level -> 0, cumulative counts above it over 3 pixels
        assert_eq!(out.into_raw(), vec![0, 170, 170, 255]);
    }

    #[test]
    fn test_equalize_single_value_is_identity() {
        let image = GrayImage::from_pixel(5, 5, Luma([77]));
        assert_eq!(equalize_hist(&image), image);
    }

    #[test]
    fn test_mask_with_equalize() {
        let image = GrayImage::from_fn(10, 10, |x, _| Luma([x as u8 * 10 + 50]));
        let (_, masked) = mask(&image, &[rect(0, 0, 4, 9)], true);
        // 50 zeroed pixels hold the lowest level, ten per kept column above it
        assert_eq!(masked.get_pixel(9, 0)[0], 0);
        assert_eq!(masked.get_pixel(0, 0)[0], 51);
        assert_eq!(masked.get_pixel(4, 0)[0], 255);
    }
}
