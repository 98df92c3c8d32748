use std::cmp::Ordering;

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use super::mask::{mask, Mask};
use super::moments::{contour_info, FeatureVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Closed boundary of one foreground region, as an ordered vertex list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed polygon area (shoelace).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice as f64 / 2.0).abs()
    }

    /// Coordinate-wise (min, max) corners, `None` for an empty contour.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

/// Binary threshold: samples above `threshold` become 255 (or 0 when inverted).
pub fn threshold(image: &GrayImage, threshold: u8, invert: bool) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        let fg = (src.0[0] > threshold) != invert;
        *dst = Luma([if fg { 255 } else { 0 }]);
    }
    out
}

/// Outer contours of the thresholded image, largest area first, at most `n`
/// of them when `n` is given.
pub fn find_contours(image: &GrayImage, thresh: u8, n: Option<usize>, invert: bool) -> Vec<Contour> {
    let binary = threshold(image, thresh, invert);
    let mut ranked: Vec<(f64, Contour)> = external_contours(&binary)
        .into_iter()
        .map(|c| (c.area(), c))
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    if let Some(n) = n {
        ranked.truncate(n);
    }
    ranked.into_iter().map(|(_, c)| c).collect()
}

/// Offsets for 8-directional sweeping (x, y), counter-clockwise from east.
const NEIGHBORHOOD: [[i32; 2]; 8] = [
    [1, 0],
    [1, -1],
    [0, -1],
    [-1, -1],
    [-1, 0],
    [-1, 1],
    [0, 1],
    [1, 1],
];

fn neighborhood_deltas(width: isize) -> [isize; 16] {
    let mut deltas = [0isize; 16];
    for i in 0..8 {
        let delta = NEIGHBORHOOD[i][0] as isize + NEIGHBORHOOD[i][1] as isize * width;
        deltas[i] = delta;
        deltas[i + 8] = delta;
    }
    deltas
}

#[inline]
fn step(pos: usize, delta: isize) -> usize {
    (pos as isize + delta) as usize
}

#[derive(Clone, Copy)]
struct Border {
    hole: bool,
    parent: usize,
}

/// Suzuki-Abe border following over a zero-padded copy of the binary image.
/// Hole borders are traced to keep the labels consistent, but only outer
/// borders whose parent is the image frame are returned.
fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    let width = binary.width() as usize;
    let height = binary.height() as usize;
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let stride = width + 2;
    let mut grid = vec![0i32; stride * (height + 2)];
    for (x, y, px) in binary.enumerate_pixels() {
        if px.0[0] != 0 {
            grid[(y as usize + 1) * stride + x as usize + 1] = 1;
        }
    }
    let deltas = neighborhood_deltas(stride as isize);

    // index 1 is the frame, which behaves like a hole border
    let mut borders = vec![
        Border { hole: true, parent: 0 },
        Border { hole: true, parent: 0 },
    ];
    let mut contours = Vec::new();
    let mut nbd: i32 = 1;

    for i in 0..height {
        let mut lnbd: i32 = 1;
        for j in 0..width {
            let pos = (i + 1) * stride + j + 1;
            let pix = grid[pos];
            if pix == 0 {
                continue;
            }

            let hole = if pix == 1 && grid[pos - 1] == 0 {
                Some(false)
            } else if pix >= 1 && grid[pos + 1] == 0 {
                if pix > 1 {
                    lnbd = pix;
                }
                Some(true)
            } else {
                None
            };

            if let Some(hole) = hole {
                nbd += 1;
                let last = borders[lnbd as usize];
                let parent = if hole == last.hole { last.parent } else { lnbd as usize };
                borders.push(Border { hole, parent });

                let start = Point::new(j as i32, i as i32);
                let points = follow_border(&mut grid, pos, nbd, start, hole, &deltas);
                if !hole && parent == 1 {
                    contours.push(Contour::new(points));
                }
            }

            let marked = grid[pos];
            if marked != 1 {
                lnbd = marked.abs();
            }
        }
    }

    contours
}

/// Traces one border starting at `start`, marking visited pixels with
/// `nbd` (or `-nbd` where the east neighbour is background). Straight runs
/// are compressed to their end points.
fn follow_border(
    grid: &mut [i32],
    start: usize,
    nbd: i32,
    mut point: Point,
    hole: bool,
    deltas: &[isize; 16],
) -> Vec<Point> {
    let mut points = Vec::new();
    let s_begin: usize = if hole { 0 } else { 4 };
    let mut s = s_begin;
    let mut pos1;

    loop {
        s = s.wrapping_sub(1) & 7;
        pos1 = step(start, deltas[s]);
        if grid[pos1] != 0 || s == s_begin {
            break;
        }
    }

    if grid[pos1] == 0 {
        // isolated pixel
        grid[start] = -nbd;
        points.push(point);
        return points;
    }

    let mut pos3 = start;
    let mut prev_s = s ^ 4;
    loop {
        let s_end = s;
        let mut pos4;
        loop {
            s += 1;
            pos4 = step(pos3, deltas[s]);
            if grid[pos4] != 0 {
                break;
            }
        }
        s &= 7;

        if s.wrapping_sub(1) < s_end {
            grid[pos3] = -nbd;
        } else if grid[pos3] == 1 {
            grid[pos3] = nbd;
        }

        if s != prev_s {
            points.push(point);
            prev_s = s;
        }
        point.x += NEIGHBORHOOD[s][0];
        point.y += NEIGHBORHOOD[s][1];

        if pos4 == start && pos3 == pos1 {
            break;
        }
        pos3 = pos4;
        s = (s + 4) & 7;
    }

    points
}

/// Contour extraction with fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContourDetector {
    pub threshold: u8,
    /// Keep only the `n` largest contours.
    #[serde(default)]
    pub n: Option<usize>,
    #[serde(default)]
    pub invert: bool,
}

impl ContourDetector {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            n: None,
            invert: false,
        }
    }

    pub fn with_limit(mut self, n: usize) -> Self {
        self.n = Some(n);
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn find_contours(&self, image: &GrayImage) -> Vec<Contour> {
        find_contours(image, self.threshold, self.n, self.invert)
    }

    pub fn contour_info(contour: &Contour) -> FeatureVector {
        contour_info(contour)
    }

    pub fn mask(image: &GrayImage, contours: &[Contour], equalize: bool) -> (Mask, GrayImage) {
        mask(image, contours, equalize)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Paints inclusive rectangles of value 200 on a black canvas.
    pub(crate) fn canvas(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for &(x0, y0, x1, y1) in rects {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    img.put_pixel(x, y, Luma([200]));
                }
            }
        }
        img
    }

    #[test]
    fn test_threshold_senses() {
        let img = GrayImage::from_raw(3, 1, vec![10, 128, 200]).unwrap();
        assert_eq!(threshold(&img, 128, false).into_raw(), vec![0, 0, 255]);
        assert_eq!(threshold(&img, 128, true).into_raw(), vec![255, 255, 0]);
    }

    #[test]
    fn test_rectangle_contour_is_compressed_to_corners() {
        let img = canvas(20, 20, &[(2, 3, 11, 8)]);
        let contours = find_contours(&img, 128, None, false);
        assert_eq!(contours.len(), 1);

        let c = &contours[0];
        assert_eq!(c.len(), 4);
        assert!(c.points.contains(&Point::new(2, 3)));
        assert!(c.points.contains(&Point::new(11, 3)));
        assert!(c.points.contains(&Point::new(11, 8)));
        assert!(c.points.contains(&Point::new(2, 8)));
        assert_eq!(c.area(), 45.0);
        assert_eq!(c.bounds(), Some((Point::new(2, 3), Point::new(11, 8))));
    }

    #[test]
    fn test_blobs_ranked_by_area() {
        // polygon areas 500, 300 and 100
        let img = canvas(
            100,
            100,
            &[(60, 60, 70, 70), (5, 5, 30, 25), (5, 40, 20, 60)],
        );
        let all = find_contours(&img, 128, None, false);
        let areas: Vec<f64> = all.iter().map(Contour::area).collect();
        assert_eq!(areas, vec![500.0, 300.0, 100.0]);

        let top = find_contours(&img, 128, Some(2), false);
        assert_eq!(top.len(), 2);
        assert_eq!(top[..], all[..2]);
        assert_eq!(top[0].area(), 500.0);
        assert_eq!(top[1].area(), 300.0);
    }

    #[test]
    fn test_holes_and_nested_regions_are_skipped() {
        let mut img = canvas(40, 40, &[(2, 2, 30, 30)]);
        for y in 8..=24 {
            for x in 8..=24 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        // island inside the hole
        for y in 14..=18 {
            for x in 14..=18 {
                img.put_pixel(x, y, Luma([200]));
            }
        }
        let contours = find_contours(&img, 128, None, false);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounds(), Some((Point::new(2, 2), Point::new(30, 30))));
    }

    #[test]
    fn test_island_inside_thin_ring_is_skipped() {
        let mut img = canvas(20, 20, &[(2, 2, 16, 16)]);
        for y in 3..=15 {
            for x in 3..=15 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img.put_pixel(9, 9, Luma([200]));
        let contours = find_contours(&img, 128, None, false);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 196.0);
    }

    #[test]
    fn test_single_pixel_and_degenerate_inputs() {
        let img = canvas(5, 5, &[(2, 2, 2, 2)]);
        let contours = find_contours(&img, 128, None, false);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![Point::new(2, 2)]);
        assert_eq!(contours[0].area(), 0.0);

        assert!(find_contours(&GrayImage::new(0, 0), 128, None, false).is_empty());
        assert!(find_contours(&img, 250, None, false).is_empty());
    }

    #[test]
    fn test_inverted_threshold_finds_dark_object() {
        let mut img = GrayImage::from_pixel(30, 30, Luma([220]));
        for y in 10..=19 {
            for x in 5..=24 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        let contours = find_contours(&img, 100, None, true);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounds(), Some((Point::new(5, 10), Point::new(24, 19))));
    }

    #[test]
    fn test_border_touching_region() {
        let img = canvas(10, 10, &[(0, 0, 9, 4)]);
        let contours = find_contours(&img, 128, None, false);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 36.0);
    }

    #[test]
    fn test_detector_applies_parameters() {
        let img = canvas(50, 50, &[(1, 1, 10, 10), (20, 20, 40, 40)]);
        let detector = ContourDetector::new(128).with_limit(1);
        let contours = detector.find_contours(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 400.0);

        let json = r#"{ "threshold": 40, "invert": true }"#;
        let parsed: ContourDetector = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, ContourDetector::new(40).inverted());
    }
}
