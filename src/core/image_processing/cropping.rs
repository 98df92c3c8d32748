use image::{imageops, GenericImageView, ImageBuffer, Pixel};
use serde::Deserialize;
use thiserror::Error;

use super::contours::{Contour, Point};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("crop box ({p1:?}, {p2:?}) exceeds {width}x{height} image")]
    OutOfBounds {
        p1: Point,
        p2: Point,
        width: u32,
        height: u32,
    },

    #[error("cannot crop to an empty contour")]
    EmptyContour,
}

/// Owned buffer produced by cropping an image of type `I`.
pub type Cropped<I> = ImageBuffer<
    <I as GenericImageView>::Pixel,
    Vec<<<I as GenericImageView>::Pixel as Pixel>::Subpixel>,
>;

/// Crops to the rectangle spanned by two opposite corners, both inclusive.
///
/// Corners may be given in any order. Bounds are never clamped: a corner
/// outside the image is an error.
pub fn crop<I>(image: &I, p1: Point, p2: Point) -> Result<Cropped<I>, CropError>
where
    I: GenericImageView + 'static,
{
    let (width, height) = image.dimensions();
    let (x_min, x_max) = (p1.x.min(p2.x), p1.x.max(p2.x));
    let (y_min, y_max) = (p1.y.min(p2.y), p1.y.max(p2.y));

    if x_min < 0 || y_min < 0 || x_max as i64 >= width as i64 || y_max as i64 >= height as i64 {
        return Err(CropError::OutOfBounds {
            p1,
            p2,
            width,
            height,
        });
    }

    let view = imageops::crop_imm(
        image,
        x_min as u32,
        y_min as u32,
        (x_max - x_min + 1) as u32,
        (y_max - y_min + 1) as u32,
    );
    Ok(view.to_image())
}

/// Crops to the bounding box of `contour` grown by `pad = (x_pad, y_pad)`,
/// clipped to the image. Returns the sub-image and the corners used.
pub fn crop_to_contour<I>(
    image: &I,
    contour: &Contour,
    pad: (i32, i32),
) -> Result<(Cropped<I>, Point, Point), CropError>
where
    I: GenericImageView + 'static,
{
    let (min, max) = contour.bounds().ok_or(CropError::EmptyContour)?;
    let (width, height) = image.dimensions();
    let x_limit = width as i64 - 1;
    let y_limit = height as i64 - 1;

    let clip = |v: i64, limit: i64| v.min(limit).max(0) as i32;
    let p1 = Point::new(
        clip(min.x as i64 - pad.0 as i64, x_limit),
        clip(min.y as i64 - pad.1 as i64, y_limit),
    );
    let p2 = Point::new(
        clip(max.x as i64 + pad.0 as i64, x_limit),
        clip(max.y as i64 + pad.1 as i64, y_limit),
    );

    let cropped = crop(image, p1, p2)?;
    Ok((cropped, p1, p2))
}

/// Cropping with a fixed padding around contours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Cropper {
    pub pad: (i32, i32),
}

impl Cropper {
    pub fn new(pad: (i32, i32)) -> Self {
        Self { pad }
    }

    pub fn crop<I>(&self, image: &I, p1: Point, p2: Point) -> Result<Cropped<I>, CropError>
    where
        I: GenericImageView + 'static,
    {
        crop(image, p1, p2)
    }

    pub fn crop_to_contour<I>(
        &self,
        image: &I,
        contour: &Contour,
    ) -> Result<(Cropped<I>, Point, Point), CropError>
    where
        I: GenericImageView + 'static,
    {
        crop_to_contour(image, contour, self.pad)
    }
}
