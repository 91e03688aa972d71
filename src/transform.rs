//! Quadrilateral-to-rectangle resampling for texture extraction
//!
//! Every destination pixel maps to a source position by bilinearly blending
//! the four corner positions with the pixel's normalized (u, v). The colour is
//! taken from the nearest source pixel. This is not a homography: it is exact
//! for parallelograms and bends straight lines slightly on strongly skewed
//! quadrilaterals.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::faces::Corners;

/// Source-space corner positions, ready for per-pixel sampling
#[derive(Debug, Clone, Copy)]
pub struct QuadSampler {
    /// top-left, top-right, bottom-right, bottom-left in pixels
    corners: [(f64, f64); 4],
    dst_width: u32,
    dst_height: u32,
}

impl QuadSampler {
    pub fn new(
        corners: &Corners,
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
    ) -> Self {
        Self {
            corners: corners.to_pixels(src_width, src_height),
            dst_width,
            dst_height,
        }
    }

    /// Map a destination pixel to its (unrounded) source position
    #[inline]
    pub fn source_point(&self, dx: u32, dy: u32) -> (f64, f64) {
        let u = normalized(dx, self.dst_width);
        let v = normalized(dy, self.dst_height);

        let weights = [
            (1.0 - u) * (1.0 - v),
            u * (1.0 - v),
            u * v,
            (1.0 - u) * v,
        ];

        let mut x = 0.0;
        let mut y = 0.0;
        for (w, (cx, cy)) in weights.iter().zip(self.corners.iter()) {
            x += w * cx;
            y += w * cy;
        }
        (x, y)
    }
}

#[inline]
fn normalized(d: u32, size: u32) -> f64 {
    if size > 1 {
        d as f64 / (size - 1) as f64
    } else {
        0.0
    }
}

/// Resample the quadrilateral `corners` of `source` into a new
/// `output_width` x `output_height` image.
///
/// Destination pixels whose source position falls outside the source bounds
/// are fully transparent.
pub fn resample(
    source: &RgbaImage,
    corners: &Corners,
    source_width: u32,
    source_height: u32,
    output_width: u32,
    output_height: u32,
) -> Result<RgbaImage> {
    if source_width == 0 || source_height == 0 {
        return Err(Error::invalid_image(format!(
            "source dimensions must be positive, got {}x{}",
            source_width, source_height
        )));
    }
    if source.width() == 0 || source.height() == 0 {
        return Err(Error::invalid_image("source image has no pixels"));
    }
    if output_width == 0 || output_height == 0 {
        return Err(Error::invalid_image(format!(
            "output dimensions must be positive, got {}x{}",
            output_width, output_height
        )));
    }

    let sampler = QuadSampler::new(
        corners,
        source_width,
        source_height,
        output_width,
        output_height,
    );
    let bound_w = source_width.min(source.width()) as f64;
    let bound_h = source_height.min(source.height()) as f64;

    let row_len = output_width as usize * 4;
    let mut buffer = vec![0u8; row_len * output_height as usize];

    buffer
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(dy, row)| {
            for (dx, pixel) in row.chunks_exact_mut(4).enumerate() {
                let (sx, sy) = sampler.source_point(dx as u32, dy as u32);
                let (sx, sy) = (sx.round(), sy.round());

                // left as transparent zeros when outside the source
                if sx >= 0.0 && sy >= 0.0 && sx < bound_w && sy < bound_h {
                    let Rgba(rgba) = *source.get_pixel(sx as u32, sy as u32);
                    pixel.copy_from_slice(&rgba);
                }
            }
        });

    RgbaImage::from_raw(output_width, output_height, buffer)
        .ok_or_else(|| Error::invalid_image("failed to assemble output image"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::Point;

    /// Every pixel gets a distinct colour derived from its position
    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn test_full_bounds_is_identity() {
        let src = gradient(40, 30);
        let out = resample(&src, &Corners::full(), 40, 30, 40, 30).unwrap();

        assert_eq!(out.dimensions(), (40, 30));
        for (x, y, p) in out.enumerate_pixels() {
            assert_eq!(p, src.get_pixel(x, y), "pixel {},{}", x, y);
        }
    }

    #[test]
    fn test_collapsed_corners_fill_uniformly() {
        let src = gradient(101, 101);
        let p = Point::new(10.0, 10.0);
        let corners = Corners {
            top_left: p,
            top_right: p,
            bottom_right: p,
            bottom_left: p,
        };
        let out = resample(&src, &corners, 101, 101, 16, 8).unwrap();

        let expected = *src.get_pixel(10, 10);
        assert!(out.pixels().all(|p| *p == expected));
    }

    #[test]
    fn test_output_size_is_independent_of_source() {
        let src = gradient(64, 48);
        let out = resample(&src, &Corners::default(), 64, 48, 7, 300).unwrap();
        assert_eq!(out.dimensions(), (7, 300));
    }

    #[test]
    fn test_outside_source_is_transparent() {
        let src = gradient(20, 20);
        // Right half of the quad lies beyond the image
        let corners = Corners {
            top_left: Point::new(50.0, 0.0),
            top_right: Point::new(150.0, 0.0),
            bottom_right: Point::new(150.0, 100.0),
            bottom_left: Point::new(50.0, 100.0),
        };
        let out = resample(&src, &corners, 20, 20, 21, 5).unwrap();

        assert_eq!(out.get_pixel(0, 0)[3], 255);
        assert_eq!(*out.get_pixel(20, 4), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_single_pixel_output_uses_top_left() {
        let src = gradient(50, 50);
        let out = resample(&src, &Corners::default(), 50, 50, 1, 1).unwrap();
        // 10% of 49 = 4.9 -> 5
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(5, 5));
    }

    #[test]
    fn test_invalid_dimensions() {
        let src = gradient(10, 10);
        let err = resample(&src, &Corners::full(), 0, 10, 5, 5).unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));

        let empty = RgbaImage::new(0, 0);
        assert!(resample(&empty, &Corners::full(), 10, 10, 5, 5).is_err());
        assert!(resample(&src, &Corners::full(), 10, 10, 0, 5).is_err());
    }

    #[test]
    fn test_source_point_blends_corners() {
        let corners = Corners {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(100.0, 0.0),
            bottom_right: Point::new(100.0, 100.0),
            bottom_left: Point::new(0.0, 50.0),
        };
        let sampler = QuadSampler::new(&corners, 101, 101, 11, 11);
        assert_eq!(sampler.source_point(0, 0), (0.0, 0.0));
        assert_eq!(sampler.source_point(10, 10), (100.0, 100.0));
        let (_, y) = sampler.source_point(0, 10);
        assert_eq!(y, 50.0);
    }
}
