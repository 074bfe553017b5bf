// Fit-to-bounds module
// Uniform, aspect-preserving downscale of a decoded image to the preview bounds

use image::imageops::FilterType;
use image::DynamicImage;
use std::borrow::Cow;

/// Maximum preview size for the whole session.
///
/// A zero on either axis means no bounds are known and images are always
/// shown at native resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl DisplayBounds {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_width == 0 || self.max_height == 0
    }
}

/// Compute the displayed dimensions of a `width` x `height` image.
///
/// Images that already fit are returned unchanged. Otherwise a single scale
/// factor `min(W / w, H / h)` is applied to both axes and the result rounded
/// to whole pixels, so the aspect ratio only drifts by rounding.
pub fn fit_dimensions(width: u32, height: u32, bounds: DisplayBounds) -> (u32, u32) {
    if bounds.is_disabled() || width == 0 || height == 0 {
        return (width, height);
    }
    if width <= bounds.max_width && height <= bounds.max_height {
        return (width, height);
    }

    let scale_x = bounds.max_width as f64 / width as f64;
    let scale_y = bounds.max_height as f64 / height as f64;
    let scale = scale_x.min(scale_y);

    let new_width = ((width as f64 * scale).round() as u32).clamp(1, bounds.max_width);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, bounds.max_height);

    (new_width, new_height)
}

/// Resample `image` so it fits within `bounds`, or borrow it untouched
pub fn fit_image(image: &DynamicImage, bounds: DisplayBounds) -> Cow<'_, DynamicImage> {
    let (width, height) = (image.width(), image.height());
    let (new_width, new_height) = fit_dimensions(width, height, bounds);

    if (new_width, new_height) == (width, height) {
        return Cow::Borrowed(image);
    }

    // Dimensions already carry the shared factor, so resize exactly to them
    Cow::Owned(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn small_image_is_untouched() {
        let bounds = DisplayBounds::new(800, 600);
        assert_eq!(fit_dimensions(640, 480, bounds), (640, 480));
        assert_eq!(fit_dimensions(800, 600, bounds), (800, 600));
    }

    #[test]
    fn fitting_image_is_returned_as_is() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, image::Rgb([1, 2, 3])));
        let out = fit_image(&img, DisplayBounds::new(100, 100));
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(*out, img);
    }

    #[test]
    fn wide_image_is_limited_by_width() {
        let (w, h) = fit_dimensions(4000, 1000, DisplayBounds::new(1000, 1000));
        assert_eq!((w, h), (1000, 250));
    }

    #[test]
    fn tall_image_is_limited_by_height() {
        let (w, h) = fit_dimensions(1000, 3000, DisplayBounds::new(1920, 1080));
        assert_eq!((w, h), (360, 1080));
    }

    #[test]
    fn aspect_ratio_is_preserved() {
        let bounds = DisplayBounds::new(1366, 768);
        for &(w, h) in &[(5000u32, 3333u32), (1367, 2), (3, 4000), (2592, 1944), (7777, 7777)] {
            let (nw, nh) = fit_dimensions(w, h, bounds);
            assert!(nw <= bounds.max_width && nh <= bounds.max_height);

            // One pixel of rounding on either axis bounds the ratio error
            let scale = (bounds.max_width as f64 / w as f64).min(bounds.max_height as f64 / h as f64);
            assert!((nw as f64 - w as f64 * scale).abs() <= 0.5 + 1e-9);
            assert!((nh as f64 - h as f64 * scale).abs() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn zero_bounds_disable_resizing() {
        assert_eq!(fit_dimensions(9000, 9000, DisplayBounds::default()), (9000, 9000));
        assert_eq!(fit_dimensions(9000, 10, DisplayBounds::new(100, 0)), (9000, 10));
        assert_eq!(fit_dimensions(10, 9000, DisplayBounds::new(0, 100)), (10, 9000));
    }

    #[test]
    fn resampled_image_has_fitted_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        let out = fit_image(&img, DisplayBounds::new(50, 50));
        assert_eq!((out.width(), out.height()), (50, 25));
    }

    #[test]
    fn extreme_ratio_keeps_at_least_one_pixel() {
        assert_eq!(fit_dimensions(10_000, 1, DisplayBounds::new(100, 100)), (100, 1));
    }
}
