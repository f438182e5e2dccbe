pub mod image_helper {
    use image::imageops::{self, FilterType};
    use image::{GrayImage, ImageEncoder, RgbImage};
    use std::path::Path;

    /// Debug masks are shown at 1/4 of the frame size.
    pub const DEBUG_MASK_SCALE: u32 = 4;

    /// Downscales a mask for display with linear interpolation. Never smaller
    /// than 1x1.
    pub fn render_debug_mask(mask: &GrayImage) -> GrayImage {
        let width = (mask.width() / DEBUG_MASK_SCALE).max(1);
        let height = (mask.height() / DEBUG_MASK_SCALE).max(1);
        imageops::resize(mask, width, height, FilterType::Triangle)
    }

    pub fn save_mask<P: AsRef<Path>>(path: P, mask: &GrayImage) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(mask.as_raw(), mask.width(), mask.height(), image::ExtendedColorType::L8)?;

        Ok(())
    }

    pub fn save_rgb<P: AsRef<Path>>(path: P, rgb: &RgbImage) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn debug_mask_is_quarter_size() {
        let mask = GrayImage::from_pixel(640, 480, Luma([255]));
        let small = render_debug_mask(&mask);
        assert_eq!(small.dimensions(), (160, 120));
        assert!(small.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn tiny_mask_renders_at_least_one_pixel() {
        let mask = GrayImage::new(3, 2);
        assert_eq!(render_debug_mask(&mask).dimensions(), (1, 1));
    }

    #[test]
    fn save_mask_file() {
        let mut mask = GrayImage::new(40, 30);
        mask.put_pixel(5, 5, Luma([255]));
        let path = std::env::temp_dir().join("inrange_vision_mask_test.png");

        save_mask(&path, &mask).expect("Error Saving File.");
        let loaded = image::open(&path).expect("Error Loading File.").to_luma8();
        assert_eq!(loaded, mask);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn save_gradient_file() {
        let rgb = RgbImage::from_fn(64, 16, |x, _| Rgb([(x * 4) as u8, 0, 255 - (x * 4) as u8]));
        let path = std::env::temp_dir().join("inrange_vision_gradient_test.png");

        save_rgb(&path, &rgb).expect("Error Saving File.");
        let loaded = image::open(&path).expect("Error Loading File.").to_rgb8();
        assert_eq!(loaded, rgb);
        let _ = std::fs::remove_file(path);
    }
}
