//! Image decoding and tensor preprocessing

use crate::error::VisionError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use ndarray::Array4;
use std::path::Path;
use tracing::debug;

/// Decode an image file, sniffing the format from its content.
pub fn load_image(path: &Path) -> Result<DynamicImage, VisionError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!(
        "Decoded image {}x{} from {:?}",
        image.width(),
        image.height(),
        path
    );
    Ok(image)
}

/// Convert an image into a `[1, 3, height, width]` tensor of raw 0-255 RGB
/// values. Images of another size are resized only when `resize` is set.
pub fn image_to_tensor(
    image: &DynamicImage,
    frame: (usize, usize),
    resize: bool,
) -> Result<Array4<f32>, VisionError> {
    let (height, width) = frame;
    let target_w = u32::try_from(width)
        .map_err(|_| VisionError::Processing("Frame width too large".to_string()))?;
    let target_h = u32::try_from(height)
        .map_err(|_| VisionError::Processing("Frame height too large".to_string()))?;

    let rgb = image.to_rgb8();
    let rgb: RgbImage = if rgb.dimensions() == (target_w, target_h) {
        rgb
    } else if resize {
        debug!(
            "Resizing {}x{} image to {}x{}",
            rgb.width(),
            rgb.height(),
            target_w,
            target_h
        );
        image::imageops::resize(&rgb, target_w, target_h, FilterType::Triangle)
    } else {
        return Err(VisionError::Processing(format!(
            "Invalid input shape: (1, 3, {}, {}). Expected shape: (-1, 3, {}, {})",
            rgb.height(),
            rgb.width(),
            height,
            width
        )));
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height, width));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for channel in 0..3 {
            tensor[[0, channel, y, x]] = f32::from(pixel[channel]);
        }
    }

    validate_input_shape(&tensor, frame)?;
    Ok(tensor)
}

/// Check a `(batch, 3, height, width)` tensor; any batch size is accepted.
pub fn validate_input_shape(
    tensor: &Array4<f32>,
    frame: (usize, usize),
) -> Result<(), VisionError> {
    let (_, channels, height, width) = tensor.dim();
    if channels != 3 || (height, width) != frame {
        return Err(VisionError::Processing(format!(
            "Invalid input shape: {:?}. Expected shape: (-1, 3, {}, {})",
            tensor.shape(),
            frame.0,
            frame.1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_tensor_layout_is_chw_raw_values() {
        let mut image = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        image.put_pixel(5, 2, Rgb([255, 0, 7]));
        let tensor = image_to_tensor(&DynamicImage::ImageRgb8(image), (4, 8), false).unwrap();
        assert_eq!(tensor.dim(), (1, 3, 4, 8));
        assert_eq!(tensor[[0, 0, 0, 0]], 10.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 30.0);
        assert_eq!(tensor[[0, 0, 2, 5]], 255.0);
        assert_eq!(tensor[[0, 2, 2, 5]], 7.0);
    }

    #[test]
    fn test_wrong_size_is_rejected_without_resize() {
        let result = image_to_tensor(&solid(10, 10, [0, 0, 0]), (512, 512), false);
        assert!(matches!(result, Err(VisionError::Processing(_))));
    }

    #[test]
    fn test_wrong_size_is_resized_when_enabled() {
        let tensor = image_to_tensor(&solid(10, 20, [50, 60, 70]), (16, 16), true).unwrap();
        assert_eq!(tensor.dim(), (1, 3, 16, 16));
        assert_eq!(tensor[[0, 1, 8, 8]], 60.0);
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([9])));
        let tensor = image_to_tensor(&gray, (4, 4), false).unwrap();
        assert_eq!(tensor[[0, 0, 1, 1]], 9.0);
        assert_eq!(tensor[[0, 2, 1, 1]], 9.0);
    }

    #[test]
    fn test_load_image_sniffs_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        solid(3, 2, [1, 2, 3]).save_with_format(&path, image::ImageFormat::Png).unwrap();
        let image = load_image(&path).unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[test]
    fn test_load_image_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(load_image(&path).is_err());
    }
}
