// Mask overlay rendering from decoded RLE masks

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use lossteach_core::codec::{decode, paste};
use lossteach_core::{BinaryMask, Fragment};

const PALETTE: [[u8; 3]; 8] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
];

pub fn fragment_color(id: usize) -> Rgb<u8> {
    Rgb(PALETTE[id % PALETTE.len()])
}

/// Rebuild a fragment's full-frame mask from its cropped RLE.
/// `None` when the response carried no mask.
pub fn full_frame_mask(fragment: &Fragment, frame: (usize, usize)) -> Option<BinaryMask> {
    let mask_data = fragment.mask_data.as_ref()?;
    let cropped = decode(&mask_data.rle, (mask_data.shape[0], mask_data.shape[1]));
    let mut full = BinaryMask::zeros(frame);
    paste(&mut full, cropped.view(), &mask_data.bbox);
    Some(full)
}

/// Tint every fragment's mask at 50% and outline its box.
pub fn render_overlay(base: &RgbImage, fragments: &[Fragment]) -> RgbImage {
    let mut canvas = base.clone();
    let frame = (canvas.height() as usize, canvas.width() as usize);

    for fragment in fragments {
        let color = fragment_color(fragment.id);
        if let Some(mask) = full_frame_mask(fragment, frame) {
            for ((row, col), &value) in mask.indexed_iter() {
                if value == 0 {
                    continue;
                }
                let pixel = canvas.get_pixel_mut(col as u32, row as u32);
                for channel in 0..3 {
                    pixel.0[channel] =
                        ((u16::from(pixel.0[channel]) + u16::from(color.0[channel])) / 2) as u8;
                }
            }
        }

        let bbox = fragment.bbox;
        let width = bbox.width().max(1) as u32;
        let height = bbox.height().max(1) as u32;
        draw_hollow_rect_mut(&mut canvas, Rect::at(bbox.x1, bbox.y1).of_size(width, height), color);
    }
    canvas
}
