//! Square crops around detected screens.

use crtscan_models::BoundingBox;
use image::{imageops, RgbImage};
use std::sync::Arc;

use crate::source::FrameImage;

/// Side of the square crop relative to the larger box dimension.
pub const CROP_SCALE: f64 = 1.2;

/// Pixel rectangle of a crop, already clamped to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Square of side `CROP_SCALE * max(w, h)` centred on the box, clamped to a
/// `frame_width` x `frame_height` frame. `None` if nothing remains.
pub fn square_region(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> Option<CropRegion> {
    let side = CROP_SCALE * bbox.width().max(bbox.height());
    if side <= 0.0 {
        return None;
    }

    let (cx, cy) = bbox.center();
    let left = (cx - side / 2.0).round() as i64;
    let top = (cy - side / 2.0).round() as i64;
    let side = side.round() as i64;

    let x0 = left.clamp(0, frame_width as i64);
    let y0 = top.clamp(0, frame_height as i64);
    let x1 = (left + side).clamp(0, frame_width as i64);
    let y1 = (top + side).clamp(0, frame_height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(CropRegion {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Crop the screen around `bbox` out of `frame`.
pub fn crop_square(frame: &RgbImage, bbox: &BoundingBox) -> Option<FrameImage> {
    let region = square_region(bbox, frame.width(), frame.height())?;
    let crop = imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image();
    Some(Arc::new(crop))
}
