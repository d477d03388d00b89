//! Deterministic crop geometry for the ensemble.

use image::DynamicImage;

/// Rectangle in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The three sample regions: the full frame, the largest centered square,
/// and a centered square at 80% of that side.
pub fn crop_regions(width: u32, height: u32) -> [CropRegion; 3] {
    let full = CropRegion {
        x: 0,
        y: 0,
        width,
        height,
    };

    let side = width.min(height).max(1);
    let square = CropRegion {
        x: width.saturating_sub(side) / 2,
        y: height.saturating_sub(side) / 2,
        width: side,
        height: side,
    };

    let inner = (side * 4 / 5).max(1);
    let inner_square = CropRegion {
        x: width.saturating_sub(inner) / 2,
        y: height.saturating_sub(inner) / 2,
        width: inner,
        height: inner,
    };

    [full, square, inner_square]
}

pub fn make_crops(image: &DynamicImage) -> Vec<DynamicImage> {
    crop_regions(image.width(), image.height())
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if i == 0 {
                image.clone()
            } else {
                image.crop_imm(r.x, r.y, r.width, r.height)
            }
        })
        .collect()
}
