use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::contour_area;

use crate::zone::Rect;

/// Outer contour of one 8-connected group of set pixels in a binary mask.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Bounding box of the contour points, inclusive of both edges.
    pub bounds: Rect,
    /// Polygon area enclosed by the outer contour; holes count towards it.
    pub area: f64,
}

/// External contours of the non-zero pixels in `mask`.
///
/// Contours nested inside another blob's hole are skipped. Regions come back in
/// raster discovery order of each contour's first point.
pub fn external_regions(mask: &GrayImage) -> Vec<Region> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let min_x = contour.points.iter().map(|p| p.x).min()?;
            let max_x = contour.points.iter().map(|p| p.x).max()?;
            let min_y = contour.points.iter().map(|p| p.y).min()?;
            let max_y = contour.points.iter().map(|p| p.y).max()?;
            Some(Region {
                bounds: Rect::new(
                    min_x as u32,
                    min_y as u32,
                    (max_x - min_x + 1) as u32,
                    (max_y - min_y + 1) as u32,
                ),
                area: contour_area(&contour.points).abs(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn fill(mask: &mut GrayImage, rect: Rect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn separate_blobs_in_raster_order() {
        let mut mask = GrayImage::new(20, 20);
        fill(&mut mask, Rect::new(12, 2, 4, 3));
        fill(&mut mask, Rect::new(1, 10, 5, 5));

        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].bounds, Rect::new(12, 2, 4, 3));
        assert_eq!(regions[0].area, 6.0);
        assert_eq!(regions[1].bounds, Rect::new(1, 10, 5, 5));
        assert_eq!(regions[1].area, 16.0);
    }

    #[test]
    fn diagonal_pixels_connect() {
        let mut mask = GrayImage::new(5, 5);
        for i in 0..5 {
            mask.put_pixel(i, i, Luma([255]));
        }
        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, Rect::new(0, 0, 5, 5));
        assert_eq!(regions[0].area, 0.0);
    }

    #[test]
    fn hollow_blob_area_includes_its_hole() {
        let mut mask = GrayImage::new(12, 12);
        fill(&mut mask, Rect::new(1, 1, 9, 9));
        for y in 3..8 {
            for x in 3..8 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        // A blob inside the hole is not an external contour.
        mask.put_pixel(5, 5, Luma([255]));

        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, Rect::new(1, 1, 9, 9));
        assert_eq!(regions[0].area, 64.0);
    }

    #[test]
    fn empty_mask_has_no_regions() {
        assert!(external_regions(&GrayImage::new(7, 3)).is_empty());
    }
}
