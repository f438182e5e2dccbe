// THEORY:
// The `BlobDetector` is the engine of the spatial grouping layer. It turns the
// cleaned binary mask from the `Segmenter` into a list of connected regions and
// picks the one that matters: the biggest.
//
// Key architectural principles & algorithm steps:
// 1.  **Raster-Order Labeling**: The mask is scanned row by row. Every set pixel
//     that has not been claimed yet seeds a new region, so labels are handed out
//     in the order in which each region's first pixel is met. Label 0 is the
//     background.
// 2.  **Region Growing**: From each seed the region is grown with an explicit
//     stack over all 8 neighbors (diagonals included), claiming every set pixel
//     reachable from the seed.
// 3.  **Data Aggregation**: While growing, the bounding box and the pixel count
//     are accumulated, giving one `ComponentStats` per region.
// 4.  **Selection**: The region with the strictly greatest area wins. Equal areas
//     keep the earlier label, which makes the result a pure function of the mask.
// 5.  **Stateless Utility**: Nothing is remembered between frames.

use crate::core_modules::smart_blob::{BoundingBox, ComponentStats};
use image::GrayImage;

pub mod blob_detector {
    use super::*; // Make structs from parent module available.

    const NEIGHBORS: [(i32, i32); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    /// A label image plus the statistics of every region in it.
    #[derive(Debug, Clone)]
    pub struct Labeling {
        pub width: u32,
        pub height: u32,
        /// One label per pixel, row-major. 0 is background.
        pub labels: Vec<u32>,
        /// Region statistics, `components[i].label == i + 1`.
        pub components: Vec<ComponentStats>,
    }

    /// Labels the 8-connected regions of a binary mask.
    pub fn label_components(mask: &GrayImage) -> Labeling {
        let (width, height) = mask.dimensions();
        let (w, h) = (width as i32, height as i32);
        let raw = mask.as_raw();
        let mut labels = vec![0u32; raw.len()];
        let mut components: Vec<ComponentStats> = Vec::new();
        let mut stack: Vec<(u32, u32)> = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if raw[index] == 0 || labels[index] != 0 {
                    continue;
                }

                // --- New region seeded at its first raster-order pixel ---
                let label = components.len() as u32 + 1;
                labels[index] = label;
                stack.push((x, y));

                let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
                let mut area = 0usize;

                while let Some((cx, cy)) = stack.pop() {
                    area += 1;
                    min_x = min_x.min(cx);
                    min_y = min_y.min(cy);
                    max_x = max_x.max(cx);
                    max_y = max_y.max(cy);

                    for (dx, dy) in NEIGHBORS {
                        let nx = cx as i32 + dx;
                        let ny = cy as i32 + dy;
                        if nx < 0 || nx >= w || ny < 0 || ny >= h {
                            continue;
                        }
                        let n_index = (ny * w + nx) as usize;
                        if raw[n_index] != 0 && labels[n_index] == 0 {
                            labels[n_index] = label;
                            stack.push((nx as u32, ny as u32));
                        }
                    }
                }

                components.push(ComponentStats {
                    label,
                    bounding_box: BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
                    area,
                });
            }
        }

        Labeling {
            width,
            height,
            labels,
            components,
        }
    }

    /// The region with the strictly greatest area; ties go to the lowest label.
    pub fn select_largest(components: &[ComponentStats]) -> Option<&ComponentStats> {
        let mut best: Option<&ComponentStats> = None;
        for component in components {
            if best.is_none_or(|b| component.area > b.area) {
                best = Some(component);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::blob_detector::*;
    use super::*;
    use image::Luma;

    fn largest_box(mask: &GrayImage) -> Option<BoundingBox> {
        select_largest(&label_components(mask).components).map(|c| c.bounding_box)
    }

    fn label_at(labeling: &Labeling, x: u32, y: u32) -> u32 {
        labeling.labels[(y * labeling.width + x) as usize]
    }

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn empty_mask_has_no_detection() {
        let mask = GrayImage::new(32, 32);
        assert!(label_components(&mask).components.is_empty());
        assert_eq!(largest_box(&mask), None);
    }

    #[test]
    fn larger_of_two_blobs_wins() {
        let mut mask = GrayImage::new(64, 64);
        fill(&mut mask, 2, 2, 10, 5); // 50 px, labeled first
        fill(&mut mask, 30, 30, 20, 10); // 200 px
        let labeling = label_components(&mask);
        assert_eq!(labeling.components.len(), 2);
        assert_eq!(labeling.components[0].area, 50);
        assert_eq!(labeling.components[1].area, 200);
        assert_eq!(largest_box(&mask), Some(BoundingBox::new(30, 30, 20, 10)));
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mut mask = GrayImage::new(5, 5);
        for i in 0..5 {
            mask.put_pixel(i, i, Luma([255]));
        }
        let labeling = label_components(&mask);
        assert_eq!(labeling.components.len(), 1);
        assert_eq!(labeling.components[0].area, 5);
        assert_eq!(labeling.components[0].bounding_box, BoundingBox::new(0, 0, 5, 5));
    }

    #[test]
    fn labels_follow_raster_order_of_first_pixel() {
        let mut mask = GrayImage::new(20, 20);
        fill(&mut mask, 15, 1, 2, 10); // first pixel at row 1
        fill(&mut mask, 1, 5, 3, 3); // first pixel at row 5
        let labeling = label_components(&mask);
        assert_eq!(label_at(&labeling, 15, 1), 1);
        assert_eq!(label_at(&labeling, 1, 5), 2);
        assert_eq!(label_at(&labeling, 0, 0), 0);
    }

    #[test]
    fn equal_areas_keep_lowest_label() {
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 20, 2, 4, 4);
        fill(&mut mask, 2, 20, 4, 4);
        let labeling = label_components(&mask);
        let winner = select_largest(&labeling.components).unwrap();
        assert_eq!(winner.label, 1);
        assert_eq!(winner.bounding_box, BoundingBox::new(20, 2, 4, 4));
    }

    #[test]
    fn non_rectangular_region_box_and_area() {
        let mut mask = GrayImage::new(10, 10);
        fill(&mut mask, 2, 2, 6, 1);
        fill(&mut mask, 2, 3, 1, 5);
        let labeling = label_components(&mask);
        assert_eq!(labeling.components.len(), 1);
        assert_eq!(labeling.components[0].area, 11);
        assert_eq!(labeling.components[0].bounding_box, BoundingBox::new(2, 2, 6, 6));
    }

    #[test]
    fn single_pixel_region_has_unit_box() {
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(7, 0, Luma([255]));
        let labeling = label_components(&mask);
        assert_eq!(labeling.components[0].area, 1);
        assert_eq!(labeling.components[0].bounding_box, BoundingBox::new(7, 0, 1, 1));
    }
}
