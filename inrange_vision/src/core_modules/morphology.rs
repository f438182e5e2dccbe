// THEORY:
// Binary morphology over `GrayImage` masks (0 = background, anything else = set).
// Erosion keeps a pixel only if the whole structuring element, centered on it,
// lands on set pixels; dilation sets a pixel if any part of the element does.
// Positions of the element that fall outside the image are ignored, so objects
// touching the border are neither eaten nor grown by the edge itself.

use image::{GrayImage, Luma};

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// A set of `(dx, dy)` offsets around an anchor at the element's center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    pub width: u32,
    pub height: u32,
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    /// An ellipse inscribed in a `width x height` box. A 5x5 ellipse is the
    /// 5x5 square minus its four corner pairs on the top and bottom rows:
    ///
    /// ```text
    /// . . # . .
    /// # # # # #
    /// # # # # #
    /// # # # # #
    /// . . # . .
    /// ```
    pub fn ellipse(width: u32, height: u32) -> Self {
        let r = (height / 2) as i32;
        let c = (width / 2) as i32;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };
        let mut offsets = Vec::new();

        for i in 0..height as i32 {
            let dy = i - r;
            let (j1, j2) = if dy.abs() <= r {
                let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as i32;
                ((c - dx).max(0), (c + dx + 1).min(width as i32))
            } else {
                (0, 0)
            };
            for j in j1..j2 {
                offsets.push((j - c, dy));
            }
        }

        Self { width, height, offsets }
    }

    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }
}

fn apply(mask: &GrayImage, element: &StructuringElement, erode: bool) -> GrayImage {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as i32, height as i32);

    GrayImage::from_fn(width, height, |x, y| {
        let mut hit = false;
        let mut miss = false;
        for &(dx, dy) in element.offsets() {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || nx >= w || ny < 0 || ny >= h {
                continue;
            }
            if mask.get_pixel(nx as u32, ny as u32).0[0] != MASK_OFF {
                hit = true;
            } else {
                miss = true;
            }
            if (erode && miss) || (!erode && hit) {
                break;
            }
        }
        let on = if erode { !miss } else { hit };
        Luma([if on { MASK_ON } else { MASK_OFF }])
    })
}

pub fn erode(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    apply(mask, element, true)
}

pub fn dilate(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    apply(mask, element, false)
}

/// Count of set pixels.
pub fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] != MASK_OFF).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(element: &StructuringElement) -> Vec<String> {
        let mut rows = vec![vec!['.'; element.width as usize]; element.height as usize];
        let (cx, cy) = ((element.width / 2) as i32, (element.height / 2) as i32);
        for &(dx, dy) in element.offsets() {
            rows[(cy + dy) as usize][(cx + dx) as usize] = '#';
        }
        rows.into_iter().map(|r| r.into_iter().collect()).collect()
    }

    #[test]
    fn five_by_five_ellipse_shape() {
        let element = StructuringElement::ellipse(5, 5);
        assert_eq!(
            render(&element),
            vec!["..#..", "#####", "#####", "#####", "..#.."]
        );
        assert_eq!(element.offsets().len(), 17);
    }

    #[test]
    fn three_by_three_ellipse_is_a_cross() {
        let element = StructuringElement::ellipse(3, 3);
        assert_eq!(render(&element), vec![".#.", "###", ".#."]);
    }

    #[test]
    fn erosion_removes_small_specks() {
        let mut mask = GrayImage::new(20, 20);
        for y in 8..11 {
            for x in 8..11 {
                mask.put_pixel(x, y, Luma([MASK_ON]));
            }
        }
        let eroded = erode(&mask, &StructuringElement::ellipse(5, 5));
        assert_eq!(count_set(&eroded), 0);
    }

    #[test]
    fn dilation_grows_a_point_into_the_element() {
        let mut mask = GrayImage::new(9, 9);
        mask.put_pixel(4, 4, Luma([MASK_ON]));
        let element = StructuringElement::ellipse(5, 5);
        let grown = dilate(&mask, &element);
        assert_eq!(count_set(&grown), element.offsets().len());
        assert_eq!(grown.get_pixel(4, 2).0[0], MASK_ON);
        assert_eq!(grown.get_pixel(2, 2).0[0], MASK_OFF);
    }

    #[test]
    fn border_does_not_erode_full_mask() {
        let mask = GrayImage::from_pixel(6, 6, Luma([MASK_ON]));
        let eroded = erode(&mask, &StructuringElement::ellipse(5, 5));
        assert_eq!(count_set(&eroded), 36);
    }
}
