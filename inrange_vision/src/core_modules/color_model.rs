// THEORY:
// The `color_model` module turns a human-friendly "find this color" request into
// the exact hue acceptance test that the segmenter runs on every pixel.
//
// Key architectural principles:
// 1.  **Single Hue Sample**: The target RGB triple is treated as a 1x1 image and
//     converted with the very same RGB->HSV transform that is applied to frames.
//     Whatever hue the converter assigns to the target is, by construction, the
//     hue it will assign to matching pixels.
// 2.  **Circular Domain**: 8-bit hue lives on a circle of 180 steps (2 degrees per
//     step). A band of +/-10 steps around a red target crosses the 0/180 seam, so
//     the band is stored as two closed intervals. When no seam is crossed the
//     second interval is absent and contributes nothing.
// 3.  **Computed Once**: The band depends only on configuration. It is derived at
//     configure time and then only read, which makes it safe to share between
//     concurrently processed frames.

/// Half-width of the hue acceptance band, in 8-bit hue steps.
pub const HUE_TOLERANCE: i32 = 10;
/// Number of steps in the 8-bit hue circle (0..=179 are valid hues).
pub const HUE_DOMAIN: i32 = 180;
/// Upper bound for saturation and value thresholds; the band is open above.
pub const CHANNEL_MAX: i32 = 255;

/// A pixel in 8-bit HSV: hue in 0..=179, saturation and value in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hsv {
    pub hue: u8,
    pub saturation: u8,
    pub value: u8,
}

/// Converts an RGB triple to 8-bit HSV.
///
/// Hue is `degrees / 2` rounded to the nearest step, saturation is
/// `255 * (max - min) / max` and value is `max`. Greys (including black) get
/// hue 0 and saturation 0.
pub fn rgb_to_hsv(red: u8, green: u8, blue: u8) -> Hsv {
    let (r, g, b) = (red as i32, green as i32, blue as i32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let saturation = if v == 0 { 0 } else { (diff * 2 * CHANNEL_MAX + v) / (2 * v) };

    let hue = if diff == 0 {
        0
    } else {
        // Sector offset in units of `diff`, one sector is 60 degrees = 30 steps.
        let sector = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let h = (sector * 60 + diff).div_euclid(2 * diff);
        if h < 0 { h + HUE_DOMAIN } else { h }
    };

    Hsv {
        hue: hue as u8,
        saturation: saturation as u8,
        value: v as u8,
    }
}

/// A closed interval of hue steps. `lo > hi` means the interval is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HueRange {
    pub lo: i32,
    pub hi: i32,
}

impl HueRange {
    /// Admits no hue at all.
    pub const EMPTY: HueRange = HueRange::new(1, 0);

    pub const fn new(lo: i32, hi: i32) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn contains(&self, hue: u8) -> bool {
        let hue = hue as i32;
        hue >= self.lo && hue <= self.hi
    }
}

/// The set of accepted hues: a primary interval plus, when the band wraps around
/// the 0/180 seam, a second interval starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HueBand {
    pub primary: HueRange,
    pub wrapped: Option<HueRange>,
}

impl HueBand {
    /// Builds the `[hue - 10, hue + 10]` band, split at the seam when needed.
    pub fn around(hue: i32) -> Self {
        let low = hue - HUE_TOLERANCE;
        let high = hue + HUE_TOLERANCE;

        if hue < HUE_TOLERANCE {
            // Crosses 0: the negative part wraps to the top of the circle.
            Self {
                primary: HueRange::new(low + HUE_DOMAIN, HUE_DOMAIN),
                wrapped: Some(HueRange::new(0, high)),
            }
        } else if hue > HUE_DOMAIN - HUE_TOLERANCE {
            // Crosses 180: the overflow continues from 0.
            Self {
                primary: HueRange::new(low, HUE_DOMAIN),
                wrapped: Some(HueRange::new(0, high - HUE_DOMAIN)),
            }
        } else {
            Self {
                primary: HueRange::new(low, high),
                wrapped: None,
            }
        }
    }

    /// Both intervals, the second one empty when the band does not wrap.
    pub fn ranges(&self) -> [HueRange; 2] {
        [self.primary, self.wrapped.unwrap_or(HueRange::EMPTY)]
    }
}

/// The configured detection target: the color to look for and the minimum
/// saturation and value a pixel must have to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Inclusive lower saturation bound. Not clamped: values above 255 admit nothing.
    pub low_saturation: i32,
    /// Inclusive lower value bound. Not clamped: values above 255 admit nothing.
    pub low_value: i32,
}

impl Default for TargetColor {
    fn default() -> Self {
        Self {
            red: 255,
            green: 0,
            blue: 0,
            low_saturation: 50,
            low_value: 50,
        }
    }
}

impl TargetColor {
    /// The hue of the target, as the frame converter would see it.
    pub fn hue(&self) -> u8 {
        rgb_to_hsv(self.red, self.green, self.blue).hue
    }

    pub fn hue_band(&self) -> HueBand {
        HueBand::around(self.hue() as i32)
    }

    /// True when an HSV pixel passes the saturation and value lower bounds.
    #[inline]
    pub fn admits_intensity(&self, pixel: Hsv) -> bool {
        pixel.saturation as i32 >= self.low_saturation && pixel.value as i32 >= self.low_value
    }
}
