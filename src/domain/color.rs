use std::f64::consts::PI;
use std::fmt::{self, Display};

pub const MAX_HUE: f64 = 360.0;
pub const DEFAULT_KELVIN: i32 = 3500;

/// Hue/saturation/kelvin color of a light. A saturation of zero means the
/// light renders a white with the given color temperature.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    pub hue: f64,
    pub saturation: f64,
    pub kelvin: i32,
}

impl Color {
    pub fn new(hue: f64, saturation: f64, kelvin: i32) -> Self {
        Color { hue, saturation, kelvin }
    }

    pub fn color(hue: f64, saturation: f64) -> Self {
        Color::new(hue, saturation, DEFAULT_KELVIN)
    }

    pub fn white(kelvin: i32) -> Self {
        Color::new(0.0, 0.0, kelvin)
    }

    pub fn is_white(&self) -> bool {
        self.saturation == 0.0
    }

    pub fn is_color(&self) -> bool {
        !self.is_white()
    }

    /// Averages colors by taking the circular mean of the hues. Hue is an angle, so summing
    /// unit vectors and taking the `atan2` of the totals keeps 350° and 10° averaging to 0°
    /// instead of 180°. Saturation and kelvin are plain arithmetic means.
    pub fn average(colors: &[Color]) -> Color {
        match colors {
            [] => Color::white(DEFAULT_KELVIN),
            [color] => *color,
            colors => {
                let mut hue_x_total = 0.0;
                let mut hue_y_total = 0.0;
                let mut saturation_total = 0.0;
                let mut kelvin_total: i64 = 0;
                for color in colors {
                    hue_x_total += (color.hue * 2.0 * PI / MAX_HUE).sin();
                    hue_y_total += (color.hue * 2.0 * PI / MAX_HUE).cos();
                    saturation_total += color.saturation;
                    kelvin_total += color.kelvin as i64;
                }

                let mut hue = hue_x_total.atan2(hue_y_total) / (2.0 * PI);
                if hue < 0.0 {
                    hue += 1.0;
                }

                let count = colors.len();
                Color {
                    hue: hue * MAX_HUE,
                    saturation: saturation_total / count as f64,
                    kelvin: (kelvin_total / count as i64) as i32,
                }
            }
        }
    }

    /// Parses the query string form, either `kelvin:<k>` or `hue:<h> saturation:<s>`.
    pub fn from_query(query: &str) -> Option<Color> {
        if let Some(kelvin) = query.strip_prefix("kelvin:") {
            return Some(Color::white(kelvin.parse().ok()?));
        }

        let (hue_part, saturation_part) = query.split_once(' ')?;
        let hue = hue_part.strip_prefix("hue:")?.parse().ok()?;
        let saturation = saturation_part.strip_prefix("saturation:")?.parse().ok()?;
        Some(Color::color(hue, saturation))
    }

    /// The form the remote API accepts as a `color` parameter.
    pub fn to_query_string(&self) -> String {
        if self.is_white() {
            format!("kelvin:{}", self.kelvin)
        } else {
            format!("hue:{} saturation:{}", self.hue, self.saturation)
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query_string())
    }
}
