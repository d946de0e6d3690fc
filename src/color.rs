use once_cell::sync::Lazy;
use regex::Regex;

/// An RGBA color with straight-alpha channels in `[0, 1]`.
///
/// Colors enter the engine either as CSS-style strings (`"#ff0000"`,
/// `"rgb(255, 0, 0)"`, `"hsl(0, 100%, 50%)"`, `"red"`) or through the
/// `rgb`/`rgba` builtins, and leave it as `[r, g, b, a]` arrays or
/// `rgba(...)` strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

static RGB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgba?\(\s*([0-9.]+)\s*,\s*([0-9.]+)\s*,\s*([0-9.]+)\s*(?:,\s*([0-9.]+)\s*)?\)$")
        .unwrap()
});

static HSL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^hsla?\(\s*([0-9.]+)\s*,\s*([0-9.]+)%\s*,\s*([0-9.]+)%\s*(?:,\s*([0-9.]+)\s*)?\)$",
    )
    .unwrap()
});

impl Color {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Color {
        Color { r, g, b, a }
    }

    pub const fn black() -> Color {
        Color::new(0.0, 0.0, 0.0, 1.0)
    }

    pub const fn transparent() -> Color {
        Color::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Construct from 0-255 channel values plus a 0-1 alpha, the form
    /// used by the `rgb`/`rgba` builtins and validated array input.
    pub fn from_rgba_channels(r: f64, g: f64, b: f64, a: f64) -> Color {
        Color::new(r / 255.0, g / 255.0, b / 255.0, a)
    }

    /// Parse a CSS-style color string.
    ///
    /// Supports `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`,
    /// `rgba()`, `hsl()`, `hsla()`, and named colors.
    pub fn parse(s: &str) -> Option<Color> {
        let s = s.trim();

        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        if s.starts_with("rgb") {
            return parse_rgb(s);
        }
        if s.starts_with("hsl") {
            return parse_hsl(s);
        }
        named_color(&s.to_ascii_lowercase())
    }

    /// The `[r, g, b, a]` array form with 0-1 channels.
    pub fn to_array(&self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// The `rgba(r,g,b,a)` string form with 0-255 integer channels,
    /// used by string coercion and diagnostics.
    pub fn to_rgba_string(&self) -> String {
        format!(
            "rgba({},{},{},{})",
            (self.r * 255.0).round(),
            (self.g * 255.0).round(),
            (self.b * 255.0).round(),
            self.a
        )
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digit = |i: usize| -> Option<f64> {
        u8::from_str_radix(hex.get(i..i + 1)?, 16)
            .ok()
            .map(|v| (v * 17) as f64 / 255.0)
    };
    let pair = |i: usize| -> Option<f64> {
        u8::from_str_radix(hex.get(i..i + 2)?, 16)
            .ok()
            .map(|v| v as f64 / 255.0)
    };

    match hex.len() {
        3 => Some(Color::new(digit(0)?, digit(1)?, digit(2)?, 1.0)),
        4 => Some(Color::new(digit(0)?, digit(1)?, digit(2)?, digit(3)?)),
        6 => Some(Color::new(pair(0)?, pair(2)?, pair(4)?, 1.0)),
        8 => Some(Color::new(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
        _ => None,
    }
}

fn parse_rgb(s: &str) -> Option<Color> {
    let caps = RGB_RE.captures(s)?;
    let channel = |i: usize| -> Option<f64> { caps.get(i)?.as_str().parse::<f64>().ok() };
    let r = channel(1)?;
    let g = channel(2)?;
    let b = channel(3)?;
    let a = match caps.get(4) {
        Some(m) => m.as_str().parse::<f64>().ok()?,
        None => 1.0,
    };
    if !(0.0..=255.0).contains(&r)
        || !(0.0..=255.0).contains(&g)
        || !(0.0..=255.0).contains(&b)
        || !(0.0..=1.0).contains(&a)
    {
        return None;
    }
    Some(Color::from_rgba_channels(r, g, b, a))
}

fn parse_hsl(s: &str) -> Option<Color> {
    let caps = HSL_RE.captures(s)?;
    let h = caps.get(1)?.as_str().parse::<f64>().ok()? % 360.0 / 360.0;
    let sat = (caps.get(2)?.as_str().parse::<f64>().ok()? / 100.0).clamp(0.0, 1.0);
    let l = (caps.get(3)?.as_str().parse::<f64>().ok()? / 100.0).clamp(0.0, 1.0);
    let a = match caps.get(4) {
        Some(m) => m.as_str().parse::<f64>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };

    if sat == 0.0 {
        return Some(Color::new(l, l, l, a));
    }

    let q = if l < 0.5 { l * (1.0 + sat) } else { l + sat - l * sat };
    let p = 2.0 * l - q;
    Some(Color::new(
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
        a,
    ))
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn named_color(name: &str) -> Option<Color> {
    let rgb = |r: u8, g: u8, b: u8| Color::from_rgba_channels(r as f64, g as f64, b as f64, 1.0);
    let color = match name {
        "transparent" => Color::transparent(),
        "black" => rgb(0, 0, 0),
        "white" => rgb(255, 255, 255),
        "red" => rgb(255, 0, 0),
        "green" => rgb(0, 128, 0),
        "lime" => rgb(0, 255, 0),
        "blue" => rgb(0, 0, 255),
        "yellow" => rgb(255, 255, 0),
        "cyan" | "aqua" => rgb(0, 255, 255),
        "magenta" | "fuchsia" => rgb(255, 0, 255),
        "gray" | "grey" => rgb(128, 128, 128),
        "silver" => rgb(192, 192, 192),
        "maroon" => rgb(128, 0, 0),
        "olive" => rgb(128, 128, 0),
        "navy" => rgb(0, 0, 128),
        "teal" => rgb(0, 128, 128),
        "purple" => rgb(128, 0, 128),
        "orange" => rgb(255, 165, 0),
        "brown" => rgb(165, 42, 42),
        "pink" => rgb(255, 192, 203),
        "gold" => rgb(255, 215, 0),
        "indigo" => rgb(75, 0, 130),
        "violet" => rgb(238, 130, 238),
        "coral" => rgb(255, 127, 80),
        "salmon" => rgb(250, 128, 114),
        "khaki" => rgb(240, 230, 140),
        "turquoise" => rgb(64, 224, 208),
        "tan" => rgb(210, 180, 140),
        "beige" => rgb(245, 245, 220),
        "ivory" => rgb(255, 255, 240),
        "slategray" | "slategrey" => rgb(112, 128, 144),
        "lightgray" | "lightgrey" => rgb(211, 211, 211),
        "darkgray" | "darkgrey" => rgb(169, 169, 169),
        "dimgray" | "dimgrey" => rgb(105, 105, 105),
        "steelblue" => rgb(70, 130, 180),
        "royalblue" => rgb(65, 105, 225),
        "skyblue" => rgb(135, 206, 235),
        "tomato" => rgb(255, 99, 71),
        "crimson" => rgb(220, 20, 60),
        "forestgreen" => rgb(34, 139, 34),
        "seagreen" => rgb(46, 139, 87),
        "darkgreen" => rgb(0, 100, 0),
        "darkblue" => rgb(0, 0, 139),
        "darkred" => rgb(139, 0, 0),
        "wheat" => rgb(245, 222, 179),
        "sienna" => rgb(160, 82, 45),
        "chocolate" => rgb(210, 105, 30),
        "peru" => rgb(205, 133, 63),
        "ochre" => rgb(204, 119, 34),
        _ => return None,
    };
    Some(color)
}
