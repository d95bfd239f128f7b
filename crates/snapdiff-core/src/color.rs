//! CSS colour parsing and perceptual equality.
//!
//! Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb(...)`, `rgba(...)`,
//! the common CSS named colours and `transparent`. Two colours are equal when
//! every channel differs by at most a tolerance (alpha scaled to 0–255).
//! Unparsable input yields `None`; a CSS value the parser does not know is
//! never a hard error.

/// Default per-channel tolerance out of 255.
pub const DEFAULT_CHANNEL_TOLERANCE: u8 = 5;

/// A normalised colour. `a` is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 1.0 }
    }

    /// Canonical hex form: `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if (self.a - 1.0).abs() < f32::EPSILON {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            let alpha = (self.a.clamp(0.0, 1.0) * 255.0).round() as u8;
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, alpha)
        }
    }
}

/// Parse a CSS colour value.
pub fn parse_color(value: &str) -> Option<Rgba> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("rgb(") || lower.starts_with("rgba(") {
        return parse_rgb_func(&lower);
    }
    named_color(&lower)
}

/// Channel-wise equality under `tolerance` (out of 255).
pub fn colors_equal(a: &Rgba, b: &Rgba, tolerance: u8) -> bool {
    let t = i16::from(tolerance);
    let da = ((a.a - b.a) * 255.0).round().abs() as i16;
    (i16::from(a.r) - i16::from(b.r)).abs() <= t
        && (i16::from(a.g) - i16::from(b.g)).abs() <= t
        && (i16::from(a.b) - i16::from(b.b)).abs() <= t
        && da <= t
}

/// Whether two CSS colour strings denote visually equal colours. Strings
/// that fail to parse compare by exact text.
pub fn css_colors_equal(a: &str, b: &str, tolerance: u8) -> bool {
    match (parse_color(a), parse_color(b)) {
        (Some(ca), Some(cb)) => colors_equal(&ca, &cb, tolerance),
        _ => a.trim() == b.trim(),
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()?;
    match digits.len() {
        3 | 4 => {
            let r = digits[0] * 17;
            let g = digits[1] * 17;
            let b = digits[2] * 17;
            let a = digits.get(3).map_or(1.0, |&d| f32::from(d * 17) / 255.0);
            Some(Rgba { r, g, b, a })
        }
        6 | 8 => {
            let r = digits[0] * 16 + digits[1];
            let g = digits[2] * 16 + digits[3];
            let b = digits[4] * 16 + digits[5];
            let a = if digits.len() == 8 {
                f32::from(digits[6] * 16 + digits[7]) / 255.0
            } else {
                1.0
            };
            Some(Rgba { r, g, b, a })
        }
        _ => None,
    }
}

fn parse_rgb_func(value: &str) -> Option<Rgba> {
    let open = value.find('(')?;
    let close = value.rfind(')')?;
    let parts: Vec<&str> = value[open + 1..close]
        .split([',', '/'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 3 {
        return None;
    }
    let channel = |raw: &str| -> Option<u8> {
        if let Some(pct) = raw.strip_suffix('%') {
            let v: f32 = pct.trim().parse().ok()?;
            Some((v / 100.0 * 255.0).round().clamp(0.0, 255.0) as u8)
        } else {
            let v: f32 = raw.parse().ok()?;
            Some(v.round().clamp(0.0, 255.0) as u8)
        }
    };
    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = match parts.get(3) {
        Some(raw) => {
            if let Some(pct) = raw.strip_suffix('%') {
                pct.trim().parse::<f32>().ok()? / 100.0
            } else {
                raw.parse::<f32>().ok()?
            }
        }
        None => 1.0,
    };
    Some(Rgba {
        r,
        g,
        b,
        a: a.clamp(0.0, 1.0),
    })
}

fn named_color(name: &str) -> Option<Rgba> {
    let c = match name {
        "transparent" => Rgba {
            r: 0,
            g: 0,
            b: 0,
            a: 0.0,
        },
        "black" => Rgba::opaque(0, 0, 0),
        "white" => Rgba::opaque(255, 255, 255),
        "red" => Rgba::opaque(255, 0, 0),
        "green" => Rgba::opaque(0, 128, 0),
        "blue" => Rgba::opaque(0, 0, 255),
        "yellow" => Rgba::opaque(255, 255, 0),
        "cyan" | "aqua" => Rgba::opaque(0, 255, 255),
        "magenta" | "fuchsia" => Rgba::opaque(255, 0, 255),
        "gray" | "grey" => Rgba::opaque(128, 128, 128),
        "silver" => Rgba::opaque(192, 192, 192),
        "maroon" => Rgba::opaque(128, 0, 0),
        "olive" => Rgba::opaque(128, 128, 0),
        "lime" => Rgba::opaque(0, 255, 0),
        "teal" => Rgba::opaque(0, 128, 128),
        "navy" => Rgba::opaque(0, 0, 128),
        "purple" => Rgba::opaque(128, 0, 128),
        "orange" => Rgba::opaque(255, 165, 0),
        "pink" => Rgba::opaque(255, 192, 203),
        "brown" => Rgba::opaque(165, 42, 42),
        "gold" => Rgba::opaque(255, 215, 0),
        "indigo" => Rgba::opaque(75, 0, 130),
        "violet" => Rgba::opaque(238, 130, 238),
        "coral" => Rgba::opaque(255, 127, 80),
        "salmon" => Rgba::opaque(250, 128, 114),
        "khaki" => Rgba::opaque(240, 230, 140),
        "crimson" => Rgba::opaque(220, 20, 60),
        "tomato" => Rgba::opaque(255, 99, 71),
        "orchid" => Rgba::opaque(218, 112, 214),
        "plum" => Rgba::opaque(221, 160, 221),
        "turquoise" => Rgba::opaque(64, 224, 208),
        "slategray" | "slategrey" => Rgba::opaque(112, 128, 144),
        "lightgray" | "lightgrey" => Rgba::opaque(211, 211, 211),
        "darkgray" | "darkgrey" => Rgba::opaque(169, 169, 169),
        "dimgray" | "dimgrey" => Rgba::opaque(105, 105, 105),
        "whitesmoke" => Rgba::opaque(245, 245, 245),
        "gainsboro" => Rgba::opaque(220, 220, 220),
        "lightblue" => Rgba::opaque(173, 216, 230),
        "lightgreen" => Rgba::opaque(144, 238, 144),
        "lightyellow" => Rgba::opaque(255, 255, 224),
        "darkred" => Rgba::opaque(139, 0, 0),
        "darkgreen" => Rgba::opaque(0, 100, 0),
        "darkblue" => Rgba::opaque(0, 0, 139),
        "darkorange" => Rgba::opaque(255, 140, 0),
        "skyblue" => Rgba::opaque(135, 206, 235),
        "steelblue" => Rgba::opaque(70, 130, 180),
        "royalblue" => Rgba::opaque(65, 105, 225),
        "seagreen" => Rgba::opaque(46, 139, 87),
        "forestgreen" => Rgba::opaque(34, 139, 34),
        "midnightblue" => Rgba::opaque(25, 25, 112),
        "rebeccapurple" => Rgba::opaque(102, 51, 153),
        "beige" => Rgba::opaque(245, 245, 220),
        "ivory" => Rgba::opaque(255, 255, 240),
        "lavender" => Rgba::opaque(230, 230, 250),
        "tan" => Rgba::opaque(210, 180, 140),
        "chocolate" => Rgba::opaque(210, 105, 30),
        "firebrick" => Rgba::opaque(178, 34, 34),
        _ => return None,
    };
    Some(c)
}
