//! Shared color parsing helpers.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

/// Parse `#RGB` or `#RRGGBB` values into RGB channels.
#[must_use]
pub fn parse_hex_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let r = channel(&hex[0..1].repeat(2))?;
            let g = channel(&hex[1..2].repeat(2))?;
            let b = channel(&hex[2..3].repeat(2))?;
            Some((r, g, b))
        }
        6 => {
            let r = channel(&hex[0..2])?;
            let g = channel(&hex[2..4])?;
            let b = channel(&hex[4..6])?;
            Some((r, g, b))
        }
        _ => None,
    }
}

/// Parse a CSS hex color into RGBA, falling back to `fallback` when unparseable.
///
/// `"transparent"` maps to fully transparent black.
#[must_use]
pub fn to_rgba(raw: &str, fallback: [u8; 4]) -> [u8; 4] {
    if raw.trim().eq_ignore_ascii_case("transparent") {
        return [0, 0, 0, 0];
    }
    parse_hex_rgb(raw).map_or(fallback, |(r, g, b)| [r, g, b, 255])
}

fn channel(pair: &str) -> Option<u8> {
    let Ok(value) = u8::from_str_radix(pair, 16) else {
        return None;
    };
    Some(value)
}
