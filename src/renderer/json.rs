// renderer/json.rs
// Small helpers shared by the JSON-driven descriptions (states, effects, lights).

use glam::Vec4;
use serde_json::Value;

/// Reads an array of numbers. Non-numeric entries make the whole read fail.
pub(crate) fn floats(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

pub(crate) fn float(value: &Value, key: &str) -> Option<f32> {
    value.get(key)?.as_f64().map(|f| f as f32)
}

/// Accepts `[r, g, b]`, `[r, g, b, a]` or a `#rrggbb` / `#rrggbbaa` hex string.
pub(crate) fn parse_color(value: &Value) -> Option<Vec4> {
    if let Some(s) = value.as_str() {
        return parse_hex_color(s);
    }

    match floats(value)?.as_slice() {
        [r, g, b] => Some(Vec4::new(*r, *g, *b, 1.0)),
        [r, g, b, a] => Some(Vec4::new(*r, *g, *b, *a)),
        _ => None,
    }
}

fn parse_hex_color(s: &str) -> Option<Vec4> {
    let hex = s.strip_prefix('#')?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }

    let channel = |i: usize| -> Option<f32> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .ok()
            .map(|c| c as f32 / 255.0)
    };

    let alpha = if hex.len() == 8 { channel(6)? } else { 1.0 };
    Some(Vec4::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}
