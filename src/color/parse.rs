//! Color and pass parsing for command-line and config input

use crate::error::{BgStripError, Result};
use crate::types::{ColorPass, RgbColor, MAX_THRESHOLD};
use std::str::FromStr;

const NAMED_COLORS: &[(&str, RgbColor)] = &[
    ("black", RgbColor::new(0, 0, 0)),
    ("white", RgbColor::new(255, 255, 255)),
    ("red", RgbColor::new(255, 0, 0)),
    ("green", RgbColor::new(0, 255, 0)),
    ("blue", RgbColor::new(0, 0, 255)),
    ("yellow", RgbColor::new(255, 255, 0)),
    ("cyan", RgbColor::new(0, 255, 255)),
    ("magenta", RgbColor::new(255, 0, 255)),
    ("gray", RgbColor::new(128, 128, 128)),
    ("grey", RgbColor::new(128, 128, 128)),
];

/// Parse `#RRGGBB`, `RRGGBB`, `#RGB`, `r,g,b` or a color name
pub fn parse_color(input: &str) -> Result<RgbColor> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(BgStripError::invalid_config("Color must not be empty"));
    }

    if let Some((_, color)) = NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
    {
        return Ok(*color);
    }

    if trimmed.contains(',') {
        return parse_components(trimmed);
    }

    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    parse_hex(hex).ok_or_else(|| {
        BgStripError::invalid_config(format!(
            "Unrecognized color '{}'. Use #RRGGBB, #RGB, r,g,b or a color name",
            input
        ))
    })
}

fn parse_components(input: &str) -> Result<RgbColor> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(BgStripError::invalid_config(format!(
            "Color '{}' must have exactly three components",
            input
        )));
    };
    let channel = |value: &str| {
        value.parse::<u8>().map_err(|_| {
            BgStripError::config_value_error("color component", value, "0-255")
        })
    };
    Ok(RgbColor::new(channel(*r)?, channel(*g)?, channel(*b)?))
}

fn parse_hex(hex: &str) -> Option<RgbColor> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
            let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
            let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
            Some(RgbColor::new(r, g, b))
        },
        3 => {
            // #abc expands to #aabbcc
            let digit = |i: usize| -> Option<u8> {
                let v = u8::from_str_radix(hex.get(i..=i)?, 16).ok()?;
                Some(v * 17)
            };
            Some(RgbColor::new(digit(0)?, digit(1)?, digit(2)?))
        },
        _ => None,
    }
}

/// Parse a pass written as `COLOR` or `COLOR:THRESHOLD`
///
/// Passes without an explicit threshold use `default_threshold`.
pub fn parse_pass(input: &str, default_threshold: u32) -> Result<ColorPass> {
    let (color_part, threshold) = match input.rsplit_once(':') {
        Some((color, threshold)) => {
            let threshold = threshold.trim().parse::<u32>().map_err(|_| {
                BgStripError::config_value_error("threshold", threshold, "0-441")
            })?;
            (color, threshold)
        },
        None => (input, default_threshold),
    };

    if threshold > MAX_THRESHOLD {
        return Err(BgStripError::config_value_error(
            "threshold",
            threshold,
            "0-441",
        ));
    }

    Ok(ColorPass::new(parse_color(color_part)?, threshold))
}

impl FromStr for RgbColor {
    type Err = BgStripError;

    fn from_str(s: &str) -> Result<Self> {
        parse_color(s)
    }
}
