//! Fixed-point math utilities for deterministic simulation.
//!
//! Positions are integers in milli-units (`POSITION_SCALE` per world unit).
//! Fractional research multipliers use [`Fixed`]. Floating-point never
//! touches state that feeds the tick hash.

use fixed::types::I32F32;

/// Fixed-point number type for multipliers.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Milli-units per world unit.
pub const POSITION_SCALE: i32 = 1000;

/// Side length of one grid tile in milli-units.
pub const TILE_SIZE: i32 = 1000;

/// Serde support for fixed-point numbers in authored content.
///
/// Values are written as decimal strings (`"1.25"`) and parsed exactly,
/// so content files never go through a float.
pub mod fixed_decimal {
    use std::str::FromStr;

    use super::Fixed;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal string.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize a fixed-point number from a decimal string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Fixed::from_str(text.trim())
            .map_err(|e| D::Error::custom(format!("invalid fixed-point value '{text}': {e}")))
    }
}

/// Integer square root by Newton iteration.
///
/// Returns `floor(sqrt(value))`; non-positive input yields 0.
#[must_use]
pub fn isqrt(value: i64) -> i64 {
    if value <= 0 {
        return 0;
    }
    let mut x = value;
    let mut y = x / 2 + (x & 1);
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Multiply an integer stat by a fixed-point factor, rounding toward -inf.
#[must_use]
pub fn scale_by(value: i32, factor: Fixed) -> i32 {
    (Fixed::from_num(value) * factor).to_num::<i32>()
}

/// Squared distance between two milli-unit points, widened to avoid overflow.
#[must_use]
pub const fn distance_squared(ax: i32, ay: i32, bx: i32, by: i32) -> i64 {
    let dx = bx as i64 - ax as i64;
    let dy = by as i64 - ay as i64;
    dx * dx + dy * dy
}

/// Tile coordinate containing a milli-unit coordinate.
#[must_use]
pub const fn to_tile(milli: i32) -> i32 {
    milli.div_euclid(TILE_SIZE)
}

/// Milli-unit coordinate of a tile's center.
#[must_use]
pub const fn tile_center(tile: i32) -> i32 {
    tile * TILE_SIZE + TILE_SIZE / 2
}

/// Advance `(x, y)` toward `(tx, ty)` by at most `step` milli-units.
///
/// Returns the new position and whether the target was reached. Reaching
/// the target snaps exactly onto it.
#[must_use]
pub fn step_toward(x: i32, y: i32, tx: i32, ty: i32, step: i32) -> (i32, i32, bool) {
    let dx = tx as i64 - x as i64;
    let dy = ty as i64 - y as i64;
    let dist2 = dx * dx + dy * dy;
    if dist2 == 0 {
        return (tx, ty, true);
    }
    let dist = isqrt(dist2);
    if dist <= step as i64 {
        return (tx, ty, true);
    }
    let mx = dx * step as i64 / dist;
    let my = dy * step as i64 / dist;
    (x + mx as i32, y + my as i32, false)
}
