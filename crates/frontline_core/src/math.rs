//! Fixed-point math utilities for deterministic simulation.
//!
//! Every simulation quantity (positions, hit points, timers, balances) is a
//! [`Fixed`]. Distances are expressed in map units; one tile spans
//! `SimConfig::tile_size` units, which keeps squared distances across the
//! largest map comfortably inside the `I32F32` range.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// 32 integer bits and 32 fractional bits.
pub type Fixed = I32F32;

/// Build a [`Fixed`] from a ratio of integers without touching floats.
#[must_use]
pub fn ratio(numerator: i32, denominator: i32) -> Fixed {
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

/// Fixed-point 2D vector (a point or displacement in map units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes as the raw bit representation (i64) so snapshots round-trip
/// exactly.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>` using the raw bit representation.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_bits()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

/// Serde support for hand-authored data files.
///
/// Writes fixed-point numbers as decimal strings (`"0.3"`) and parses them
/// back with the exact decimal parser of the `fixed` crate, so data files stay
/// readable without routing values through floats.
pub mod fixed_str_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

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
        text.trim()
            .parse::<Fixed>()
            .map_err(|e| D::Error::custom(format!("invalid fixed-point value '{text}': {e}")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        sqrt(self.distance_squared(other))
    }

    /// Whether `other` lies within `range` of this point (inclusive).
    #[must_use]
    pub fn within(self, other: Self, range: Fixed) -> bool {
        self.distance_squared(other) <= range * range
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        sqrt(self.dot(self))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Step toward `target` by at most `max_step`, never overshooting.
    #[must_use]
    pub fn move_towards(self, target: Self, max_step: Fixed) -> Self {
        let offset = target - self;
        let dist = offset.length();
        if dist <= max_step || dist == Fixed::ZERO {
            return target;
        }
        self + offset.scale(max_step / dist)
    }

    /// Clamp both coordinates into the rectangle `[min, max]`.
    #[must_use]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y))
    }
}

/// Square root of a fixed-point number using binary search.
///
/// Deterministic on every platform; negative inputs yield zero.
#[must_use]
pub fn sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..64 {
        let mid = low + (high - low) / 2;
        if mid == low {
            break;
        }
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance_of_pythagorean_triple() {
        let a = Vec2Fixed::from_ints(0, 0);
        let b = Vec2Fixed::from_ints(6, 8);
        let dist = a.distance(b);
        let epsilon = ratio(1, 10_000);
        assert!((dist - Fixed::from_num(10)).abs() < epsilon, "got {dist}");
    }

    #[test]
    fn test_within_is_inclusive() {
        let a = Vec2Fixed::from_ints(0, 0);
        let b = Vec2Fixed::from_ints(3, 4);
        assert!(a.within(b, Fixed::from_num(5)));
        assert!(!a.within(b, ratio(49, 10)));
    }

    #[test]
    fn test_sqrt_small_and_large() {
        let epsilon = ratio(1, 10_000);
        assert!((sqrt(ratio(1, 4)) - ratio(1, 2)).abs() < epsilon);
        assert!((sqrt(Fixed::from_num(1_000_000)) - Fixed::from_num(1000)).abs() < epsilon);
        assert_eq!(sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_move_towards_does_not_overshoot() {
        let start = Vec2Fixed::from_ints(0, 0);
        let target = Vec2Fixed::from_ints(10, 0);

        let step = start.move_towards(target, Fixed::from_num(4));
        assert!((step.x - Fixed::from_num(4)).abs() < ratio(1, 1000));
        assert_eq!(step.y, Fixed::ZERO);

        let arrived = start.move_towards(target, Fixed::from_num(25));
        assert_eq!(arrived, target);
    }

    #[test]
    fn test_clamp_to_rectangle() {
        let p = Vec2Fixed::from_ints(-5, 50);
        let clamped = p.clamp(Vec2Fixed::ZERO, Vec2Fixed::from_ints(40, 40));
        assert_eq!(clamped, Vec2Fixed::from_ints(0, 40));
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::from_ints(3, 4);
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let epsilon = ratio(1, 10_000);
        assert!(
            (len_sq - Fixed::ONE).abs() < epsilon,
            "normalized vector length² should be ~1, got {len_sq:?}"
        );

        // norm.x * 4 should equal norm.y * 3
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon, "direction not preserved: {ratio_diff:?}");
    }

    #[test]
    fn test_fixed_str_serde_roundtrip_through_ron() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Wrapper {
            #[serde(with = "fixed_str_serde")]
            value: Fixed,
        }

        let parsed: Wrapper = ron::from_str(r#"(value: "0.3")"#).unwrap();
        assert_eq!(parsed.value, "0.3".parse::<Fixed>().unwrap());

        let text = ron::to_string(&parsed).unwrap();
        let back: Wrapper = ron::from_str(&text).unwrap();
        assert_eq!(back, parsed);
    }

    #[test]
    fn test_fixed_str_serde_rejects_garbage() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrapper {
            #[serde(with = "fixed_str_serde")]
            value: Fixed,
        }

        assert!(ron::from_str::<Wrapper>(r#"(value: "fast")"#).is_err());
    }
}
