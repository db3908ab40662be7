//! Unit newtypes and per-unit base quantities.
//!
//! Element records keep raw `f64` columns named after their unit (`vn_kv`,
//! `p_mw`); these wrappers are used where values cross into per-unit
//! arithmetic, so a kV value is never handed to code expecting p.u. and
//! degrees never end up in a trigonometric call.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }
        }
    };
}

/// Line-to-line voltage in kV.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);
impl_unit_ops!(Kilovolts, "kV");

/// Apparent power in MVA.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);
impl_unit_ops!(MegavoltAmperes, "MVA");

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);
impl_unit_ops!(Degrees, "deg");

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);
impl_unit_ops!(Radians, "rad");

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }
}

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }
}

/// Per-unit base at one voltage level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseValues {
    pub s_base: MegavoltAmperes,
    pub v_base: Kilovolts,
}

impl BaseValues {
    pub fn new(s_base: MegavoltAmperes, v_base: Kilovolts) -> Self {
        Self { s_base, v_base }
    }

    /// Base impedance in ohm.
    pub fn z_base_ohm(&self) -> f64 {
        self.v_base.0 * self.v_base.0 / self.s_base.0
    }

    /// Base current in kA (three-phase).
    pub fn i_base_ka(&self) -> f64 {
        self.s_base.0 / (3f64.sqrt() * self.v_base.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_conversion() {
        let deg = Degrees(180.0);
        assert!((deg.to_radians().value() - std::f64::consts::PI).abs() < 1e-12);
        assert!((Radians(std::f64::consts::FRAC_PI_2).to_degrees().value() - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_base_values() {
        let base = BaseValues::new(MegavoltAmperes(1.0), Kilovolts(20.0));
        assert!((base.z_base_ohm() - 400.0).abs() < 1e-12);
        assert!((base.i_base_ka() - 1.0 / (3f64.sqrt() * 20.0)).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Kilovolts(0.4)), "0.4000 kV");
    }
}
