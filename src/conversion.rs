//! Percent to physical parameter mappings.
//!
//! Every engine family describes each of its parameters with one [`Curve`];
//! the voice layer only ever talks in percent and converts at the engine
//! boundary.
use serde::{Deserialize, Serialize};
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Curve {
  /// `percent = physical * scale + offset`, inverse uses floor division.
  LinearOffset { scale: i32, offset: i32 },
  /// Percent spread evenly over `[min, max]`.
  LinearRange { min: i32, max: i32 },
  /// `percent = 50 + k * log2(physical / base)`, where `k` is `factor_high`
  /// at or above the base and `factor_low` below it.
  Logarithmic {
    base: f64,
    factor_low: f64,
    factor_high: f64,
  },
}
impl Curve {
  pub const SAPI_SCALE: Curve = Curve::LinearOffset {
    scale: 5,
    offset: 50,
  };
  pub const PERCENT: Curve = Curve::LinearRange { min: 0, max: 100 };
  pub const VOCALIZER_RATE: Curve = Curve::Logarithmic {
    base: 100.0,
    factor_low: 50.0,
    factor_high: 25.0,
  };
  pub const VOCALIZER_PITCH: Curve = Curve::Logarithmic {
    base: 100.0,
    factor_low: 50.0,
    factor_high: 50.0,
  };
  pub const RATE_BOOST: Curve = Curve::LinearRange { min: 50, max: 600 };
  pub fn to_physical(self, percent: u8) -> i32 {
    let percent = i32::from(percent.min(100));
    match self {
      Curve::LinearOffset { scale, offset } => (percent - offset).div_euclid(scale),
      Curve::LinearRange { min, max } => {
        let value = f64::from(min) + f64::from(max - min) * f64::from(percent) / 100.0;
        value.round() as i32
      }
      Curve::Logarithmic {
        base,
        factor_low,
        factor_high,
      } => {
        let factor = if percent >= 50 { factor_high } else { factor_low };
        let value = base * 2.0_f64.powf(f64::from(percent - 50) / factor);
        value.round() as i32
      }
    }
  }
  pub fn to_percent(self, physical: i32) -> u8 {
    let percent = match self {
      Curve::LinearOffset { scale, offset } => physical * scale + offset,
      Curve::LinearRange { min, max } => {
        if max == min {
          0
        } else {
          let value = f64::from(physical - min) * 100.0 / f64::from(max - min);
          value.round() as i32
        }
      }
      Curve::Logarithmic {
        base,
        factor_low,
        factor_high,
      } => {
        if physical <= 0 {
          0
        } else {
          let ratio = f64::from(physical) / base;
          let factor = if ratio >= 1.0 { factor_high } else { factor_low };
          (50.0 + factor * ratio.log2()).round() as i32
        }
      }
    };
    u8::try_from(percent.clamp(0, 100)).unwrap_or(100)
  }
}
