//! Typed angles

use serde::{Deserialize, Serialize};

/// An angle in radians
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Radian(pub f32);

/// An angle in degrees
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Degree(pub f32);

impl Radian {
    #[inline]
    pub fn value(self) -> f32 {
        self.0
    }

    #[inline]
    pub fn to_degrees(self) -> Degree {
        Degree(self.0.to_degrees())
    }
}

impl Degree {
    #[inline]
    pub fn value(self) -> f32 {
        self.0
    }

    #[inline]
    pub fn to_radians(self) -> Radian {
        Radian(self.0.to_radians())
    }
}

impl From<Degree> for Radian {
    fn from(d: Degree) -> Self {
        d.to_radians()
    }
}

impl From<Radian> for Degree {
    fn from(r: Radian) -> Self {
        r.to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        let r: Radian = Degree(180.0).into();
        assert!((r.value() - std::f32::consts::PI).abs() < 0.0001);
        let d: Degree = Radian(std::f32::consts::FRAC_PI_2).into();
        assert!((d.value() - 90.0).abs() < 0.001);
    }
}
