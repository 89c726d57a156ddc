// ==============================================================================
// engine.rs — ENGINE POWER CURVE
// ------------------------------------------------------------------------------
// Three samples (0, p0), (rpm1, p1), (rpm2, p2) joined by the quadratic through
// all of them (Lagrange form). Negative rpm mirrors the curve:
//     power_at(-rpm) = -power_at(rpm)
// Each basis polynomial is written with the same operation order in numerator
// and denominator so the breakpoints come back bit-exact.
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::drift_core::types::{ParamError, finite};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineCurve {
    pub rpm: [f64; 2],   // [rpm1, rpm2]
    pub power: [f64; 3], // W at [0, rpm1, rpm2]
}

impl Default for EngineCurve {
    fn default() -> Self {
        Self {
            rpm: [3000.0, 6500.0],
            power: [0.0, 90_000.0, 150_000.0],
        }
    }
}

impl EngineCurve {
    pub fn new(rpm: [f64; 2], power: [f64; 3]) -> Result<Self, ParamError> {
        let curve = Self { rpm, power };
        curve.validate()?;
        Ok(curve)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        let [rpm1, rpm2] = self.rpm;
        finite("rpm1", rpm1)?;
        finite("rpm2", rpm2)?;
        if !(rpm1 > 0.0 && rpm1 < rpm2) {
            return Err(ParamError::RpmOrder { rpm1, rpm2 });
        }
        finite("p0", self.power[0])?;
        finite("p1", self.power[1])?;
        finite("p2", self.power[2])?;
        Ok(())
    }

    pub fn power_at(&self, rpm: f64) -> f64 {
        if rpm < 0.0 {
            return -self.power_at(-rpm);
        }

        let [r1, r2] = self.rpm;
        let [p0, p1, p2] = self.power;
        let x = rpm;

        let l0 = ((x - r1) * (x - r2)) / ((-r1) * (-r2));
        let l1 = (x * (x - r2)) / (r1 * (r1 - r2));
        let l2 = (x * (x - r1)) / (r2 * (r2 - r1));

        p0 * l0 + p1 * l1 + p2 * l2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn passes_through_breakpoints_exactly() {
        let curves = [
            EngineCurve::default(),
            EngineCurve::new([1234.5, 7000.25], [12.0, 45_678.9, 99_999.1]).unwrap(),
            EngineCurve::new([0.5, 3.0], [-3.0, 7.0, 1.0]).unwrap(),
        ];
        for c in curves {
            assert_eq!(c.power_at(0.0), c.power[0]);
            assert_eq!(c.power_at(c.rpm[0]), c.power[1]);
            assert_eq!(c.power_at(c.rpm[1]), c.power[2]);
        }
    }

    #[test]
    fn odd_symmetry() {
        let c = EngineCurve::new([2500.0, 6000.0], [1_000.0, 80_000.0, 120_000.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5_000 {
            let r: f64 = rng.gen_range(1e-6..9000.0);
            assert_eq!(c.power_at(-r), -c.power_at(r));
        }
    }

    #[test]
    fn default_curve_is_zero_and_smooth_through_idle() {
        let c = EngineCurve::default();
        assert_eq!(c.power_at(0.0), 0.0);
        assert_eq!(c.power_at(-0.0), 0.0);

        // one-sided slopes match at 0 because p0 = 0 mirrors onto itself
        let h = 1e-3;
        let right = (c.power_at(h) - c.power_at(0.0)) / h;
        let left = (c.power_at(0.0) - c.power_at(-h)) / h;
        assert!((right - left).abs() / right.abs() < 1e-3);
    }

    #[test]
    fn rejects_unordered_breakpoints() {
        assert_eq!(
            EngineCurve::new([6000.0, 6000.0], [0.0, 1.0, 2.0]),
            Err(ParamError::RpmOrder { rpm1: 6000.0, rpm2: 6000.0 })
        );
        assert!(EngineCurve::new([0.0, 100.0], [0.0, 1.0, 2.0]).is_err());
        assert!(EngineCurve::new([7000.0, 3000.0], [0.0, 1.0, 2.0]).is_err());
        assert!(EngineCurve::new([1000.0, 3000.0], [0.0, f64::NAN, 2.0]).is_err());
    }
}
