// ==============================================================================
// tire.rs — COMBINED-SLIP TIRE FORCE LAW (FORCE DOMAIN)
// ==============================================================================
// Inputs (per axle):
// - target_speed: commanded rolling speed along the wheel axis (m/s)
// - ux: actual travel speed along the wheel axis (m/s)
// - slip_angle: rad
// - normal_load: Fz (N)
//
// Model steps:
// 1) slip ratio K = (target - ux) / |ux|, with pure rolling checked first and a
//    stationary tire saturating straight to ±mu*Fz
// 2) fold slip angle into [-π/2, π/2] (a tire never sees more than 90° slip)
// 3) combined slip gamma from both stiffnesses
// 4) one saturating friction curve F(gamma), knee at 3*mu*Fz
// 5) split F back into Fx / Fy in proportion to each slip contribution
//
// Output:
// - TireForce { fx, fy, saturated }
// ==============================================================================

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::drift_core::angle::{ZeroPolicy, sign};
use crate::drift_core::types::VehicleParameters;

/// Shape of the friction curve past the knee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaturationCurve {
    /// Brush cubic up to mu*Fz, then a smooth fall toward mu_s*Fz.
    Asymptotic { blend_width: f64 },
    /// Cubic reaching mu_s*Fz at the knee, flat after it.
    Plateau,
}

impl Default for SaturationCurve {
    fn default() -> Self {
        SaturationCurve::Asymptotic { blend_width: 27.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TireForce {
    pub fx: f64,
    pub fy: f64,
    /// Combined slip is past the knee (tire is sliding).
    pub saturated: bool,
}

impl TireForce {
    const ZERO: TireForce = TireForce { fx: 0.0, fy: 0.0, saturated: false };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TireForceModel {
    pub c_x: f64,
    pub c_a: f64,
    pub mu: f64,
    pub mu_s: f64,
    pub curve: SaturationCurve,
    pub zero: ZeroPolicy,
}

impl TireForceModel {
    pub fn new(params: &VehicleParameters, curve: SaturationCurve, zero: ZeroPolicy) -> Self {
        Self {
            c_x: params.c_x,
            c_a: params.c_a,
            mu: params.mu,
            mu_s: params.mu_s,
            curve,
            zero,
        }
    }

    pub fn force(&self, target_speed: f64, ux: f64, slip_angle: f64, normal_load: f64) -> TireForce {
        if !normal_load.is_finite() || normal_load <= 0.0 {
            return TireForce::ZERO;
        }
        let fz = normal_load;

        let mut k = if self.zero.same(target_speed, ux) {
            0.0
        } else if self.zero.is_zero(ux) {
            // stationary: whole budget goes longitudinal
            return TireForce {
                fx: sign(target_speed) * self.mu * fz,
                fy: 0.0,
                saturated: true,
            };
        } else {
            (target_speed - ux) / ux.abs()
        };

        let rev = sign(k);
        k = k.abs();

        let mut alpha = slip_angle;
        if alpha.abs() > FRAC_PI_2 {
            alpha = (std::f64::consts::PI - alpha.abs()) * sign(alpha);
        }

        let long_slip = k / (1.0 + k);
        let lat_slip = alpha.tan() / (1.0 + k);
        let gamma = (self.c_x * long_slip).hypot(self.c_a * lat_slip);

        if self.zero.is_zero(gamma) {
            return TireForce::ZERO;
        }

        let f = self.saturation(gamma, fz);

        TireForce {
            fx: self.c_x / gamma * long_slip * f * rev,
            fy: -self.c_a / gamma * lat_slip * f,
            saturated: gamma > self.knee(fz),
        }
    }

    #[inline]
    pub fn knee(&self, fz: f64) -> f64 {
        3.0 * self.mu * fz
    }

    /// Friction magnitude for a combined slip `gamma` (> 0) under load `fz` (> 0).
    pub fn saturation(&self, gamma: f64, fz: f64) -> f64 {
        let mu = self.mu;
        let knee = self.knee(fz);

        match self.curve {
            SaturationCurve::Asymptotic { blend_width } => {
                if gamma <= knee {
                    gamma - gamma.powi(2) / (3.0 * mu * fz)
                        + gamma.powi(3) / (27.0 * mu.powi(2) * fz.powi(2))
                } else {
                    let u = (gamma - knee) / blend_width;
                    fz * (self.mu_s + (mu - self.mu_s) / (1.0 + u * u))
                }
            }
            SaturationCurve::Plateau => {
                let ratio = self.mu_s / mu;
                if gamma <= knee {
                    gamma - (2.0 - ratio) * gamma.powi(2) / (3.0 * mu * fz)
                        + (1.0 - 2.0 / 3.0 * ratio) * gamma.powi(3) / (9.0 * mu.powi(2) * fz.powi(2))
                } else {
                    self.mu_s * fz
                }
            }
        }
    }
}
