//! Core shared types for `drift_core` (engine-agnostic).
// drift_core/types.rs
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

pub const GRAVITY: f64 = 9.81; // m/s²

// ============================================
// ----- configuration errors -----------------
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    NotPositive { field: &'static str, value: f64 },
    NotFinite { field: &'static str, value: f64 },
    AxleOutsideWheelbase { a: f64, wheelbase: f64 },
    FrictionOrder { mu: f64, mu_s: f64 },
    RpmOrder { rpm1: f64, rpm2: f64 },
    RpmRange { min: f64, max: f64 },
    Negative { field: &'static str, value: f64 },
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{field} must be finite and > 0 (got {value})")
            }
            Self::NotFinite { field, value } => write!(f, "{field} must be finite (got {value})"),
            Self::AxleOutsideWheelbase { a, wheelbase } => write!(
                f,
                "front axle distance a = {a} must lie strictly inside the wheelbase L = {wheelbase}"
            ),
            Self::FrictionOrder { mu, mu_s } => write!(
                f,
                "sliding friction mu_s = {mu_s} must not exceed peak friction mu = {mu}"
            ),
            Self::RpmOrder { rpm1, rpm2 } => {
                write!(f, "rpm breakpoints must satisfy 0 < rpm1 < rpm2 (got {rpm1}, {rpm2})")
            }
            Self::RpmRange { min, max } => {
                write!(f, "rpm range must satisfy min <= 0 <= max (got [{min}, {max}])")
            }
            Self::Negative { field, value } => {
                write!(f, "{field} must be finite and >= 0 (got {value})")
            }
        }
    }
}

impl std::error::Error for ParamError {}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ParamError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ParamError::Negative { field, value })
    }
}

pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64, ParamError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParamError::NotFinite { field, value })
    }
}

// ============================================
// ----- vehicle configuration ----------------
// ============================================

/// Raw vehicle description as it appears in a config file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSpec {
    pub mass: f64,           // kg
    pub wheelbase: f64,      // m (L)
    pub front_axle: f64,     // m, COM to front axle (a)
    pub lateral_stiffness: f64,      // N/rad (C_a)
    pub longitudinal_stiffness: f64, // N (C_x)
    pub yaw_inertia: f64,    // kg·m² (I_z)
    pub mu: f64,             // peak friction
    pub mu_s: f64,           // sliding friction
    /// Front-to-rear wheel distance of the rendered car, in world units.
    pub render_wheel_span: f64,
}

impl Default for VehicleSpec {
    fn default() -> Self {
        Self {
            mass: 2010.0,
            wheelbase: 2.45,
            front_axle: 1.47,
            lateral_stiffness: 1.2e6,
            longitudinal_stiffness: 2.0e5,
            yaw_inertia: 3994.0,
            mu: 0.75,
            mu_s: 0.6,
            render_wheel_span: 196.0,
        }
    }
}

/// Validated, immutable vehicle parameters for the bicycle model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleParameters {
    pub m: f64,
    pub l: f64,
    pub a: f64,
    pub b: f64,
    pub g_f: f64, // N, static front load
    pub g_r: f64, // N, static rear load
    pub c_a: f64,
    pub c_x: f64,
    pub i_z: f64,
    pub mu: f64,
    pub mu_s: f64,
    pub scale_factor: f64, // world units per metre
}

impl VehicleParameters {
    pub fn new(spec: &VehicleSpec) -> Result<Self, ParamError> {
        let m = positive("mass", spec.mass)?;
        let l = positive("wheelbase", spec.wheelbase)?;
        let a = positive("front_axle", spec.front_axle)?;
        if a >= l {
            return Err(ParamError::AxleOutsideWheelbase { a, wheelbase: l });
        }
        let c_a = positive("lateral_stiffness", spec.lateral_stiffness)?;
        let c_x = positive("longitudinal_stiffness", spec.longitudinal_stiffness)?;
        let i_z = positive("yaw_inertia", spec.yaw_inertia)?;
        let mu = positive("mu", spec.mu)?;
        let mu_s = positive("mu_s", spec.mu_s)?;
        if mu_s > mu {
            return Err(ParamError::FrictionOrder { mu, mu_s });
        }
        let span = positive("render_wheel_span", spec.render_wheel_span)?;

        let b = l - a;
        Ok(Self {
            m,
            l,
            a,
            b,
            g_r: m * GRAVITY * a / l,
            g_f: m * GRAVITY * b / l,
            c_a,
            c_x,
            i_z,
            mu,
            mu_s,
            scale_factor: span / l,
        })
    }
}

// ============================================
// ----- per-frame state ----------------------
// ============================================

/// `[x, y, phi, Ux, Uy, r, Fx_rear]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VehicleState {
    pub x: f64,       // world units
    pub y: f64,       // world units
    pub phi: f64,     // rad, world heading
    pub ux: f64,      // m/s, body longitudinal
    pub uy: f64,      // m/s, body lateral
    pub r: f64,       // rad/s, yaw rate
    pub fx_rear: f64, // N, last rear drive force
}

impl VehicleState {
    pub fn as_vector(&self) -> SVector<f64, 7> {
        SVector::<f64, 7>::from([
            self.x, self.y, self.phi, self.ux, self.uy, self.r, self.fx_rear,
        ])
    }

    pub fn is_finite(&self) -> bool {
        self.as_vector().iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EngineState {
    pub rpm: f64,
}

// ============================================
// ----- controls -----------------------------
// ============================================

/// One 2-D stick reading (device velocity), nominally in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stick {
    pub x: f64,
    pub y: f64,
}

impl Stick {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Raw input sampled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlSample {
    pub steer: Stick,
    pub throttle: Stick,
}

impl ControlSample {
    pub fn new(steer: Stick, throttle: Stick) -> Self {
        Self { steer, throttle }
    }

    /// Non-finite stick components read as released (0).
    pub fn sanitized(self) -> Self {
        let clean = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            steer: Stick::new(clean(self.steer.x), clean(self.steer.y)),
            throttle: Stick::new(clean(self.throttle.x), clean(self.throttle.y)),
        }
    }
}

/// What the integrator is driven with for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriveCommand {
    /// Target rolling speed for the rear tire (m/s).
    pub throttle: f64,
    /// Front wheel angle (rad).
    pub steer: f64,
}
