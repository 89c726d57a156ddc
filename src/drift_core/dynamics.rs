// ==============================================================================
// dynamics.rs — PLANAR BICYCLE MODEL + EXPLICIT EULER STEP
// ==============================================================================
// State: [x, y, phi, Ux, Uy, r, Fx_rear]
//
// One step:
// 1) front / rear slip angles from (Ux, Uy, r) and the steer angle δ
// 2) tire forces: front axle is never driven (target = Ux), rear axle tracks the
//    drive command's target speed
// 3) accelerations
//      dr  = (a·FyF·cos δ − b·FyR) / I_z
//      dUx = (FxR − FyF·sin δ) / m + r·Uy
//      dUy = (FyF·cos δ + FyR) / m − r·Ux
// 4) body slip angle β, velocity rotated by (β + phi) into world axes
// 5) explicit Euler on pose and velocities (pose uses the pre-step velocity)
//
// No sub-stepping. dt is whatever the host clock handed us; the context clamps
// it before it gets here.
// ==============================================================================

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Rotation2, Vector2};
use serde::Serialize;

use crate::drift_core::angle::{ZeroPolicy, sign, wrap_to_pi};
use crate::drift_core::tire::{TireForce, TireForceModel};
use crate::drift_core::types::{DriveCommand, VehicleParameters, VehicleState};

/// Per-step diagnostics (debug overlay / effects).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StepTelemetry {
    pub alpha_front: f64,
    pub alpha_rear: f64,
    pub beta: f64,
    pub front: TireForce,
    pub rear: TireForce,
    pub d_ux: f64,
    pub d_uy: f64,
    pub d_r: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub state: VehicleState,
    pub telemetry: StepTelemetry,
}

#[derive(Debug, Clone, Copy)]
pub struct DynamicsIntegrator {
    pub params: VehicleParameters,
    pub tire: TireForceModel,
    pub zero: ZeroPolicy,
}

impl DynamicsIntegrator {
    pub fn new(params: VehicleParameters, tire: TireForceModel) -> Self {
        Self { params, tire, zero: tire.zero }
    }

    /// (alpha_front, alpha_rear), both wrapped to (-π, π].
    pub fn slip_angles(&self, ux: f64, uy: f64, r: f64, steer: f64) -> (f64, f64) {
        let VehicleParameters { a, b, .. } = self.params;

        let (front, rear) = if self.zero.is_zero(ux) && self.zero.is_zero(uy) {
            (0.0, 0.0)
        } else if self.zero.is_zero(ux) {
            (FRAC_PI_2 * sign(uy) - steer, FRAC_PI_2 * sign(uy))
        } else if ux < 0.0 {
            (
                sign(uy) * PI - ((uy + a * r) / ux.abs()).atan() - steer,
                sign(uy) * PI - ((uy - b * r) / ux.abs()).atan(),
            )
        } else {
            (
                ((uy + a * r) / ux.abs()).atan() - steer,
                ((uy - b * r) / ux.abs()).atan(),
            )
        };

        (wrap_to_pi(front), wrap_to_pi(rear))
    }

    /// Angle between the body x-axis and the velocity vector, in (-π, π].
    pub fn body_slip(&self, ux: f64, uy: f64) -> f64 {
        let beta = if self.zero.is_zero(ux) && self.zero.is_zero(uy) {
            0.0
        } else if self.zero.is_zero(ux) {
            FRAC_PI_2 * sign(uy)
        } else if ux < 0.0 {
            // pure reverse (uy = 0) lands on +π through sign(0) = +1
            sign(uy) * PI - (uy / ux.abs()).atan()
        } else {
            (uy / ux.abs()).atan()
        };
        wrap_to_pi(beta)
    }

    pub fn step(&self, state: &VehicleState, cmd: DriveCommand, dt: f64) -> StepResult {
        let p = &self.params;
        let VehicleState { x, y, phi, ux, uy, r, .. } = *state;
        let delta = cmd.steer;

        let (alpha_front, alpha_rear) = self.slip_angles(ux, uy, r, delta);

        let front = self.tire.force(ux, ux, alpha_front, p.g_f);
        let rear = self.tire.force(cmd.throttle, ux, alpha_rear, p.g_r);

        let (sin_d, cos_d) = delta.sin_cos();
        let d_r = (p.a * front.fy * cos_d - p.b * rear.fy) / p.i_z;
        let d_ux = (rear.fx - front.fy * sin_d) / p.m + r * uy;
        let d_uy = (front.fy * cos_d + rear.fy) / p.m - r * ux;

        let beta = self.body_slip(ux, uy);
        let speed = Vector2::new(ux, uy).norm();

        // body velocity → world displacement
        let travel = Rotation2::new(beta + phi) * Vector2::new(speed, 0.0);
        let moved = travel * (dt * p.scale_factor);

        let next = VehicleState {
            x: x + moved.x,
            y: y + moved.y,
            phi: phi + r * dt,
            ux: ux + d_ux * dt,
            uy: uy + d_uy * dt,
            r: r + d_r * dt,
            fx_rear: rear.fx,
        };

        StepResult {
            state: next,
            telemetry: StepTelemetry {
                alpha_front,
                alpha_rear,
                beta,
                front,
                rear,
                d_ux,
                d_uy,
                d_r,
            },
        }
    }
}
