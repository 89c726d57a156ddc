// ==============================================================================
// control.rs — STICKS → DRIVE COMMAND (ENGINE / COAST BLEND)
// ==============================================================================
// Per frame:
// 1) throttle stick vertical velocity is integrated into an engine speed rpm_t,
//    clamped to [rpm_min, rpm_max]
// 2) engine power at rpm_t divided by the last rear drive force gives a target
//    rolling speed for the rear tire (P / F = v)
// 3) stick at rest → coasting: the target tracks Ux toward zero at a fixed
//    deceleration instead (the P / F division is useless near zero speed).
//    Near rest the slip it asks for is capped so the linear rear force can at
//    most cancel Ux in one step; the cubic never exceeds its linear part, so
//    Ux settles from one side instead of overshooting through zero.
// 4) after the dynamics step rpm_t decays toward zero, never crossing it
//
// Steering is a plain gain on the steer stick's horizontal velocity.
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::drift_core::angle::ZeroPolicy;
use crate::drift_core::engine::EngineCurve;
use crate::drift_core::types::{
    ControlSample, DriveCommand, EngineState, ParamError, VehicleParameters, VehicleState, finite,
    non_negative, positive,
};

/// What the throttle stick means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThrottleMode {
    /// Stick revs the engine; power curve sets the rear target speed.
    #[default]
    EnginePower,
    /// Stick velocity scaled straight into a rear target speed (m/s).
    DirectSpeed { forward_gain: f64, reverse_gain: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub steer_gain: f64,      // rad per unit stick
    pub rpm_gain: f64,        // rpm per unit stick per frame
    pub rpm_min: f64,
    pub rpm_max: f64,
    pub rpm_decay: f64,       // rpm per frame
    pub coast_threshold: f64, // |stick| at or below → coasting
    pub coast_decel: f64,     // m/s²
    pub throttle_mode: ThrottleMode,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            steer_gain: 0.6,
            rpm_gain: 400.0,
            rpm_min: -1000.0,
            rpm_max: 8000.0,
            rpm_decay: 50.0,
            coast_threshold: 0.05,
            coast_decel: 2.0,
            throttle_mode: ThrottleMode::EnginePower,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        finite("steer_gain", self.steer_gain)?;
        finite("rpm_gain", self.rpm_gain)?;
        finite("rpm_min", self.rpm_min)?;
        finite("rpm_max", self.rpm_max)?;
        if !(self.rpm_min <= 0.0 && self.rpm_max >= 0.0) {
            return Err(ParamError::RpmRange { min: self.rpm_min, max: self.rpm_max });
        }
        non_negative("rpm_decay", self.rpm_decay)?;
        non_negative("coast_threshold", self.coast_threshold)?;
        non_negative("coast_decel", self.coast_decel)?;
        if let ThrottleMode::DirectSpeed { forward_gain, reverse_gain } = self.throttle_mode {
            positive("forward_gain", forward_gain)?;
            positive("reverse_gain", reverse_gain)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ControlMapper {
    config: ControlConfig,
    engine: EngineCurve,
    zero: ZeroPolicy,
    state: EngineState,
}

impl ControlMapper {
    pub fn new(config: ControlConfig, engine: EngineCurve, zero: ZeroPolicy) -> Self {
        Self { config, engine, zero, state: EngineState::default() }
    }

    pub fn engine_state(&self) -> EngineState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = EngineState::default();
    }

    #[inline]
    pub fn steer_angle(&self, sample: &ControlSample) -> f64 {
        -sample.steer.x * self.config.steer_gain
    }

    /// Steps 1-3: rev the engine and pick this frame's rear target speed.
    pub fn map(
        &mut self,
        sample: &ControlSample,
        vehicle: &VehicleState,
        params: &VehicleParameters,
        dt: f64,
    ) -> DriveCommand {
        let cfg = &self.config;
        let raw = sample.throttle.y;

        self.state.rpm = (self.state.rpm + raw * cfg.rpm_gain).clamp(cfg.rpm_min, cfg.rpm_max);

        let throttle = match cfg.throttle_mode {
            ThrottleMode::DirectSpeed { forward_gain, reverse_gain } => {
                if raw > 0.0 { raw * forward_gain } else { raw * reverse_gain }
            }
            ThrottleMode::EnginePower => {
                if raw.abs() <= cfg.coast_threshold {
                    self.coast_target(vehicle.ux, params, dt)
                } else {
                    let rear = if self.zero.is_zero(vehicle.fx_rear) {
                        params.g_r * params.mu
                    } else {
                        vehicle.fx_rear
                    };
                    self.engine.power_at(self.state.rpm) / rear.abs()
                }
            }
        };

        DriveCommand { throttle, steer: self.steer_angle(sample) }
    }

    /// Rear target that slows `ux` toward zero, never past it.
    fn coast_target(&self, ux: f64, params: &VehicleParameters, dt: f64) -> f64 {
        if self.zero.is_zero(ux) {
            return ux;
        }
        let speed = ux.abs();
        let mut k = (self.config.coast_decel * dt / speed).min(1.0);

        // slip fraction whose linear force stops the car in exactly dt
        let stop = params.m * speed / (dt * params.c_x);
        if stop < 1.0 && k / (1.0 + k) > stop {
            k = stop / (1.0 - stop);
        }
        ux * (1.0 - k)
    }

    /// Step 4: engine friction, applied once the frame's dynamics are done.
    pub fn decay(&mut self) {
        let rpm = self.state.rpm;
        let step = self.config.rpm_decay;
        self.state.rpm = if rpm > 0.0 { (rpm - step).max(0.0) } else { (rpm + step).min(0.0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift_core::types::{Stick, VehicleSpec};

    fn params() -> VehicleParameters {
        VehicleParameters::new(&VehicleSpec::default()).unwrap()
    }

    fn mapper() -> ControlMapper {
        ControlMapper::new(ControlConfig::default(), EngineCurve::default(), ZeroPolicy::default())
    }

    fn throttle(y: f64) -> ControlSample {
        ControlSample::new(Stick::default(), Stick::new(0.0, y))
    }

    #[test]
    fn rpm_accumulates_and_clamps() {
        let p = params();
        let mut m = mapper();
        let at_rest = VehicleState::default();

        m.map(&throttle(1.0), &at_rest, &p, 0.016);
        assert_eq!(m.engine_state().rpm, 400.0);

        for _ in 0..100 {
            m.map(&throttle(1.0), &at_rest, &p, 0.016);
        }
        assert_eq!(m.engine_state().rpm, 8000.0);

        for _ in 0..100 {
            m.map(&throttle(-1.0), &at_rest, &p, 0.016);
        }
        assert_eq!(m.engine_state().rpm, -1000.0);
    }

    #[test]
    fn falls_back_to_static_rear_load_when_last_force_is_zero() {
        let p = params();
        let mut m = mapper();
        let cmd = m.map(&throttle(1.0), &VehicleState::default(), &p, 0.016);
        let expected = EngineCurve::default().power_at(400.0) / (p.g_r * p.mu);
        assert_eq!(cmd.throttle, expected);
        assert!(cmd.throttle.is_finite() && cmd.throttle > 0.0);
    }

    #[test]
    fn uses_magnitude_of_last_rear_force() {
        let p = params();
        let mut m = mapper();
        let braking = VehicleState { ux: 10.0, fx_rear: -2500.0, ..VehicleState::default() };
        let cmd = m.map(&throttle(0.5), &braking, &p, 0.016);
        assert_eq!(cmd.throttle, EngineCurve::default().power_at(200.0) / 2500.0);
    }

    #[test]
    fn coasting_overrides_engine_power() {
        let p = params();
        let mut m = mapper();
        let rolling = VehicleState { ux: 10.0, fx_rear: 800.0, ..VehicleState::default() };

        // revved engine, then the stick is released
        for _ in 0..10 {
            m.map(&throttle(1.0), &rolling, &p, 0.016);
        }
        let cmd = m.map(&throttle(0.01), &rolling, &p, 0.5);
        assert_eq!(cmd.throttle, 9.0);

        let stopped = VehicleState::default();
        assert_eq!(m.map(&throttle(0.0), &stopped, &p, 0.5).throttle, 0.0);
    }

    #[test]
    fn coasting_near_rest_never_asks_past_zero() {
        let p = params();
        let mut m = mapper();
        let dt = 1.0 / 60.0;

        for ux in [-0.4, -0.03, -1e-4, 1e-4, 0.03, 0.4] {
            let s = VehicleState { ux, ..VehicleState::default() };
            let target = m.map(&throttle(0.0), &s, &p, dt).throttle;

            // same side of zero, closer to it
            assert!(target * ux > 0.0, "ux {ux} -> {target}");
            assert!(target.abs() < ux.abs());

            // linear rear force at most cancels ux this frame
            let k = (target - ux).abs() / ux.abs();
            let linear = p.c_x * k / (1.0 + k);
            assert!(linear * dt / p.m <= ux.abs() * (1.0 + 1e-9), "ux {ux}: {linear}");
        }
    }

    #[test]
    fn direct_speed_mode_uses_asymmetric_gains() {
        let p = params();
        let cfg = ControlConfig {
            throttle_mode: ThrottleMode::DirectSpeed { forward_gain: 30.0, reverse_gain: 10.0 },
            ..ControlConfig::default()
        };
        let mut m = ControlMapper::new(cfg, EngineCurve::default(), ZeroPolicy::default());
        let s = VehicleState::default();
        assert_eq!(m.map(&throttle(0.5), &s, &p, 0.016).throttle, 15.0);
        assert_eq!(m.map(&throttle(-0.5), &s, &p, 0.016).throttle, -5.0);
        assert_eq!(m.map(&throttle(0.0), &s, &p, 0.016).throttle, 0.0);
    }

    #[test]
    fn steering_inverts_horizontal_stick() {
        let m = mapper();
        let s = ControlSample::new(Stick::new(0.5, 0.9), Stick::default());
        assert_eq!(m.steer_angle(&s), -0.3);
    }

    #[test]
    fn decay_stops_at_zero_from_either_side() {
        let p = params();
        let mut m = mapper();
        let s = VehicleState::default();

        m.map(&throttle(0.1), &s, &p, 0.016); // 40 rpm
        m.decay();
        assert_eq!(m.engine_state().rpm, 0.0);
        m.decay();
        assert_eq!(m.engine_state().rpm, 0.0);

        m.map(&throttle(-0.2), &s, &p, 0.016); // -80 rpm
        m.decay();
        assert_eq!(m.engine_state().rpm, -30.0);
        m.decay();
        assert_eq!(m.engine_state().rpm, 0.0);
    }

    #[test]
    fn validation_rejects_bad_ranges() {
        let bad = ControlConfig { rpm_min: 10.0, ..ControlConfig::default() };
        assert!(bad.validate().is_err());
        let bad = ControlConfig { coast_decel: -1.0, ..ControlConfig::default() };
        assert!(bad.validate().is_err());
        let bad = ControlConfig {
            throttle_mode: ThrottleMode::DirectSpeed { forward_gain: 0.0, reverse_gain: 10.0 },
            ..ControlConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(ControlConfig::default().validate().is_ok());
    }
}
