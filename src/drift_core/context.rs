// ==============================================================================
// context.rs — PER-VEHICLE SIMULATION CONTEXT + HOST BOUNDARY
// ==============================================================================
// SimulationContext owns everything that changes frame to frame:
// - VehicleState (replaced wholesale by the integrator)
// - EngineState (inside the ControlMapper)
// - the previous frame timestamp
//
// advance(timestamp, sample):
// - first frame only primes the clock
// - dt = timestamp - last; negative / non-finite dt rejects the frame
// - dt above max_frame_dt is clamped (app resumed from background, debugger)
// - map controls → integrate → decay rpm → finite-state guard → publish
//
// The host sees two narrow seams: ControlSource (sample once per frame) and
// StateSink (receive the published frame). Scene graphs, cameras and particle
// effects live on the other side of them.
// ==============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::drift_core::angle::ZeroPolicy;
use crate::drift_core::control::{ControlConfig, ControlMapper};
use crate::drift_core::dynamics::{DynamicsIntegrator, StepTelemetry};
use crate::drift_core::engine::EngineCurve;
use crate::drift_core::tire::{SaturationCurve, TireForceModel};
use crate::drift_core::types::{
    ControlSample, DriveCommand, EngineState, ParamError, VehicleParameters, VehicleState, positive,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub zero_policy: ZeroPolicy,
    pub saturation: SaturationCurve,
    /// Longest frame the integrator will take in one explicit step (s).
    pub max_frame_dt: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            zero_policy: ZeroPolicy::default(),
            saturation: SaturationCurve::default(),
            max_frame_dt: 0.1,
        }
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        positive("max_frame_dt", self.max_frame_dt)?;
        if let ZeroPolicy::Tolerance(eps) = self.zero_policy {
            positive("zero_policy.eps", eps)?;
        }
        if let SaturationCurve::Asymptotic { blend_width } = self.saturation {
            positive("saturation.blend_width", blend_width)?;
        }
        Ok(())
    }
}

/// Everything a context needs, validated once.
#[derive(Debug, Clone, Copy)]
pub struct SimSetup {
    pub vehicle: VehicleParameters,
    pub engine: EngineCurve,
    pub control: ControlConfig,
    pub integrator: IntegratorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NegativeDt,
    NonFiniteDt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// First timestamp seen; nothing integrated.
    Primed,
    Stepped { dt: f64, telemetry: StepTelemetry },
    Rejected(RejectReason),
    /// Integration went non-finite; motion zeroed at the last good pose.
    Reset,
}

/// What the renderer / camera gets each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Publication {
    pub frame: u64,
    pub x: f64,
    pub y: f64,
    pub phi: f64,
    pub ux: f64,
    pub fx_rear: f64,
    pub steer_angle: f64,
    pub rpm: f64,
    /// Rear tire past its friction knee (smoke / tire-trace cue).
    pub sliding: bool,
}

pub trait ControlSource {
    fn sample(&mut self) -> ControlSample;
}

pub trait StateSink {
    fn publish(&mut self, frame: &Publication);
}

impl StateSink for Option<Publication> {
    fn publish(&mut self, frame: &Publication) {
        *self = Some(*frame);
    }
}

impl StateSink for Vec<Publication> {
    fn publish(&mut self, frame: &Publication) {
        self.push(*frame);
    }
}

#[derive(Debug, Clone)]
pub struct SimulationContext {
    integrator: DynamicsIntegrator,
    mapper: ControlMapper,
    state: VehicleState,
    last_timestamp: Option<f64>,
    max_frame_dt: f64,
    frame: u64,
    last_command: DriveCommand,
    sliding: bool,
}

impl SimulationContext {
    pub fn new(setup: &SimSetup) -> Self {
        let zero = setup.integrator.zero_policy;
        let tire = TireForceModel::new(&setup.vehicle, setup.integrator.saturation, zero);
        Self {
            integrator: DynamicsIntegrator::new(setup.vehicle, tire),
            mapper: ControlMapper::new(setup.control, setup.engine, zero),
            state: VehicleState::default(),
            last_timestamp: None,
            max_frame_dt: setup.integrator.max_frame_dt,
            frame: 0,
            last_command: DriveCommand::default(),
            sliding: false,
        }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn engine(&self) -> EngineState {
        self.mapper.engine_state()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Back to the all-zero state; the clock re-primes on the next frame.
    pub fn reset(&mut self) {
        self.state = VehicleState::default();
        self.mapper.reset();
        self.last_timestamp = None;
        self.last_command = DriveCommand::default();
        self.sliding = false;
    }

    /// Advance to host time `timestamp` (seconds).
    pub fn advance(&mut self, timestamp: f64, sample: ControlSample) -> FrameOutcome {
        let Some(last) = self.last_timestamp else {
            if timestamp.is_finite() {
                self.last_timestamp = Some(timestamp);
            }
            return FrameOutcome::Primed;
        };

        let dt = timestamp - last;
        if !dt.is_finite() {
            warn!(frame = self.frame, timestamp, "rejecting frame with non-finite dt");
            self.last_timestamp = None;
            return FrameOutcome::Rejected(RejectReason::NonFiniteDt);
        }
        if dt < 0.0 {
            warn!(frame = self.frame, dt, "rejecting frame with negative dt");
            self.last_timestamp = Some(timestamp);
            return FrameOutcome::Rejected(RejectReason::NegativeDt);
        }

        self.last_timestamp = Some(timestamp);
        self.step(dt, sample)
    }

    /// One frame with an explicit elapsed time.
    pub fn step(&mut self, dt: f64, sample: ControlSample) -> FrameOutcome {
        if !dt.is_finite() {
            return FrameOutcome::Rejected(RejectReason::NonFiniteDt);
        }
        if dt < 0.0 {
            return FrameOutcome::Rejected(RejectReason::NegativeDt);
        }
        let dt = if dt > self.max_frame_dt {
            debug!(dt, max = self.max_frame_dt, "clamping long frame");
            self.max_frame_dt
        } else {
            dt
        };

        let sample = sample.sanitized();
        let params = self.integrator.params;
        let cmd = self.mapper.map(&sample, &self.state, &params, dt);
        let result = self.integrator.step(&self.state, cmd, dt);
        self.mapper.decay();

        self.frame += 1;
        self.last_command = cmd;

        if !result.state.is_finite() {
            warn!(
                frame = self.frame,
                throttle = cmd.throttle,
                steer = cmd.steer,
                "non-finite vehicle state, zeroing motion"
            );
            self.state = VehicleState {
                x: self.state.x,
                y: self.state.y,
                phi: self.state.phi,
                ..VehicleState::default()
            };
            self.mapper.reset();
            self.sliding = false;
            return FrameOutcome::Reset;
        }

        self.state = result.state;
        self.sliding = result.telemetry.rear.saturated;
        FrameOutcome::Stepped { dt, telemetry: result.telemetry }
    }

    pub fn publication(&self) -> Publication {
        Publication {
            frame: self.frame,
            x: self.state.x,
            y: self.state.y,
            phi: self.state.phi,
            ux: self.state.ux,
            fx_rear: self.state.fx_rear,
            steer_angle: self.last_command.steer,
            rpm: self.mapper.engine_state().rpm,
            sliding: self.sliding,
        }
    }

    /// Sample once, advance once, publish once.
    pub fn run_frame<C, S>(&mut self, timestamp: f64, source: &mut C, sink: &mut S) -> FrameOutcome
    where
        C: ControlSource + ?Sized,
        S: StateSink + ?Sized,
    {
        let sample = source.sample();
        let outcome = self.advance(timestamp, sample);
        sink.publish(&self.publication());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift_core::types::{Stick, VehicleSpec};

    fn setup() -> SimSetup {
        SimSetup {
            vehicle: VehicleParameters::new(&VehicleSpec::default()).unwrap(),
            engine: EngineCurve::default(),
            control: ControlConfig::default(),
            integrator: IntegratorConfig::default(),
        }
    }

    fn gas(y: f64) -> ControlSample {
        ControlSample::new(Stick::default(), Stick::new(0.0, y))
    }

    struct Scripted(Vec<ControlSample>);

    impl ControlSource for Scripted {
        fn sample(&mut self) -> ControlSample {
            if self.0.is_empty() { ControlSample::default() } else { self.0.remove(0) }
        }
    }

    #[test]
    fn first_frame_primes_clock() {
        let mut ctx = SimulationContext::new(&setup());
        assert_eq!(ctx.advance(10.0, gas(1.0)), FrameOutcome::Primed);
        assert_eq!(*ctx.state(), VehicleState::default());
        assert_eq!(ctx.frame(), 0);

        match ctx.advance(10.016, gas(1.0)) {
            FrameOutcome::Stepped { dt, .. } => assert!((dt - 0.016).abs() < 1e-12),
            other => panic!("expected a step, got {other:?}"),
        }
        assert_eq!(ctx.frame(), 1);
    }

    #[test]
    fn negative_dt_is_rejected_without_touching_state() {
        let mut ctx = SimulationContext::new(&setup());
        ctx.advance(1.0, gas(1.0));
        ctx.advance(1.02, gas(1.0));
        let before = *ctx.state();
        let rpm = ctx.engine().rpm;

        assert_eq!(ctx.advance(0.5, gas(1.0)), FrameOutcome::Rejected(RejectReason::NegativeDt));
        assert_eq!(*ctx.state(), before);
        assert_eq!(ctx.engine().rpm, rpm);

        assert_eq!(ctx.step(-0.1, gas(1.0)), FrameOutcome::Rejected(RejectReason::NegativeDt));
        assert_eq!(
            ctx.step(f64::NAN, gas(1.0)),
            FrameOutcome::Rejected(RejectReason::NonFiniteDt)
        );
        assert_eq!(*ctx.state(), before);
    }

    #[test]
    fn long_frames_are_clamped() {
        let mut ctx = SimulationContext::new(&setup());
        ctx.advance(0.0, gas(0.0));
        match ctx.advance(5.0, gas(0.0)) {
            FrameOutcome::Stepped { dt, .. } => assert_eq!(dt, 0.1),
            other => panic!("expected a step, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_integration_resets_motion_at_last_pose() {
        let mut s = setup();
        // absurd gain drives the engine target speed to infinity
        s.control.rpm_gain = f64::MAX;
        s.control.rpm_max = f64::MAX;
        s.engine = EngineCurve::new([1.0, 2.0], [0.0, f64::MAX, f64::MAX]).unwrap();
        let mut ctx = SimulationContext::new(&s);

        let mut outcome = FrameOutcome::Primed;
        for _ in 0..5 {
            outcome = ctx.step(0.01, gas(1.0));
            if outcome == FrameOutcome::Reset {
                break;
            }
        }
        assert_eq!(outcome, FrameOutcome::Reset);
        assert!(ctx.state().is_finite());
        assert_eq!(ctx.state().ux, 0.0);
        assert_eq!(ctx.engine().rpm, 0.0);
    }

    #[test]
    fn run_frame_samples_and_publishes_once_per_frame() {
        let mut ctx = SimulationContext::new(&setup());
        let mut input = Scripted(vec![gas(1.0), gas(1.0), gas(1.0)]);
        let mut frames: Vec<Publication> = Vec::new();

        ctx.run_frame(0.0, &mut input, &mut frames);
        ctx.run_frame(0.016, &mut input, &mut frames);
        ctx.run_frame(0.032, &mut input, &mut frames);

        assert_eq!(frames.len(), 3);
        assert!(input.0.is_empty());
        assert_eq!(frames[0].frame, 0);
        assert_eq!(frames[2].frame, 2);
        assert!(frames[2].ux > 0.0);
        assert!(frames[2].fx_rear > 0.0);
        // the priming frame never touches the engine: 2 × 400 rpm in, 2 × 50 rpm decay
        assert_eq!(frames[2].rpm, 700.0);
    }

    #[test]
    fn reset_restores_all_zero_state() {
        let mut ctx = SimulationContext::new(&setup());
        for i in 0..20 {
            ctx.advance(i as f64 * 0.016, gas(1.0));
        }
        assert!(ctx.state().ux > 0.0);
        ctx.reset();
        assert_eq!(*ctx.state(), VehicleState::default());
        assert_eq!(ctx.engine().rpm, 0.0);
        assert_eq!(ctx.advance(100.0, gas(0.0)), FrameOutcome::Primed);
    }
}
