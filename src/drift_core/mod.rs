//! drift_core - engine-agnostic drift car dynamics (pure types + solver)

pub mod angle;
pub mod types;
pub mod tire;
pub mod engine;
pub mod control;
pub mod dynamics;
pub mod context;

pub use types::*;
pub use angle::{ZeroPolicy, sign, wrap_to_pi};
pub use tire::{SaturationCurve, TireForce, TireForceModel};
pub use engine::EngineCurve;
pub use control::{ControlConfig, ControlMapper, ThrottleMode};
pub use dynamics::{DynamicsIntegrator, StepResult, StepTelemetry};
pub use context::{
    ControlSource, FrameOutcome, IntegratorConfig, Publication, RejectReason, SimSetup,
    SimulationContext, StateSink,
};
