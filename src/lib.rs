pub mod drift_core;
pub mod config;
pub mod state;
pub mod net;
