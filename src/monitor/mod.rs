//! Recovery monitor — periodic supervision of deployed workflows.

pub mod sweep;

pub use sweep::{spawn_sweep_ticker, MonitorDeps, RecoveryMonitor, SweepAction, SweepReport};
