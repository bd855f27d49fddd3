pub mod checker;
pub mod clock;
/// Sampling engine module - probes targets on a fixed interval
///
/// This module is responsible for:
/// - Running the external reachability check and parsing its summary
/// - Keeping wake-ups phase-locked to the start instant
/// - Validating targets and sampling settings
/// - Coordinating probes with the sample store
pub mod executor;
pub mod parser;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::PingCommand;
pub use clock::IntervalClock;
pub use executor::ProbeExecutor;
pub use scheduler::SamplingLoop;
