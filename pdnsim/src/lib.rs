//! Power-delivery network transient simulator (`pdnsim`)
//!
//! Replays a per-epoch trace of workload current draw and architectural
//! events through a discretized RLC supply model, predicts voltage
//! emergencies with one of several interchangeable strategies, throttles
//! with hysteresis, and keeps mitigation accuracy statistics.

// Modules
pub mod analog;
pub mod data;
pub mod epoch_trace;
pub mod events;
pub mod pdn;
pub mod predictor;
pub mod session;
pub mod sim;
pub mod stats;
pub mod throttle;

// Exports
pub use self::{
	analog::AnalogSource,
	epoch_trace::{EpochTraceReader, EpochTraceWriter},
	pdn::Pdn,
	predictor::Predictor,
	session::Session,
	sim::{EpochHandler, Simulator},
};
