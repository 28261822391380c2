// Locust dashboard core
//
// Domain types shared by the control plane and its tools:
// - RunParameters: validated configuration for one load-test run
// - MetricSample: an opaque JSON object reported by the worker, kept verbatim
// - WorkerStatus: point-in-time view of the supervised worker process
//
// Nothing here spawns processes or opens sockets.

pub mod run;
pub mod sample;
pub mod status;

// Telemetry (tracing subscriber setup)
pub mod telemetry;

pub use run::{ParameterError, RunParameters, RunTime};
pub use sample::{MetricSample, SampleError};
pub use status::{WorkerExit, WorkerState, WorkerStatus};
