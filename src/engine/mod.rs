//! Encoding engine module
//!
//! Graph building, the live process registry and the process supervisor that
//! runs the external encoder.

pub mod graph;
pub mod progress;
pub mod registry;
pub mod supervisor;

pub use graph::{ConcatStrategy, EncoderInvocation, GraphBuilder, Manifest, OutputFormat};
pub use progress::{EncoderProgress, ProgressSink, ProgressThrottle};
pub use registry::{ActiveProcessHandle, CancelSignal, ProcessRegistry};
pub use supervisor::{ProcessSupervisor, SupervisorConfig};
