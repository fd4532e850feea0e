//! Services separating I/O and progress reporting from the engine

#[cfg(feature = "cli")]
pub mod discovery;
pub mod io;
pub mod progress;

#[cfg(feature = "cli")]
pub use discovery::{discover_inputs, DiscoveredInputs};
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressUpdate,
};
