/// Utility types shared by the scene graph

mod observable;
mod perf_counter;

pub use observable::{Observable, ObserverId};
pub use perf_counter::PerfCounter;
