pub mod config;
pub mod events;
pub mod gesture;
pub mod pipeline;
pub mod pose;
pub mod tracker;

pub use config::{Config, ConfigError};
pub use events::{Event, EventGate};
pub use pipeline::{FrameOutput, Pipeline, TrackedObject};
