//! The Node side of the pipeline: produces readings at a fixed rate and
//! dispatches them to a Sink through a pluggable [`sender::Sender`].

pub mod counters;
pub mod dispatcher;
pub mod producer;
pub mod sender;

pub use counters::Counters;
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use producer::Producer;
