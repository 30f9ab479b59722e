//! Domain model (fixture events, queue messages, pipeline errors).

pub mod errors;
pub mod fixture;
pub mod message;

pub use self::errors::PipelineError;
pub use self::fixture::FixtureEvent;
pub use self::message::{MessageId, QueueMessage, ReceiptHandle};
