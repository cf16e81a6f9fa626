//! Destination buffering and delivery.

pub mod dispatcher;
pub mod handler;
pub mod transport;

pub use dispatcher::{Dispatcher, EventOutcome};
pub use handler::Handler;
pub use transport::{HttpTransport, Transport};
