pub mod dispatcher;
pub mod log;
pub mod templates;
pub mod transport;
pub mod types;

pub use dispatcher::Dispatcher;
pub use log::NotificationLog;
pub use templates::{render, MessageContext, RenderedMessage};
pub use transport::{HttpPushTransport, PushTransport, SendResult, TransportError};
pub use types::{DispatchSummary, EventKind, NotificationOutcome, NotificationRecord};
