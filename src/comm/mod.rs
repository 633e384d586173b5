//! Messaging: the in-process event bus and the external command socket.

pub mod bus;
pub mod event;
pub mod external;
pub mod server;

pub use bus::{EventBus, SubscriptionId};
pub use event::{Event, EventData, EventType};
pub use external::{DEFAULT_COMMAND_HOST, DEFAULT_COMMAND_PORT, ExternalCommandMessage};
