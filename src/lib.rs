pub mod bus;
pub mod config;
pub mod error;
pub mod hal;
pub mod kernel;
pub mod service;

pub use config::AudioConfig;
pub use error::{AudioError, Result};
pub use kernel::event::{EventSender, InboundEvent, OutboundEvent};
pub use kernel::reactor::Reactor;
pub use service::AudioService;
