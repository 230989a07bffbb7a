pub mod arbiter;
pub mod event;
pub mod reactor;
pub mod speech;
pub mod state;
pub mod stream;
pub mod time;
