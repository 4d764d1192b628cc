pub mod service;
pub mod state;

pub use service::Poller;
pub use state::{SyncSnapshot, SyncStore};
