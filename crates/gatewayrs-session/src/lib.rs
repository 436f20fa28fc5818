//! Session controller, shutdown coordinator, and capability store
//! (components J, K, L).

mod capability_store;
mod controller;
mod shutdown;

pub use capability_store::CapabilityStore;
pub use controller::{SessionController, DEFAULT_SESSION_ID};
pub use shutdown::ShutdownCoordinator;
