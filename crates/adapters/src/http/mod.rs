pub mod cni_handler;
pub mod error;
pub mod metrics_handler;
pub mod router;
pub mod server;
pub mod state;
pub mod version_handler;
