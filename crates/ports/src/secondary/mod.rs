use std::future::Future;
use std::pin::Pin;

use domain::common::error::DomainError;

pub mod cluster_state_port;
pub mod config_register_port;
pub mod device_port;
pub mod flow_table_port;
pub mod metrics_port;
pub mod opt_map_port;
pub mod plugin_chain_port;
pub mod pod_network_port;
pub mod program_loader_port;
pub mod trace_port_map_port;

/// Boxed future returned by async port methods.
///
/// Boxed instead of RPITIT so the traits stay dyn-compatible and can be
/// held as `Arc<dyn Port>`.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DomainError>> + Send + 'a>>;
