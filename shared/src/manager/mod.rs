mod network_config;
mod network_manager;

pub use network_config::NetworkConfig;
pub use network_manager::{ConnectionState, NetworkManager};
