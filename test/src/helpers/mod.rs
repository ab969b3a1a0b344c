mod frames;
mod test_network;

pub use frames::{rpc_sends, var_sends};
pub use logging::init_logger;
pub use probe::{probe_rpcs, spawn_probe, Probe, ProbeCall};
pub use test_network::{Pumped, TestNetwork};
