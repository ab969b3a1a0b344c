pub mod network_variable;
