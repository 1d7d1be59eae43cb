pub mod audit;
pub mod instance_registry;
pub mod node_deletion;
pub mod node_registry;
pub mod prober;
pub mod settings;
