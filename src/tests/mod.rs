// Test modules for all components
pub mod test_agent;
pub mod test_network;
