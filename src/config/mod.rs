// ==========================================
// Roofline Ops - configuration layer
// ==========================================

pub mod config_manager;
pub mod ops_config_trait;

pub use config_manager::ConfigManager;
pub use ops_config_trait::OpsConfigReader;
