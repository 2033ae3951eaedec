pub mod connection;
pub mod ping_manager;
