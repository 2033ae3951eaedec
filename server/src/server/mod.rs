mod server;
mod server_config;

pub use server::{Server, LOCAL_CONNECTION};
pub use server_config::ServerConfig;
