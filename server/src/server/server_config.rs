use std::time::Duration;

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// How long requests sent by the server wait for a response before they
    /// resolve with `ResponseCode::Timeout`
    pub request_timeout: Duration,
    /// With the default visibility rule, whether every ready connection sees
    /// every entity. When false, connections only see the entities they own
    /// until a custom rule is installed.
    pub default_visibility: bool,
    /// Scene name reported to clients in the EnterGame response
    pub initial_scene: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            default_visibility: true,
            initial_scene: String::new(),
        }
    }
}
