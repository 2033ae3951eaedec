use std::time::Duration;

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Send EnterGame as soon as the transport reports the connection
    pub enter_game_on_connect: bool,
    /// Send ClientReady once EnterGame succeeds. Place the initial scene's
    /// static entities before connecting when this is on. After a scene
    /// change the client always waits for `Client::send_ready`.
    pub ready_on_enter: bool,
    /// How long requests wait for a response before they resolve with
    /// `ResponseCode::Timeout`
    pub request_timeout: Duration,
    pub ping: PingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enter_game_on_connect: true,
            ready_on_enter: true,
            request_timeout: Duration::from_secs(5),
            ping: PingConfig::default(),
        }
    }
}

/// Clock synchronisation settings
#[derive(Clone, Debug)]
pub struct PingConfig {
    /// Time between two pings
    pub ping_interval: Duration,
    /// A ping without an answer after this long is considered lost and a new
    /// one may be sent
    pub ping_timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(1),
            ping_timeout: Duration::from_secs(5),
        }
    }
}
