#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Configure the lifetime of the server-side session state.
pub struct SessionStateConfig {
    /// How long a session can stay inactive before it expires.
    ///
    /// Every write, and every read of an existing session, pushes the
    /// expiry of the session record to `now + timeout`.
    ///
    /// # Default
    ///
    /// 20 minutes.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: std::time::Duration,
}

impl Default for SessionStateConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(1200)
}
