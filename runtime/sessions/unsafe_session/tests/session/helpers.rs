use biscotti::{RequestCookie, RequestCookies, ResponseCookie};
use unsafe_session::{IncomingSession, SessionConfig, SessionId};

/// Parse the response cookie created by finalizing the session
pub struct SetCookie {
    pub id: SessionId,
    pub value: String,
}

impl SetCookie {
    pub fn parse(cookie: ResponseCookie<'static>, config: &SessionConfig) -> Self {
        let value = cookie.value().to_owned();
        let id = config.codec().decode(&value).unwrap();
        Self { id, value }
    }

    pub fn id(&self) -> &str {
        self.id.inner()
    }

    /// Send the cookie back, as the browser would on the next request.
    pub fn send_back(&self, config: &SessionConfig) -> Option<IncomingSession> {
        let cookies = request_cookies(&config.cookie.name, &self.value);
        IncomingSession::extract(&cookies, None, config)
    }
}

/// The cookies attached to a request that carries a single cookie.
pub fn request_cookies(name: &str, value: &str) -> RequestCookies<'static> {
    let mut request_cookies = RequestCookies::new();
    request_cookies.append(RequestCookie::new(name.to_owned(), value.to_owned()));
    request_cookies
}
