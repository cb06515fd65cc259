use crate::{SessionConfig, SessionId};
use biscotti::RequestCookies;
use unsafe_tracing::fields::{ERROR_DETAILS, ERROR_MESSAGE, error_details, error_message};

/// The session id attached to the incoming request.
///
/// Built using [`IncomingSession::extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingSession {
    pub(crate) id: SessionId,
}

impl IncomingSession {
    /// Extract the session id from the incoming request, if there is one.
    ///
    /// If [`InsecureConfig::query_param`] is set and the parameter is present
    /// in `query` (the raw query string, without the leading `?`), its value is
    /// used as the session id, as is. The session cookie is used otherwise,
    /// decoded via [`SessionConfig::codec`].
    ///
    /// If the cookie is not found, or if it fails to decode, this method returns `None`.
    ///
    /// [`InsecureConfig::query_param`]: crate::config::InsecureConfig::query_param
    pub fn extract(
        cookies: &RequestCookies<'_>,
        query: Option<&str>,
        config: &SessionConfig,
    ) -> Option<Self> {
        if let (Some(param), Some(query)) = (config.insecure.query_param.as_deref(), query) {
            let from_query = form_urlencoded::parse(query.as_bytes())
                .find(|(name, _)| name == param)
                .and_then(|(_, value)| SessionId::from_client(value.into_owned()));
            if let Some(id) = from_query {
                tracing::debug!("Using the session id provided via query parameter");
                return Some(Self { id });
            }
        }

        let cookie = cookies.get(&config.cookie.name)?;
        match config.codec().decode(cookie.value()) {
            Ok(id) => Some(Self { id }),
            Err(e) => {
                tracing::event!(
                    tracing::Level::WARN,
                    { ERROR_MESSAGE } = error_message(&e),
                    { ERROR_DETAILS } = error_details(&e),
                    "Invalid session cookie, creating a new session."
                );
                None
            }
        }
    }

    /// Build an incoming session from an id you already extracted.
    pub fn from_id(id: SessionId) -> Self {
        Self { id }
    }

    /// The session id sent by the client.
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}
