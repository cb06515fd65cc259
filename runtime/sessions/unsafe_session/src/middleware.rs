use biscotti::ResponseCookies;

use crate::{Session, state::errors::FinalizeError};

/// Attach a session cookie to the outgoing response cookies, if needed.
///
/// It will also sync the session server-side state with the chosen storage backend.
/// Call it once per request, after the handler is done with the session and
/// before the response headers are written.
pub async fn finalize_session<'store>(
    response_cookies: &mut ResponseCookies<'static>,
    mut session: Session<'store>,
) -> Result<(), FinalizeError> {
    if let Some(cookie) = session.finalize().await? {
        response_cookies.insert(cookie);
    }
    Ok(())
}
