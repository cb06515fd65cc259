#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Deliberately insecure knobs, used to demonstrate session attacks.
///
/// Both are disabled by default. Do not enable them outside of a classroom.
pub struct InsecureConfig {
    /// Accept the session id from the query parameter with this name.
    ///
    /// When the parameter is present, it takes precedence over the session cookie
    /// and its value is used as a raw (unsigned) session id.
    /// Session ids in URLs leak through logs, history and the `Referer` header.
    #[serde(default)]
    pub query_param: Option<String>,
    /// Accept session ids that were not issued by the server, or that
    /// refer to sessions that have expired or been deleted.
    ///
    /// Instead of starting a fresh session, the server keeps using the id
    /// provided by the client and stores data against it on the first write.
    /// This is what makes session fixation attacks possible.
    #[serde(default)]
    pub accept_client_session_id: bool,
}
