use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmsError {
    /// Credentials rejected at login. Surfaced to the caller, never retried.
    #[error("authentication failed: credentials rejected by the site")]
    Authentication,

    /// A fetch with a previously valid-looking session landed on the login
    /// page. The caller must re-authenticate; there is no silent retry.
    #[error("session expired: login required")]
    SessionExpired,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),
}
