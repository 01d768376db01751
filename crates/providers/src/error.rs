use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown local provider `{0}` (expected one of: ollama, lmstudio)")]
    UnknownProvider(String),
    #[error("probe of {url} failed: {reason}")]
    Probe { url: String, reason: String },
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("setup instructions could not be rendered: {0}")]
    Template(#[from] tera::Error),
}
