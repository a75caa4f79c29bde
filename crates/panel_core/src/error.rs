use thiserror::Error;

/// Failure of a single request issued by the panel.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("{route} returned status {status}")]
    Status { route: &'static str, status: u16 },
    #[error("request to {route} failed: {source}")]
    Transport {
        route: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed response from {route}: {message}")]
    MalformedResponse { route: &'static str, message: String },
    #[error("settings page carries no anti-forgery token")]
    MissingAntiForgeryToken,
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to read bulk import file: {0}")]
    Io(#[from] std::io::Error),
}

impl PanelError {
    pub(crate) fn from_reqwest(route: &'static str, source: reqwest::Error) -> Self {
        match source.status() {
            Some(status) => Self::Status {
                route,
                status: status.as_u16(),
            },
            None => Self::Transport { route, source },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
