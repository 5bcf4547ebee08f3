use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{error, trace};

use crate::domain::{DkElectricityError, Result};

/// How a non-success status is reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// Every failure is an HTTP error.
    Http,
    /// Every failure means the credential was not accepted.
    Auth,
    /// 401 and 403 mean the access token was not accepted, anything else is an HTTP error.
    AuthOnDenied,
}

impl Rejection {
    fn classify(self, endpoint: &str, status: StatusCode, body: String) -> DkElectricityError {
        let endpoint = endpoint.to_string();
        let is_denied = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);

        match self {
            Self::Auth => DkElectricityError::Auth { endpoint, status, body },
            Self::AuthOnDenied if is_denied => DkElectricityError::Auth { endpoint, status, body },
            Self::Http | Self::AuthOnDenied => DkElectricityError::Http { endpoint, status, body },
        }
    }
}

/// Send the request and return the body of a successful response.
pub(crate) async fn fetch_body(
    request: RequestBuilder,
    endpoint: &str,
    rejection: Rejection,
) -> Result<String> {
    let transport = |source: reqwest::Error| DkElectricityError::Transport {
        endpoint: endpoint.to_string(),
        source,
    };

    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let body = response.text().await.map_err(transport)?;

    if !status.is_success() {
        error!(endpoint, %status, "request failed");
        return Err(rejection.classify(endpoint, status, body));
    }

    trace!(endpoint, n_bytes = body.len(), "received");
    Ok(body)
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str, endpoint: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| DkElectricityError::parse(endpoint, e.to_string()))
}
