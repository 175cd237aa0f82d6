use crate::*;

use std::num::ParseIntError;
use thiserror::Error;

/// Basic Result alias with [`enum@Error`]
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Body sent instead of the details of a failure
pub const GENERIC_ERROR: &str = "Internal Error";

/// Failures of request handlers, all of them answered with 500
#[derive(Error, Debug)]
pub enum Error {
    #[error("no id specified to mark as done")]
    MissingId,
    #[error("error parsing id {id}: {source}")]
    InvalidId { id: String, source: ParseIntError },
    #[error("error looking up todo {id}: {source}")]
    Lookup { id: u64, source: StoreError },
    #[error("error saving todo: {0}")]
    Save(StoreError),
    #[error("error saving changes to todo {id}: {source}")]
    Update { id: u64, source: StoreError },
    #[error(transparent)]
    Fetch(StoreError),
    #[error(transparent)]
    Render(#[from] tera::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the response body may carry the error message
    pub fn exposed(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Render(_) | Error::Json(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("{self}");
        let body = match self.exposed() {
            true => self.to_string(),
            false => GENERIC_ERROR.to_owned(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{body}\n")).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: Error) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn fetch_errors_expose_details() {
        let (status, body) = body_of(Error::Fetch(StoreError::Corrupted("index entry"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "corrupted index entry\n");
    }

    #[tokio::test]
    async fn client_and_write_errors_stay_generic() {
        let invalid = "abc".parse::<u64>().unwrap_err();
        for err in [
            Error::MissingId,
            Error::InvalidId { id: "abc".into(), source: invalid },
            Error::Lookup { id: 9, source: StoreError::NotFound },
            Error::Save(StoreError::Corrupted("id counter")),
        ] {
            let (status, body) = body_of(err).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "Internal Error\n");
        }
    }
}
