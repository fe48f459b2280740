//! Post endpoint: wire DTO, domain type, domain error, and the fetch call.
//!
//! This is the shape every endpoint module takes: the client knows nothing
//! about posts, and the post layer narrows `ApiError` into `PostError` through
//! `Call::map_err`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::call::{Call, ErrorSink};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::http::Transport;

/// Body returned by `GET todos/{id}`. Extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
}

impl From<PostResponse> for Post {
    fn from(raw: PostResponse) -> Self {
        Self { id: raw.id }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PostError {
    #[error("post {id} not found")]
    NotFound {
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to fetch post {id}")]
    Fetch {
        id: String,
        #[source]
        source: ApiError,
    },
}

impl PostError {
    pub fn from_api(id: &str, source: ApiError) -> Self {
        let id = id.to_string();
        match source.status() {
            Some(404) => PostError::NotFound { id, source },
            _ => PostError::Fetch { id, source },
        }
    }

    /// The client-level error behind this one.
    pub fn api_error(&self) -> &ApiError {
        match self {
            PostError::NotFound { source, .. } | PostError::Fetch { source, .. } => source,
        }
    }
}

pub async fn fetch_post<T: Transport>(
    client: &ApiClient<T>,
    sink: &dyn ErrorSink,
    id: &str,
) -> Result<Post, PostError> {
    Call::new(client.get::<PostResponse>(&format!("todos/{id}"), None))
        .map(Post::from)
        .map_err(|err| PostError::from_api(id, err))
        .run(sink)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ApiErrorKind;
    use crate::http::{HttpRequest, HttpResponse, TransportError};
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::error::Error as _;

    struct Fixed {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl Transport for Fixed {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            assert!(request.url.ends_with("/todos/1") || request.url.ends_with("/todos/122"));
            Ok(HttpResponse::new(self.status, self.body))
        }
    }

    fn client(status: u16, body: &'static str) -> ApiClient<Fixed> {
        let config = ClientConfig::new("https://jsonplaceholder.typicode.com").unwrap();
        ApiClient::new(config, Fixed { status, body })
    }

    #[tokio::test]
    async fn maps_raw_response_to_post() {
        let logged = RefCell::new(Vec::new());
        let sink = |e: &(dyn std::error::Error + 'static)| logged.borrow_mut().push(e.to_string());

        let post = fetch_post(&client(200, r#"{"id":"1","title":"x"}"#), &sink, "1")
            .await
            .unwrap();
        assert_eq!(post, Post { id: "1".to_string() });
        assert!(logged.borrow().is_empty());
    }

    #[tokio::test]
    async fn missing_post_is_not_found_with_original_error() {
        let logged = RefCell::new(Vec::new());
        let sink = |e: &(dyn std::error::Error + 'static)| logged.borrow_mut().push(e.to_string());

        let err = fetch_post(&client(404, r#"{"message":"not found"}"#), &sink, "122")
            .await
            .unwrap_err();

        assert!(matches!(err, PostError::NotFound { ref id, .. } if id == "122"));
        let api = err.api_error();
        assert_eq!(api.kind(), ApiErrorKind::HttpStatus);
        assert_eq!(api.status(), Some(404));
        assert_eq!(api.body().unwrap()["message"], "not found");
        assert!(err.source().is_some());
        assert_eq!(*logged.borrow(), vec!["post 122 not found".to_string()]);
    }

    #[tokio::test]
    async fn server_error_is_fetch_failure() {
        let sink = |_: &(dyn std::error::Error + 'static)| {};
        let err = fetch_post(&client(500, ""), &sink, "1").await.unwrap_err();
        assert!(matches!(err, PostError::Fetch { .. }));
        assert!(err.api_error().body().is_none());
    }
}
