use reqwest::{multipart, Client};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::auth::SessionManager;
use crate::config::Endpoints;
use crate::errors::UploadError;

/// Shareable link returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    data: String,
}

impl Link {
    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn into_string(self) -> String {
        self.data
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

/// One screenshot and its metadata, ready to be turned into a multipart form.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    file_name: String,
    bytes: Vec<u8>,
    metadata: String,
}

impl UploadPayload {
    pub fn new(file_name: &str, bytes: Vec<u8>, metadata: String) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
            metadata,
        }
    }

    pub fn build_form(&self) -> Result<multipart::Form, UploadError> {
        let part = multipart::Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str("image/png")?;

        Ok(multipart::Form::new()
            .part("file", part)
            .text("metadata", self.metadata.clone()))
    }
}

/// Client for the screenshot hosting endpoint. Uploads are never retried.
#[derive(Clone)]
pub struct UploadClient {
    client: Client,
    upload_url: String,
    session: SessionManager,
}

impl UploadClient {
    pub fn new(endpoints: &Endpoints, session: SessionManager) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoints.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, endpoints, session))
    }

    pub fn with_client(client: Client, endpoints: &Endpoints, session: SessionManager) -> Self {
        Self {
            client,
            upload_url: endpoints.upload_url.clone(),
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn upload(&self, payload: &UploadPayload) -> Result<Link, UploadError> {
        let token = self.session.access_token().ok_or(UploadError::Unauthenticated)?;
        let form = payload.build_form()?;

        log::debug!(
            "Uploading {} ({} bytes) to {}",
            payload.file_name,
            payload.bytes.len(),
            self.upload_url
        );

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_upload_response(status.as_u16(), &body)
    }

    /// Convenience wrapper taking the raw pieces.
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        metadata: String,
    ) -> Result<Link, UploadError> {
        self.upload(&UploadPayload::new(file_name, bytes, metadata)).await
    }
}

/// Map an upload response to a link or a structured error.
pub fn parse_upload_response(status: u16, body: &str) -> Result<Link, UploadError> {
    if (200..300).contains(&status) {
        return serde_json::from_str::<Link>(body).map_err(|e| {
            log::error!("Upload succeeded but the response could not be read: {}", e);
            UploadError::InvalidResponse(e.to_string())
        });
    }

    let message = match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.message,
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            if snippet.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                snippet
            }
        }
    };

    Err(UploadError::server(status, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IdentityClient;
    use crate::test_support::FakeServer;

    #[test]
    fn test_parse_success_link() {
        let link = parse_upload_response(200, r#"{"data":"https://host/x"}"#).unwrap();
        assert_eq!(link.as_str(), "https://host/x");
        assert_eq!(link.to_string(), "https://host/x");
    }

    #[test]
    fn test_parse_server_error_message() {
        match parse_upload_response(400, r#"{"message":"bad file"}"#) {
            Err(UploadError::Server { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad file");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unstructured_error() {
        match parse_upload_response(502, "<html>Bad Gateway</html>") {
            Err(UploadError::Server { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "<html>Bad Gateway</html>");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_success_without_link_is_invalid() {
        let result = parse_upload_response(200, r#"{"ok":true}"#);
        assert!(matches!(result, Err(UploadError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_upload_without_session_makes_no_request() {
        let server = FakeServer::start(vec![("/upload", vec![(200, r#"{"data":"x"}"#)])]).await;
        let endpoints = server.endpoints();
        let session = SessionManager::new(IdentityClient::new(&endpoints).unwrap());
        let client = UploadClient::new(&endpoints, session).unwrap();

        let result = client
            .upload_bytes(vec![1, 2, 3], "shot.png", String::new())
            .await;

        assert!(matches!(result, Err(UploadError::Unauthenticated)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upload_sends_bearer_and_form_fields() {
        let server = FakeServer::start(vec![
            (
                "/signin",
                vec![(200, r#"{"idToken":"id-1","refreshToken":"r-1","expiresIn":"3600"}"#)],
            ),
            ("/upload", vec![(200, r#"{"data":"https://host/x"}"#)]),
        ])
        .await;
        let endpoints = server.endpoints();
        let session = SessionManager::new(IdentityClient::new(&endpoints).unwrap());
        session.authenticate("player@example.com", "pw").await.unwrap();
        let client = UploadClient::new(&endpoints, session).unwrap();

        let link = client
            .upload_bytes(b"PNGDATA".to_vec(), "pet.png", r#"{"playerName":"Zezima"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(link.as_str(), "https://host/x");

        let request = server
            .requests()
            .into_iter()
            .find(|r| r.path() == "/upload")
            .unwrap();
        assert_eq!(request.header("authorization"), Some("Bearer id-1"));
        assert!(request
            .header("content-type")
            .unwrap_or_default()
            .starts_with("multipart/form-data"));
        let body = request.body_text();
        assert!(body.contains(r#"name="file"; filename="pet.png""#));
        assert!(body.contains("PNGDATA"));
        assert!(body.contains(r#"name="metadata""#));
        assert!(body.contains(r#"{"playerName":"Zezima"}"#));
    }

    #[tokio::test]
    async fn test_upload_server_error_surfaces_message() {
        let server = FakeServer::start(vec![
            (
                "/signin",
                vec![(200, r#"{"idToken":"id-1","refreshToken":"r-1","expiresIn":"3600"}"#)],
            ),
            ("/upload", vec![(400, r#"{"message":"bad file"}"#)]),
        ])
        .await;
        let endpoints = server.endpoints();
        let session = SessionManager::new(IdentityClient::new(&endpoints).unwrap());
        session.authenticate("player@example.com", "pw").await.unwrap();
        let client = UploadClient::new(&endpoints, session).unwrap();

        let result = client.upload_bytes(vec![0], "a.png", String::new()).await;

        match result {
            Err(UploadError::Server { message, .. }) => assert_eq!(message, "bad file"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
