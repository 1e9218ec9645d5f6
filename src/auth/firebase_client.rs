use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::config::Endpoints;
use crate::errors::AuthError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// Tokens handed out by both the sign-in and the refresh endpoint.
///
/// Sign-in answers in camelCase, the secure token endpoint in snake_case,
/// so every field accepts both spellings.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    #[serde(rename = "idToken", alias = "id_token")]
    pub id_token: String,
    #[serde(rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: String,
    #[serde(
        rename = "expiresIn",
        alias = "expires_in",
        deserialize_with = "deserialize_expires_in"
    )]
    pub expires_in: u64,
    #[serde(default, rename = "localId", alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Firebase sends `expiresIn` as a string ("3600"); accept numbers too.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(secs) => Ok(secs),
        Seconds::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

/// Firebase identity REST client: password sign-in and refresh token exchange.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    auth_url: String,
    refresh_url: String,
    api_key: String,
}

impl IdentityClient {
    pub fn new(endpoints: &Endpoints) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoints.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, endpoints))
    }

    pub fn with_client(client: Client, endpoints: &Endpoints) -> Self {
        Self {
            client,
            auth_url: endpoints.auth_url.clone(),
            refresh_url: endpoints.refresh_url.clone(),
            api_key: endpoints.api_key.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, AuthError> {
        if self.api_key.trim().is_empty() {
            return Err(AuthError::NotConfigured(
                "no Firebase API key (set endpoints.api_key or SCAPECLOUD_API_KEY)".to_string(),
            ));
        }
        Ok(&self.api_key)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenGrant, AuthError> {
        let key = self.api_key()?;
        let credentials = Credentials {
            email,
            password,
            return_secure_token: true,
        };

        log::debug!("Signing in to identity provider as {}", email);

        let response = self
            .client
            .post(&self.auth_url)
            .query(&[("key", key)])
            .json(&credentials)
            .send()
            .await?;

        read_grant(response).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let key = self.api_key()?;

        log::debug!("Exchanging refresh token for a new id token");

        let response = self
            .client
            .post(&self.refresh_url)
            .query(&[("key", key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        read_grant(response).await
    }
}

async fn read_grant(response: reqwest::Response) -> Result<TokenGrant, AuthError> {
    let status = response.status();
    let body = response.text().await?;
    parse_grant_response(status.as_u16(), &body)
}

/// Turn an identity response into a grant or a structured error.
pub fn parse_grant_response(status: u16, body: &str) -> Result<TokenGrant, AuthError> {
    if (200..300).contains(&status) {
        return serde_json::from_str::<TokenGrant>(body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()));
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => Err(AuthError::rejected(
            error.error.code.unwrap_or(status),
            &error.error.message,
        )),
        Err(e) => {
            log::debug!("Identity error body was not JSON: {}", e);
            let snippet: String = body.chars().take(200).collect();
            let message = if snippet.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                snippet
            };
            Err(AuthError::rejected(status, &message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sign_in_response_with_string_expiry() {
        let body = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "uid-1",
            "email": "player@example.com",
            "displayName": "",
            "idToken": "id-abc",
            "registered": true,
            "refreshToken": "refresh-abc",
            "expiresIn": "3600"
        }"#;

        let grant = parse_grant_response(200, body).unwrap();
        assert_eq!(grant.id_token, "id-abc");
        assert_eq!(grant.refresh_token, "refresh-abc");
        assert_eq!(grant.expires_in, 3600);
        assert_eq!(grant.user_id.as_deref(), Some("uid-1"));
    }

    #[test]
    fn test_parse_refresh_response_snake_case() {
        let body = r#"{
            "expires_in": "3600",
            "token_type": "Bearer",
            "refresh_token": "refresh-2",
            "id_token": "id-2",
            "user_id": "uid-1",
            "project_id": "1234"
        }"#;

        let grant = parse_grant_response(200, body).unwrap();
        assert_eq!(grant.id_token, "id-2");
        assert_eq!(grant.refresh_token, "refresh-2");
        assert_eq!(grant.user_id.as_deref(), Some("uid-1"));
    }

    #[test]
    fn test_parse_numeric_expiry() {
        let body = r#"{"idToken":"a","refreshToken":"b","expiresIn":900}"#;
        assert_eq!(parse_grant_response(200, body).unwrap().expires_in, 900);
    }

    #[test]
    fn test_parse_firebase_error() {
        let body = r#"{"error":{"code":400,"message":"INVALID_PASSWORD","errors":[{"message":"INVALID_PASSWORD","domain":"global","reason":"invalid"}]}}"#;

        match parse_grant_response(400, body) {
            Err(AuthError::Rejected { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "INVALID_PASSWORD");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_json_error_keeps_status() {
        match parse_grant_response(503, "") {
            Err(AuthError::Rejected { code, message }) => {
                assert_eq!(code, 503);
                assert_eq!(message, "HTTP 503");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_success_without_tokens_is_invalid() {
        let result = parse_grant_response(200, r#"{"kind":"x"}"#);
        assert!(matches!(result, Err(AuthError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_sign_in_requires_api_key() {
        let client = IdentityClient::new(&Endpoints::default()).unwrap();
        let result = client.sign_in("player@example.com", "pw").await;
        assert!(matches!(result, Err(AuthError::NotConfigured(_))));
    }
}
