use async_trait::async_trait;
use portfolio_logging::{portfolio_debug, redact};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::config::{ConsumerCredentials, HttpSettings, ServiceEndpoints};
use crate::signature::OAuthParams;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuthError {
    #[error("invalid oauth endpoint {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("oauth endpoint returned http status {0}")]
    HttpStatus(u16),
    #[error("oauth request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("oauth response is missing {0}")]
    MissingField(&'static str),
}

/// Temporary credentials issued by the request-token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
    pub callback_confirmed: bool,
}

/// Fields of the access-token response that end up in the stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenResponse {
    pub token: String,
    pub note_store_url: String,
    pub user_id: String,
}

/// The two signed legs of OAuth 1.0a; the middle leg is a browser redirect.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Base of the user-approval page; the request token is appended as a query parameter.
    fn authorize_base(&self) -> &str;

    async fn request_token(
        &self,
        consumer: &ConsumerCredentials,
        callback_url: &str,
    ) -> Result<RequestToken, OAuthError>;

    async fn access_token(
        &self,
        consumer: &ConsumerCredentials,
        token: &str,
        token_secret: &str,
        verifier: &str,
    ) -> Result<AccessTokenResponse, OAuthError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestOAuthClient {
    client: reqwest::Client,
    endpoints: ServiceEndpoints,
}

impl ReqwestOAuthClient {
    pub fn new(endpoints: ServiceEndpoints, settings: &HttpSettings) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| OAuthError::Network(err.to_string()))?;
        Ok(Self { client, endpoints })
    }

    async fn signed_call(
        &self,
        method: Method,
        endpoint: &str,
        params: OAuthParams,
        consumer_secret: &str,
        token_secret: &str,
    ) -> Result<Vec<(String, String)>, OAuthError> {
        let url = Url::parse(endpoint).map_err(|err| OAuthError::InvalidUrl {
            url: endpoint.to_string(),
            message: err.to_string(),
        })?;
        let header =
            params.authorization_header(method.as_str(), &url, consumer_secret, token_secret);

        portfolio_debug!("OAuth {} {}", method, url);
        let response = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, header)
            .header(ACCEPT, "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::HttpStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(parse_form_response(&body))
    }
}

#[async_trait]
impl OAuthClient for ReqwestOAuthClient {
    fn authorize_base(&self) -> &str {
        &self.endpoints.authorize
    }

    async fn request_token(
        &self,
        consumer: &ConsumerCredentials,
        callback_url: &str,
    ) -> Result<RequestToken, OAuthError> {
        let mut params = OAuthParams::new(&consumer.key);
        params.callback = Some(callback_url.to_string());

        let fields = self
            .signed_call(
                Method::GET,
                &self.endpoints.request_token,
                params,
                &consumer.secret,
                "",
            )
            .await?;
        let token = required_field(&fields, "oauth_token")?;
        let secret = required_field(&fields, "oauth_token_secret")?;
        let callback_confirmed = field(&fields, "oauth_callback_confirmed") == Some("true");
        portfolio_debug!("Request token issued: {}", redact(&token));
        Ok(RequestToken {
            token,
            secret,
            callback_confirmed,
        })
    }

    async fn access_token(
        &self,
        consumer: &ConsumerCredentials,
        token: &str,
        token_secret: &str,
        verifier: &str,
    ) -> Result<AccessTokenResponse, OAuthError> {
        let mut params = OAuthParams::new(&consumer.key);
        params.token = Some(token.to_string());
        params.verifier = Some(verifier.to_string());

        let fields = self
            .signed_call(
                Method::POST,
                &self.endpoints.access_token,
                params,
                &consumer.secret,
                token_secret,
            )
            .await?;
        parse_access_response(&fields)
    }
}

/// Decode an `application/x-www-form-urlencoded` body into ordered pairs.
pub fn parse_form_response(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Pull the three fields a credential needs out of an access-token response.
pub fn parse_access_response(
    fields: &[(String, String)],
) -> Result<AccessTokenResponse, OAuthError> {
    Ok(AccessTokenResponse {
        token: required_field(fields, "oauth_token")?,
        note_store_url: required_field(fields, "edam_noteStoreUrl")?,
        user_id: required_field(fields, "edam_userId")?,
    })
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn required_field(fields: &[(String, String)], name: &'static str) -> Result<String, OAuthError> {
    match field(fields, name) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(OAuthError::MissingField(name)),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> OAuthError {
    if err.is_timeout() {
        return OAuthError::Timeout(err.to_string());
    }
    OAuthError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_response_requires_all_three_fields() {
        let fields = parse_form_response(
            b"oauth_token=S%3Ds1%3AU%3D1&oauth_token_secret=&edam_shard=s1&edam_userId=42&edam_noteStoreUrl=https%3A%2F%2Fsandbox.evernote.com%2Fshard%2Fs1%2Fnotestore",
        );
        let access = parse_access_response(&fields).unwrap();
        assert_eq!(access.token, "S=s1:U=1");
        assert_eq!(access.user_id, "42");
        assert_eq!(
            access.note_store_url,
            "https://sandbox.evernote.com/shard/s1/notestore"
        );

        let fields = parse_form_response(b"oauth_token=abc&edam_userId=42");
        assert_eq!(
            parse_access_response(&fields),
            Err(OAuthError::MissingField("edam_noteStoreUrl"))
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let fields = parse_form_response(b"oauth_token=&oauth_token_secret=x");
        assert_eq!(
            required_field(&fields, "oauth_token"),
            Err(OAuthError::MissingField("oauth_token"))
        );
    }
}
