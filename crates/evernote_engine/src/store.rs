//! Thrift-over-HTTP clients for the user store and note store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use evernote_core::{NoteDraft, Notebook, RemoteUser};
use portfolio_logging::portfolio_debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use url::Url;

use crate::config::HttpSettings;
use crate::edam::{
    read_created_note, read_notebook_list, read_result, read_user, write_note, CallResult,
    CreatedNote, EdamErrorCode, EdamException,
};
use crate::thrift::{read_reply_header, MessageType, TType, ThriftError, ThriftReader, ThriftWriter};

const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("store returned http status {0}")]
    HttpStatus(u16),
    #[error("store request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed store reply: {0}")]
    Thrift(#[from] ThriftError),
    #[error("{method} failed: {exception}")]
    Remote {
        method: &'static str,
        exception: EdamException,
    },
    #[error("{0} returned no result")]
    MissingResult(&'static str),
}

impl StoreError {
    /// EDAM error code carried by a user or system exception.
    pub fn error_code(&self) -> Option<EdamErrorCode> {
        match self {
            StoreError::Remote {
                exception: EdamException::User { code, .. } | EdamException::System { code, .. },
                ..
            } => Some(*code),
            _ => None,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, token: &str) -> Result<RemoteUser, StoreError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_notebooks(&self, token: &str) -> Result<Vec<Notebook>, StoreError>;
    async fn create_note(&self, token: &str, draft: &NoteDraft)
        -> Result<CreatedNote, StoreError>;
}

/// Hands out store clients for a given endpoint URL.
pub trait StoreFactory: Send + Sync {
    fn user_store(&self, url: &str) -> Result<Arc<dyn UserStore>, StoreError>;
    fn note_store(&self, url: &str) -> Result<Arc<dyn NoteStore>, StoreError>;
}

/// Normalize a store URL so equivalent spellings share one client.
///
/// A missing port becomes the scheme's default (443 for https, 80 for http).
pub fn resolve_store_url(url: &str) -> Result<Url, StoreError> {
    let invalid = |message: String| StoreError::InvalidUrl {
        url: url.to_string(),
        message,
    };
    let mut parsed = Url::parse(url).map_err(|err| invalid(err.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if parsed.port_or_known_default().is_none() {
        return Err(invalid(format!("no default port for {}", parsed.scheme())));
    }
    parsed.set_fragment(None);
    Ok(parsed)
}

/// `Url` omits default ports, so the key spells the port out.
fn cache_key(url: &Url) -> String {
    let port = url.port_or_known_default().unwrap_or_default();
    format!(
        "{}://{}:{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        port,
        url.path()
    )
}

/// One Thrift endpoint reached by HTTP POST.
#[derive(Debug, Clone)]
pub struct ThriftHttpTransport {
    client: reqwest::Client,
    url: Url,
}

impl ThriftHttpTransport {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send one call and return the raw reply bytes.
    async fn call(
        &self,
        method: &'static str,
        write_args: impl FnOnce(&mut ThriftWriter),
    ) -> Result<Vec<u8>, StoreError> {
        let mut writer = ThriftWriter::new();
        writer.write_message_begin(method, MessageType::Call, 0);
        write_args(&mut writer);
        writer.write_field_stop();

        portfolio_debug!("Thrift call {} -> {}", method, self.url);
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, THRIFT_CONTENT_TYPE)
            .header(ACCEPT, THRIFT_CONTENT_TYPE)
            .body(writer.freeze())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(body.to_vec())
    }
}

/// Decode a reply envelope and its result struct, surfacing declared exceptions.
fn decode_reply<T>(
    method: &'static str,
    bytes: &[u8],
    read_success: impl FnMut(&mut ThriftReader<'_>, TType) -> Result<T, ThriftError>,
) -> Result<T, StoreError> {
    let mut reader = ThriftReader::new(bytes);
    read_reply_header(&mut reader, method)?;
    match read_result(&mut reader, read_success)? {
        CallResult::Success(value) => Ok(value),
        CallResult::Exception(exception) => Err(StoreError::Remote { method, exception }),
        CallResult::Empty => Err(StoreError::MissingResult(method)),
    }
}

fn expect_type(found: TType, expected: TType) -> Result<(), ThriftError> {
    if found == expected {
        Ok(())
    } else {
        Err(ThriftError::UnknownType(found as u8))
    }
}

#[derive(Debug, Clone)]
pub struct ThriftUserStore {
    transport: ThriftHttpTransport,
}

impl ThriftUserStore {
    pub fn new(transport: ThriftHttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl UserStore for ThriftUserStore {
    async fn get_user(&self, token: &str) -> Result<RemoteUser, StoreError> {
        const METHOD: &str = "getUser";
        let reply = self
            .transport
            .call(METHOD, |w| w.write_string_field(1, token))
            .await?;
        decode_reply(METHOD, &reply, |reader, ttype| {
            expect_type(ttype, TType::Struct)?;
            read_user(reader)
        })
    }
}

#[derive(Debug, Clone)]
pub struct ThriftNoteStore {
    transport: ThriftHttpTransport,
}

impl ThriftNoteStore {
    pub fn new(transport: ThriftHttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl NoteStore for ThriftNoteStore {
    async fn list_notebooks(&self, token: &str) -> Result<Vec<Notebook>, StoreError> {
        const METHOD: &str = "listNotebooks";
        let reply = self
            .transport
            .call(METHOD, |w| w.write_string_field(1, token))
            .await?;
        decode_reply(METHOD, &reply, |reader, ttype| {
            expect_type(ttype, TType::List)?;
            read_notebook_list(reader)
        })
    }

    async fn create_note(
        &self,
        token: &str,
        draft: &NoteDraft,
    ) -> Result<CreatedNote, StoreError> {
        const METHOD: &str = "createNote";
        let reply = self
            .transport
            .call(METHOD, |w| {
                w.write_string_field(1, token);
                w.write_field_begin(TType::Struct, 2);
                write_note(w, draft);
            })
            .await?;
        decode_reply(METHOD, &reply, |reader, ttype| {
            expect_type(ttype, TType::Struct)?;
            read_created_note(reader)
        })
    }
}

/// Builds Thrift store clients lazily and keeps one per resolved endpoint.
pub struct ThriftStoreFactory {
    client: reqwest::Client,
    user_stores: Mutex<HashMap<String, Arc<ThriftUserStore>>>,
    note_stores: Mutex<HashMap<String, Arc<ThriftNoteStore>>>,
}

impl ThriftStoreFactory {
    pub fn new(settings: &HttpSettings) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| StoreError::Network(err.to_string()))?;
        Ok(Self {
            client,
            user_stores: Mutex::new(HashMap::new()),
            note_stores: Mutex::new(HashMap::new()),
        })
    }

    fn memoized<T>(
        &self,
        cache: &Mutex<HashMap<String, Arc<T>>>,
        url: &str,
        build: impl FnOnce(ThriftHttpTransport) -> T,
    ) -> Result<Arc<T>, StoreError> {
        let resolved = resolve_store_url(url)?;
        let key = cache_key(&resolved);
        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        let store = cache.entry(key).or_insert_with(|| {
            portfolio_debug!("Creating store client for {}", resolved);
            Arc::new(build(ThriftHttpTransport::new(
                self.client.clone(),
                resolved.clone(),
            )))
        });
        Ok(Arc::clone(store))
    }
}

impl StoreFactory for ThriftStoreFactory {
    fn user_store(&self, url: &str) -> Result<Arc<dyn UserStore>, StoreError> {
        let store = self.memoized(&self.user_stores, url, ThriftUserStore::new)?;
        Ok(store)
    }

    fn note_store(&self, url: &str) -> Result<Arc<dyn NoteStore>, StoreError> {
        let store = self.memoized(&self.note_stores, url, ThriftNoteStore::new)?;
        Ok(store)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        return StoreError::Timeout(err.to_string());
    }
    StoreError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_are_filled_in() {
        let https = resolve_store_url("https://sandbox.evernote.com/shard/s1/notestore").unwrap();
        assert_eq!(cache_key(&https), "https://sandbox.evernote.com:443/shard/s1/notestore");
        let http = resolve_store_url("http://localhost/edam/user").unwrap();
        assert_eq!(cache_key(&http), "http://localhost:80/edam/user");
        let explicit = resolve_store_url("http://127.0.0.1:9000/edam/user").unwrap();
        assert_eq!(cache_key(&explicit), "http://127.0.0.1:9000/edam/user");
    }

    #[test]
    fn urls_without_host_are_rejected() {
        assert!(matches!(
            resolve_store_url("not a url"),
            Err(StoreError::InvalidUrl { .. })
        ));
        assert!(matches!(
            resolve_store_url("data:text/plain,hi"),
            Err(StoreError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn equivalent_urls_share_a_client() {
        let factory = ThriftStoreFactory::new(&HttpSettings::default()).unwrap();
        let first = factory
            .note_store("https://sandbox.evernote.com/shard/s1/notestore")
            .unwrap();
        let second = factory
            .note_store("https://sandbox.evernote.com:443/shard/s1/notestore")
            .unwrap();
        let other = factory
            .note_store("https://sandbox.evernote.com/shard/s2/notestore")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
