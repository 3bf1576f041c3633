//! Evernote portfolio engine: ENML conversion, OAuth, remote stores and the plugin itself.
mod auth;
mod config;
mod convert;
mod decode;
mod edam;
mod oauth;
mod persist;
mod plugin;
mod preferences;
mod sanitize;
mod signature;
mod store;
mod thrift;
mod types;

pub use auth::AuthorizationFlow;
pub use config::{
    ConsumerCredentials, Environment, HttpSettings, PluginSettings, ServiceEndpoints,
    DEFAULT_NOTE_TITLE, PRODUCTION_API_ROOT, SANDBOX_API_ROOT,
};
pub use convert::{note_body, wrap_note, Converter, EnmlConverter, ENML_DOCTYPE, ENML_PROLOG};
pub use decode::{decode_staged_html, DecodedPage};
pub use edam::{CreatedNote, EdamErrorCode, EdamException};
pub use oauth::{
    parse_access_response, parse_form_response, AccessTokenResponse, OAuthClient, OAuthError,
    ReqwestOAuthClient, RequestToken,
};
pub use persist::{ensure_parent_dir, AtomicFile, PersistError};
pub use plugin::{
    EvernotePortfolio, ExportConfigForm, PortfolioPlugin, ADMIN_CONFIG_FIELDS,
    EXPORT_CONFIG_FIELDS, SIGN_IN_AGAIN_PARAM,
};
pub use preferences::{
    preference_name, MemoryPreferenceStore, PreferenceError, PreferenceStore,
    RonFilePreferenceStore,
};
pub use sanitize::{is_allowed_tag, is_disallowed_attribute, ALLOWED_TAGS, DISALLOWED_ATTRIBUTES};
pub use signature::{sign_hmac_sha1, signature_base_string, OAuthParams};
pub use store::{
    resolve_store_url, NoteStore, StoreError, StoreFactory, ThriftHttpTransport, ThriftNoteStore,
    ThriftStoreFactory, ThriftUserStore, UserStore,
};
pub use thrift::{MessageType, TType, ThriftError, ThriftReader, ThriftWriter};
pub use types::{
    CallbackParams, ControlOutcome, ExportFormat, ExportStage, PortfolioError, StagedFile,
};
