//! Evernote portfolio core: data model and the pure authorization state machine.
mod effect;
mod model;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use model::{
    AuthorizationRequest, Credential, ExportConfig, NoteDraft, Notebook, RemoteUser, Resource,
    ResourceAttributes, CREDENTIAL_FIELDS, PREFERENCE_PREFIX,
};
pub use msg::Msg;
pub use state::{AuthState, StoredAuth};
pub use update::update;
pub use view_model::{ExportSummary, NotebookChoices, DEFAULT_NOTEBOOK_SUFFIX};
