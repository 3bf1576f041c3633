//! The host-facing portfolio plugin.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evernote_core::{
    Credential, ExportConfig, ExportSummary, NoteDraft, NotebookChoices, RemoteUser,
};
use portfolio_logging::{portfolio_debug, portfolio_info, portfolio_warn};

use crate::auth::AuthorizationFlow;
use crate::config::PluginSettings;
use crate::convert::{Converter, EnmlConverter};
use crate::decode::decode_staged_html;
use crate::edam::CreatedNote;
use crate::oauth::{OAuthClient, ReqwestOAuthClient};
use crate::preferences::PreferenceStore;
use crate::store::{StoreFactory, ThriftStoreFactory};
use crate::types::{CallbackParams, ControlOutcome, ExportFormat, ExportStage, StagedFile};
use crate::PortfolioError;

/// Export fields this plugin asks the user for.
pub const EXPORT_CONFIG_FIELDS: [&str; 2] = ["notetitle", "notebooks"];
/// Administrator fields this plugin needs.
pub const ADMIN_CONFIG_FIELDS: [&str; 2] = ["consumerkey", "secret"];
/// Query parameter the host adds to the "sign in as someone else" link.
pub const SIGN_IN_AGAIN_PARAM: &str = "signin";

/// Capability interface a portfolio host drives during an export.
///
/// Defaults mirror what a host assumes for a plugin that does not say otherwise.
#[async_trait]
pub trait PortfolioPlugin: Send + Sync {
    fn supported_formats(&self) -> Vec<ExportFormat>;

    fn has_export_config(&self) -> bool {
        false
    }

    async fn config_form(&self, user_id: &str) -> Result<ExportConfigForm, PortfolioError>;

    fn allowed_export_config(&self) -> &'static [&'static str] {
        &[]
    }

    async fn export_summary(
        &self,
        user_id: &str,
        config: &ExportConfig,
    ) -> Result<ExportSummary, PortfolioError>;

    fn prepare_export(&self) -> Result<(), PortfolioError> {
        Ok(())
    }

    async fn send_export(
        &self,
        user_id: &str,
        config: &ExportConfig,
        files: &[StagedFile],
    ) -> Result<CreatedNote, PortfolioError>;

    fn expected_time(&self, caller_estimate: Duration) -> Duration {
        caller_estimate
    }

    fn has_admin_config(&self) -> bool {
        false
    }

    fn allowed_config(&self) -> &'static [&'static str] {
        &[]
    }

    fn allows_multiple_exports(&self) -> bool {
        true
    }

    fn allows_multiple_instances(&self) -> bool {
        true
    }

    fn sanity_check(&self) -> Result<(), PortfolioError> {
        Ok(())
    }

    /// Called when the host reaches `stage`; the plugin may take the browser away.
    async fn steal_control(
        &self,
        _user_id: &str,
        _stage: ExportStage,
    ) -> Result<ControlOutcome, PortfolioError> {
        Ok(ControlOutcome::Continue)
    }

    /// Called when the browser comes back after [`PortfolioPlugin::steal_control`].
    async fn post_control(
        &self,
        _user_id: &str,
        _stage: ExportStage,
        _params: &CallbackParams,
    ) -> Result<ControlOutcome, PortfolioError> {
        Ok(ControlOutcome::Continue)
    }
}

/// What the host renders on the export configuration page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfigForm {
    pub username: String,
    /// Query parameter for the "sign in as someone else" link.
    pub sign_in_again_param: &'static str,
    /// Prefilled note title.
    pub note_title: String,
    pub notebooks: NotebookChoices,
    /// Fields the host must refuse to submit blank.
    pub required: &'static [&'static str],
}

impl ExportConfigForm {
    pub fn selected_notebook(&self) -> Option<&str> {
        self.notebooks.default_guid.as_deref()
    }

    /// The export config the form submits if the user accepts every default.
    pub fn defaults(&self) -> ExportConfig {
        ExportConfig {
            note_title: self.note_title.clone(),
            notebook_guid: self.selected_notebook().unwrap_or_default().to_string(),
        }
    }
}

/// Pushes the captured page into the user's Evernote account.
pub struct EvernotePortfolio {
    settings: PluginSettings,
    preferences: Arc<dyn PreferenceStore>,
    oauth: Arc<dyn OAuthClient>,
    stores: Arc<dyn StoreFactory>,
    converter: Arc<dyn Converter>,
}

impl EvernotePortfolio {
    pub fn new(
        settings: PluginSettings,
        preferences: Arc<dyn PreferenceStore>,
        oauth: Arc<dyn OAuthClient>,
        stores: Arc<dyn StoreFactory>,
    ) -> Self {
        Self {
            settings,
            preferences,
            oauth,
            stores,
            converter: Arc::new(EnmlConverter),
        }
    }

    /// Wire up the real HTTP clients for `settings`.
    pub fn connect(
        settings: PluginSettings,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, PortfolioError> {
        let oauth = ReqwestOAuthClient::new(settings.endpoints(), &settings.http)?;
        let stores = ThriftStoreFactory::new(&settings.http)?;
        Ok(Self::new(
            settings,
            preferences,
            Arc::new(oauth),
            Arc::new(stores),
        ))
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn authorization(&self, user_id: &str) -> AuthorizationFlow {
        AuthorizationFlow::new(
            user_id,
            self.settings.consumer.clone(),
            Arc::clone(&self.preferences),
            Arc::clone(&self.oauth),
        )
    }

    /// Drop the stored credential so the next export starts a fresh sign-in.
    pub fn sign_in_again(&self, user_id: &str) -> Result<(), PortfolioError> {
        self.authorization(user_id).reset_credential()
    }

    fn session(&self, user_id: &str) -> Result<Credential, PortfolioError> {
        self.authorization(user_id)
            .current_credential()?
            .ok_or(PortfolioError::NoActiveSession)
    }

    async fn remote_user(&self, credential: &Credential) -> Result<RemoteUser, PortfolioError> {
        let user_store = self.stores.user_store(&self.settings.endpoints().user_store)?;
        Ok(user_store.get_user(&credential.access_token).await?)
    }

    async fn notebook_choices(
        &self,
        credential: &Credential,
    ) -> Result<NotebookChoices, PortfolioError> {
        let note_store = self.stores.note_store(&credential.note_store_url)?;
        let notebooks = note_store.list_notebooks(&credential.access_token).await?;
        portfolio_debug!("Listed {} notebooks", notebooks.len());
        Ok(NotebookChoices::from_notebooks(&notebooks))
    }

    /// The page-root HTML file, converted into a draft for `config`.
    pub fn build_draft(
        &self,
        config: &ExportConfig,
        files: &[StagedFile],
    ) -> Result<(NoteDraft, String), PortfolioError> {
        let mut page = None;
        for file in files {
            if file.is_page_root() && file.is_html() {
                page = Some(file);
            } else {
                portfolio_debug!(
                    "Skipping staged file {} ({}); attachments are not exported",
                    file.display_path().display(),
                    file.mime_type
                );
            }
        }
        let page = page.ok_or(PortfolioError::NoHtmlContent)?;

        let decoded = decode_staged_html(&page.content, Some(&page.mime_type));
        portfolio_debug!(
            "Converting {} ({} bytes, {})",
            page.name,
            page.content.len(),
            decoded.encoding_label
        );
        let draft = NoteDraft {
            title: config.note_title.trim().to_string(),
            body_markup: self.converter.to_enml(&decoded.html),
            notebook_guid: config.notebook_guid.clone(),
            resources: Vec::new(),
        };
        Ok((draft, page.name.clone()))
    }
}

#[async_trait]
impl PortfolioPlugin for EvernotePortfolio {
    fn supported_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::PlainHtml]
    }

    fn has_export_config(&self) -> bool {
        true
    }

    async fn config_form(&self, user_id: &str) -> Result<ExportConfigForm, PortfolioError> {
        let credential = self.session(user_id)?;
        let user = self.remote_user(&credential).await?;
        let notebooks = self.notebook_choices(&credential).await?;
        Ok(ExportConfigForm {
            username: user.username,
            sign_in_again_param: SIGN_IN_AGAIN_PARAM,
            note_title: self.settings.default_note_title.clone(),
            notebooks,
            required: &EXPORT_CONFIG_FIELDS,
        })
    }

    fn allowed_export_config(&self) -> &'static [&'static str] {
        &EXPORT_CONFIG_FIELDS
    }

    async fn export_summary(
        &self,
        user_id: &str,
        config: &ExportConfig,
    ) -> Result<ExportSummary, PortfolioError> {
        let credential = self.session(user_id)?;
        let user = self.remote_user(&credential).await?;
        let notebooks = self.notebook_choices(&credential).await?;
        let label = notebooks
            .label_for(&config.notebook_guid)
            .ok_or_else(|| PortfolioError::UnknownNotebook(config.notebook_guid.clone()))?;
        Ok(ExportSummary::new(&user.username, &config.note_title, label))
    }

    async fn send_export(
        &self,
        user_id: &str,
        config: &ExportConfig,
        files: &[StagedFile],
    ) -> Result<CreatedNote, PortfolioError> {
        if let Some(field) = config.missing_field() {
            return Err(PortfolioError::MissingExportField(field));
        }
        let credential = self.session(user_id)?;
        let (draft, file) = self.build_draft(config, files)?;

        let notebooks = self.notebook_choices(&credential).await?;
        if !notebooks.contains(&draft.notebook_guid) {
            return Err(PortfolioError::UnknownNotebook(draft.notebook_guid));
        }

        let note_store = self.stores.note_store(&credential.note_store_url)?;
        match note_store.create_note(&credential.access_token, &draft).await {
            Ok(created) => {
                portfolio_info!(
                    "Created note {} in notebook {} for {}",
                    created.guid,
                    draft.notebook_guid,
                    user_id
                );
                Ok(created)
            }
            Err(err) => {
                portfolio_warn!("createNote failed for {}: {}", file, err);
                Err(PortfolioError::RemoteTransferFailure {
                    file,
                    source: Some(err),
                })
            }
        }
    }

    fn has_admin_config(&self) -> bool {
        true
    }

    fn allowed_config(&self) -> &'static [&'static str] {
        &ADMIN_CONFIG_FIELDS
    }

    fn allows_multiple_exports(&self) -> bool {
        false
    }

    fn allows_multiple_instances(&self) -> bool {
        false
    }

    fn sanity_check(&self) -> Result<(), PortfolioError> {
        self.settings.consumer.ensure_present()
    }

    async fn steal_control(
        &self,
        user_id: &str,
        stage: ExportStage,
    ) -> Result<ControlOutcome, PortfolioError> {
        if stage != ExportStage::Config {
            return Ok(ControlOutcome::Continue);
        }
        let flow = self.authorization(user_id);
        if flow.current_credential()?.is_some() {
            return Ok(ControlOutcome::Continue);
        }
        let request = flow
            .begin_authorization(&self.settings.callback_url)
            .await?;
        Ok(if request.redirect_required {
            ControlOutcome::Redirect(request.authorize_url)
        } else {
            ControlOutcome::Continue
        })
    }

    async fn post_control(
        &self,
        user_id: &str,
        stage: ExportStage,
        params: &CallbackParams,
    ) -> Result<ControlOutcome, PortfolioError> {
        if stage != ExportStage::Config {
            return Ok(ControlOutcome::Continue);
        }
        self.authorization(user_id)
            .complete_authorization(&params.oauth_token, &params.oauth_verifier)
            .await?;
        Ok(ControlOutcome::Continue)
    }
}
