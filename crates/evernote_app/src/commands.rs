use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use evernote_core::{AuthState, ExportConfig};
use evernote_engine::{
    CallbackParams, ControlOutcome, Converter, EnmlConverter, EvernotePortfolio, ExportStage,
    PortfolioPlugin, StagedFile,
};
use portfolio_logging::{portfolio_debug, portfolio_info, redact};

/// Options for `push`.
#[derive(Debug, Clone, clap::Args)]
pub struct PushOptions {
    /// HTML file to export as the page body
    pub file: PathBuf,

    /// Note title (defaults to the configured title)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Notebook GUID (defaults to the account's default notebook)
    #[arg(short, long)]
    pub notebook: Option<String>,

    /// Show the export summary and stop without creating the note
    #[arg(long)]
    pub dry_run: bool,
}

pub fn check(plugin: &EvernotePortfolio) -> Result<()> {
    plugin.sanity_check()?;
    println!(
        "Configuration ok; API root {}",
        plugin.settings().environment.api_root()
    );
    Ok(())
}

pub async fn sign_in(plugin: &EvernotePortfolio, user: &str) -> Result<()> {
    plugin.sanity_check()?;
    match plugin.steal_control(user, ExportStage::Config).await? {
        ControlOutcome::Redirect(url) => {
            println!("Open this address to approve access, then run `callback` with the query string it returns:");
            println!("{url}");
        }
        ControlOutcome::Continue => {
            let state = plugin.authorization(user).state()?;
            if state == AuthState::Authenticated {
                println!("Already signed in; use `sign-out` to switch accounts.");
            } else {
                println!("A sign-in is already pending; finish it with `callback`.");
            }
        }
    }
    Ok(())
}

pub async fn callback(plugin: &EvernotePortfolio, user: &str, query: &str) -> Result<()> {
    let params = CallbackParams::from_query(query);
    portfolio_debug!(
        "Callback for {} with token {}",
        user,
        redact(&params.oauth_token)
    );
    plugin
        .post_control(user, ExportStage::Config, &params)
        .await?;
    println!("Signed in.");
    Ok(())
}

pub fn status(plugin: &EvernotePortfolio, user: &str, json: bool) -> Result<()> {
    let flow = plugin.authorization(user);
    let state = flow.state()?;
    let credential = flow.current_credential()?;
    if json {
        let value = serde_json::json!({
            "user": user,
            "state": format!("{state:?}"),
            "remote_user_id": credential.as_ref().map(|c| c.user_id.clone()),
            "note_store_url": credential.as_ref().map(|c| c.note_store_url.clone()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("State: {state:?}");
    if let Some(credential) = credential {
        println!("Remote user id: {}", credential.user_id);
        println!("Note store: {}", credential.note_store_url);
        println!("Access token: {}", redact(&credential.access_token));
    }
    Ok(())
}

pub async fn notebooks(plugin: &EvernotePortfolio, user: &str, json: bool) -> Result<()> {
    let form = plugin.config_form(user).await?;
    if json {
        let notebooks: Vec<_> = form
            .notebooks
            .options
            .iter()
            .map(|(guid, label)| {
                serde_json::json!({
                    "guid": guid,
                    "label": label,
                    "default": form.selected_notebook() == Some(guid.as_str()),
                })
            })
            .collect();
        let value = serde_json::json!({
            "username": form.username,
            "note_title": form.note_title,
            "notebooks": notebooks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!(
        "Evernote user: {} (run `sign-out` to sign in as someone else)",
        form.username
    );
    for (guid, label) in &form.notebooks.options {
        println!("  {guid}  {label}");
    }
    Ok(())
}

pub async fn push(plugin: &EvernotePortfolio, user: &str, options: &PushOptions) -> Result<()> {
    let page = staged_page(&options.file)?;

    let form = plugin.config_form(user).await?;
    let mut config: ExportConfig = form.defaults();
    if let Some(title) = &options.title {
        config.note_title = title.clone();
    }
    if let Some(notebook) = &options.notebook {
        config.notebook_guid = notebook.clone();
    }
    if config.notebook_guid.is_empty() {
        bail!("the account has no default notebook; pass --notebook");
    }

    let summary = plugin.export_summary(user, &config).await?;
    for (label, value) in &summary.rows {
        println!("{label}: {value}");
    }
    if options.dry_run {
        return Ok(());
    }

    plugin.prepare_export()?;
    let created = plugin.send_export(user, &config, &[page]).await?;
    portfolio_info!("Exported {:?} as note {}", options.file, created.guid);
    println!("Created note {}", created.guid);
    Ok(())
}

pub fn sign_out(plugin: &EvernotePortfolio, user: &str) -> Result<()> {
    plugin.sign_in_again(user)?;
    println!("Signed out.");
    Ok(())
}

/// Offline conversion, for checking what a page will look like as ENML.
pub fn convert(file: &Path) -> Result<()> {
    let page = staged_page(file)?;
    let decoded = evernote_engine::decode_staged_html(&page.content, Some(&page.mime_type));
    println!("{}", EnmlConverter.to_enml(&decoded.html));
    Ok(())
}

fn staged_page(file: &Path) -> Result<StagedFile> {
    let content = fs::read(file).with_context(|| format!("reading {file:?}"))?;
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page.html".to_string());
    Ok(StagedFile::new("/", name, "text/html", content))
}
