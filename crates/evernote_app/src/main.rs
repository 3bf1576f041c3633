use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use evernote_engine::{EvernotePortfolio, RonFilePreferenceStore};
use portfolio_logging::portfolio_debug;

mod commands;
mod logging;
mod settings;

use logging::LogDestination;
use settings::{AppSettings, DEFAULT_SETTINGS_FILE};

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Export portfolio pages to Evernote as notes"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Settings file (RON)
    #[clap(long, env = "EVERNOTE_PORTFOLIO_SETTINGS", global = true, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Local user the stored tokens belong to
    #[clap(long, env = "EVERNOTE_PORTFOLIO_USER", global = true, default_value = "default")]
    user: String,

    /// Where log output goes
    #[clap(long, value_enum, global = true, default_value = "terminal")]
    log: LogDestination,

    /// Log file used when --log is file or both
    #[clap(long, global = true, default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Whether to display additional information.
    #[clap(long, global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommands {
    /// Check that consumer credentials are configured
    Check,

    /// Start the OAuth sign-in and print the approval address
    SignIn,

    /// Finish sign-in with the query string Evernote redirected to
    Callback {
        /// e.g. "oauth_token=...&oauth_verifier=..."
        query: String,
    },

    /// Show the stored sign-in state
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List the account's notebooks
    Notebooks {
        #[arg(long)]
        json: bool,
    },

    /// Export an HTML page as a new note
    Push(commands::PushOptions),

    /// Print the ENML a page converts to, without contacting Evernote
    Convert {
        file: PathBuf,
    },

    /// Forget the stored token so the next sign-in starts fresh
    SignOut,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let app = App::parse();
    logging::initialize(app.global.log, app.global.verbose, &app.global.log_file);

    if let SubCommands::Convert { file } = &app.command {
        return commands::convert(file);
    }

    let settings = AppSettings::load(&app.global.settings)?;
    let preferences_path = settings.preferences_path(&app.global.settings);
    portfolio_debug!("Preferences kept in {:?}", preferences_path);

    let plugin = EvernotePortfolio::connect(
        settings.plugin_settings(),
        Arc::new(RonFilePreferenceStore::new(preferences_path)),
    )?;
    let user = app.global.user.as_str();

    match &app.command {
        SubCommands::Check => commands::check(&plugin),
        SubCommands::SignIn => commands::sign_in(&plugin, user).await,
        SubCommands::Callback { query } => commands::callback(&plugin, user, query).await,
        SubCommands::Status { json } => commands::status(&plugin, user, *json),
        SubCommands::Notebooks { json } => commands::notebooks(&plugin, user, *json).await,
        SubCommands::Push(options) => commands::push(&plugin, user, options).await,
        SubCommands::SignOut => commands::sign_out(&plugin, user),
        SubCommands::Convert { file } => commands::convert(file),
    }
}
