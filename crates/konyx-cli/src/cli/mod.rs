//! CLI entry and dispatch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use konyx_core::app::AppContext;
use konyx_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "konyx")]
#[command(version)]
#[command(about = "Konyx invoicing admin client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long, env = "KONYX_USERNAME")]
        username: String,

        /// Read from stdin when omitted
        #[arg(short, long, env = "KONYX_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Show the current session
    Session,

    /// Navigate to a view path through the route guard
    Open {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// List companies
    Companies {
        /// Company id to use for invoice requests
        #[arg(long, value_name = "ID")]
        select: Option<String>,
    },

    /// List invoices of the selected company
    Invoices,

    /// Run and follow invoice exports
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },

    /// Backend administration
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ExportCommands {
    /// Follow the export progress stream until it ends
    Watch {
        /// Download the produced file into this directory
        #[arg(long, value_name = "DIR")]
        download: Option<PathBuf>,
    },
    /// Upload the input spreadsheets and start an export
    Start {
        #[command(flatten)]
        args: commands::export::StartArgs,
    },
    /// Download a produced export file
    Download {
        #[arg(value_name = "FILE")]
        file: String,

        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
    /// Reset the backend export state
    Reset,
}

#[derive(clap::Subcommand)]
enum AdminCommands {
    /// Show backend status and counters
    Status,
    /// Change the backend password
    Password {
        #[arg(long = "new", value_name = "PASSWORD")]
        new_password: String,

        #[arg(long, value_name = "PASSWORD")]
        confirm: String,
    },
    /// Rotate integration API keys
    Apis {
        #[arg(long, value_name = "KEY")]
        kissoro: Option<String>,

        #[arg(long = "en-plural", value_name = "KEY")]
        en_plural: Option<String>,

        #[arg(long, value_name = "KEY")]
        groq: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    let _log_guard =
        logging::init(config.log_file.as_deref().map(Path::new)).context("initialize logging")?;

    match cli.command {
        // config commands must work even when the backend URL is broken
        Commands::Config { command } => run_config(&command),
        command => {
            let app = AppContext::new(config).context("create app context")?;
            dispatch_app(&app, command).await
        }
    }
}

fn run_config(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            commands::config::path();
            Ok(())
        }
        ConfigCommands::Init => commands::config::init(),
    }
}

async fn dispatch_app(app: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Login { username, password } => {
            commands::auth::login(app, &username, password).await
        }
        Commands::Logout => commands::auth::logout(app),
        Commands::Session => commands::session::show(app).await,
        Commands::Open { path } => commands::session::open(app, &path).await,
        Commands::Companies { select } => {
            commands::companies::list(app, select.as_deref()).await
        }
        Commands::Invoices => commands::companies::invoices(app).await,
        Commands::Export { command } => match command {
            ExportCommands::Watch { download } => {
                commands::export::watch(app, download.as_deref()).await
            }
            ExportCommands::Start { args } => commands::export::start(app, &args).await,
            ExportCommands::Download { file, dir } => {
                commands::export::download(app, &file, &dir).await
            }
            ExportCommands::Reset => commands::export::reset(app).await,
        },
        Commands::Admin { command } => match command {
            AdminCommands::Status => commands::admin::status(app).await,
            AdminCommands::Password {
                new_password,
                confirm,
            } => commands::admin::password(app, &new_password, &confirm).await,
            AdminCommands::Apis {
                kissoro,
                en_plural,
                groq,
            } => commands::admin::apis(app, kissoro, en_plural, groq).await,
        },
        Commands::Config { command } => run_config(&command),
    }
}
