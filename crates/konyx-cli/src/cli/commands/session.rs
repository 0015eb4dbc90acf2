//! Session inspection and guarded navigation.

use anyhow::Result;
use konyx_core::app::AppContext;
use konyx_core::auth::{FileTokenStore, RouteOutcome, SessionPhase};
use konyx_core::config::StorageMode;
use konyx_core::logging::mask_token;

pub async fn show(app: &AppContext) -> Result<()> {
    let phase = app.start().await;
    let store = app.auth().store();

    match phase {
        SessionPhase::Authenticated(token) => {
            println!("Logged in");
            println!("  token:   {}", mask_token(&token));
            println!("  backend: {}", app.client().base_url());
            println!(
                "  storage: {} ({})",
                app.config().session.storage.display_name(),
                store.describe()
            );
            if app.config().session.storage == StorageMode::File
                && let Ok(Some(record)) = FileTokenStore::default_location().load_record()
            {
                println!(
                    "  saved:   {}",
                    record.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            if let Some(company) = app.company() {
                println!("  company: {company}");
            }
        }
        _ => println!("Not logged in"),
    }
    Ok(())
}

pub async fn open(app: &AppContext, path: &str) -> Result<()> {
    app.start().await;
    match app.navigate(path) {
        RouteOutcome::Rendered {
            path,
            redirected_from: None,
        } => println!("{path}"),
        RouteOutcome::Rendered {
            path,
            redirected_from: Some(from),
        } => println!("{path} (redirected from {from})"),
        RouteOutcome::Suspended { path } => println!("{path} (waiting for session)"),
        RouteOutcome::Blocked { path } => anyhow::bail!("Redirect loop while opening {path}"),
    }
    Ok(())
}
