//! Export commands.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use comfy_table::{ContentArrangement, Table};
use konyx_core::app::AppContext;
use konyx_core::export::{self, ConnectionState, ExportRequest, ExportSession};

use super::enter;

const EXPORT_VIEW: &str = "/dashboard/export";

#[derive(clap::Args, Debug, Clone)]
pub struct StartArgs {
    /// Input format of the spreadsheets
    #[arg(long = "import-format", value_name = "FORMAT")]
    formato_import: String,

    /// Output format (holded, gestoria)
    #[arg(long = "export-format", value_name = "FORMAT")]
    formato_export: String,

    /// Company name written into the export
    #[arg(long = "company", value_name = "NAME")]
    empresa: String,

    /// Invoice date
    #[arg(long = "date", value_name = "DATE")]
    fecha_factura: String,

    #[arg(long = "project", value_name = "PROJECT", default_value = "")]
    proyecto: String,

    /// Ledger account
    #[arg(long = "account", value_name = "ACCOUNT", default_value = "")]
    cuenta: String,

    #[arg(long = "user", value_name = "USER")]
    usuario: String,

    /// Sessions spreadsheet
    #[arg(long, value_name = "FILE")]
    sessions: PathBuf,

    /// Contacts spreadsheet
    #[arg(long, value_name = "FILE")]
    contacts: PathBuf,
}

impl From<&StartArgs> for ExportRequest {
    fn from(args: &StartArgs) -> Self {
        ExportRequest {
            formato_import: args.formato_import.clone(),
            formato_export: args.formato_export.clone(),
            empresa: args.empresa.clone(),
            fecha_factura: args.fecha_factura.clone(),
            proyecto: args.proyecto.clone(),
            cuenta: args.cuenta.clone(),
            usuario: args.usuario.clone(),
            sessions_file: args.sessions.clone(),
            contacts_file: args.contacts.clone(),
        }
    }
}

fn print_changes(session: &ExportSession) {
    if session.changes.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Column", "Original", "Corrected"]);
    for change in &session.changes {
        table.add_row(vec![
            change.column.as_str(),
            change.original_value.as_str(),
            change.corrected_value.as_str(),
        ]);
    }
    println!("{table}");
}

pub async fn watch(app: &AppContext, download_dir: Option<&Path>) -> Result<()> {
    enter(app, EXPORT_VIEW).await?;

    let subscription = app.mount_export();
    let mut rx = subscription.subscribe();
    let mut printed = 0;

    let session = loop {
        let session = rx.borrow_and_update().clone();
        for line in session.logs.iter().skip(printed) {
            println!("{line}");
        }
        printed = session.logs.len();

        if !session.is_streaming() || rx.changed().await.is_err() {
            break session;
        }
    };

    print_changes(&session);
    if session.dropped_events > 0 {
        tracing::debug!(dropped = session.dropped_events, "malformed export events skipped");
    }

    if let ConnectionState::Failed(reason) = &session.connection {
        bail!("Export progress stream closed: {reason}");
    }

    match session.download_target() {
        Some(file) => {
            println!("Export finished: {file}");
            if let Some(dir) = download_dir {
                let dest = subscription.download(dir).await?;
                println!("Saved {}", dest.display());
            }
        }
        None => println!("Export finished without a file"),
    }
    Ok(())
}

pub async fn start(app: &AppContext, args: &StartArgs) -> Result<()> {
    let token = enter(app, EXPORT_VIEW).await?;
    let started = export::start_export(app.client(), &token, &args.into()).await?;

    match started.file {
        Some(file) => println!("Export started: {file}"),
        None => println!(
            "Export started ({})",
            started.status.as_deref().unwrap_or("ok")
        ),
    }
    Ok(())
}

pub async fn download(app: &AppContext, file: &str, dir: &Path) -> Result<()> {
    enter(app, EXPORT_VIEW).await?;
    let dest = export::download_file(app.client(), file, dir).await?;
    println!("Saved {}", dest.display());
    Ok(())
}

pub async fn reset(app: &AppContext) -> Result<()> {
    enter(app, EXPORT_VIEW).await?;
    if let Err(err) = export::reset_backend(app.client()).await {
        tracing::warn!("export reset request failed: {err}");
        println!("Backend did not confirm the reset");
        return Ok(());
    }
    println!("Export state reset");
    Ok(())
}
