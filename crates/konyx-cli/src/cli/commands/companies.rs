//! Companies and invoices.

use anyhow::{Context, Result, bail};
use comfy_table::{ContentArrangement, Table};
use konyx_core::app::AppContext;
use konyx_core::config::Config;

use super::enter;

const DASHBOARD: &str = "/dashboard";

pub async fn list(app: &AppContext, select: Option<&str>) -> Result<()> {
    let token = enter(app, DASHBOARD).await?;
    let companies = app.client().companies(&token).await?;

    let selected = match select.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => {
            if !companies.iter().any(|c| c.id == id) {
                bail!("Unknown company: {id}");
            }
            Config::save_company(id).context("save selected company")?;
            Some(id)
        }
        None => app.company(),
    };

    if companies.is_empty() {
        println!("No companies found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "ID", "Name"]);
    for company in &companies {
        let marker = if Some(company.id.as_str()) == selected { "*" } else { "" };
        table.add_row(vec![marker, company.id.as_str(), company.name.as_str()]);
    }
    println!("{table}");
    Ok(())
}

pub async fn invoices(app: &AppContext) -> Result<()> {
    let token = enter(app, DASHBOARD).await?;

    // first listed company when none was picked
    let company = match app.company() {
        Some(company) => Some(company.to_string()),
        None => app
            .client()
            .companies(&token)
            .await?
            .into_iter()
            .next()
            .map(|c| c.id),
    };

    let invoices = app.client().invoices(&token, company.as_deref()).await?;
    if invoices.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Number", "Total"]);
    for invoice in &invoices {
        table.add_row(vec![
            invoice.id.clone(),
            invoice.number.clone(),
            format!("{:.2}", invoice.total),
        ]);
    }
    println!("{table}");
    Ok(())
}
