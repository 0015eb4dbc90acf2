//! Backend administration commands.

use anyhow::Result;
use comfy_table::{ContentArrangement, Table};
use konyx_core::api::{ApiKeysUpdate, check_new_password};
use konyx_core::app::AppContext;
use konyx_core::logging::mask_token;

use super::enter;

const CONFIG_VIEW: &str = "/dashboard/config";

fn or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

pub async fn status(app: &AppContext) -> Result<()> {
    let token = enter(app, CONFIG_VIEW).await?;
    let status = app.client().admin_status(&token).await?;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["Password".to_string(), mask_token(&status.password)]);
    table.add_row(vec!["Kissoro API key".to_string(), mask_token(&status.api_kissoro)]);
    table.add_row(vec!["En Plural API key".to_string(), mask_token(&status.api_en_plural)]);
    table.add_row(vec!["Groq API key".to_string(), mask_token(&status.api_groq)]);
    table.add_row(vec!["Last export".to_string(), or_dash(&status.ultimo_export)]);
    table.add_row(vec!["Exports".to_string(), status.total_exportaciones.to_string()]);
    table.add_row(vec![
        "Failed exports".to_string(),
        status.total_exportaciones_fallidas.to_string(),
    ]);
    table.add_row(vec![
        "Failed logins".to_string(),
        status.intentos_login_fallidos.to_string(),
    ]);
    println!("{table}");
    Ok(())
}

pub async fn password(app: &AppContext, new_password: &str, confirm: &str) -> Result<()> {
    check_new_password(new_password, confirm)?;
    let token = enter(app, CONFIG_VIEW).await?;
    let message = app
        .client()
        .update_password(&token, new_password, confirm)
        .await?;
    println!("{message}");
    Ok(())
}

pub async fn apis(
    app: &AppContext,
    kissoro: Option<String>,
    en_plural: Option<String>,
    groq: Option<String>,
) -> Result<()> {
    let update = ApiKeysUpdate {
        api_kissoro: kissoro,
        api_en_plural: en_plural,
        api_groq: groq,
    };
    if update.is_empty() {
        anyhow::bail!("Give at least one of --kissoro, --en-plural or --groq");
    }
    let token = enter(app, CONFIG_VIEW).await?;
    let message = app.client().update_api_keys(&token, &update).await?;
    println!("{message}");
    Ok(())
}
