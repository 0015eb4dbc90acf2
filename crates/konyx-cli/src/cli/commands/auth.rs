//! Login and logout.

use std::io::{IsTerminal, Read};

use anyhow::{Context, Result, bail};
use konyx_core::app::AppContext;
use konyx_core::auth::{Credentials, LoginOutcome};

fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    if std::io::stdin().is_terminal() {
        bail!("Password required: pass --password, set KONYX_PASSWORD or pipe it on stdin");
    }
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_to_string(&mut password)
        .context("read password from stdin")?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn login(app: &AppContext, username: &str, password: Option<String>) -> Result<()> {
    let credentials = Credentials::new(username, read_password(password)?);

    app.start().await;
    app.navigate(app.config().routes.login_path());

    match app.login(&credentials).await? {
        LoginOutcome::LoggedIn => {
            println!("Logged in as {}", username.trim());
            Ok(())
        }
        LoginOutcome::Ignored => bail!("Login was not applied: another login is in progress"),
    }
}

pub fn logout(app: &AppContext) -> Result<()> {
    app.logout().context("clear session")?;
    println!("Logged out");
    Ok(())
}
