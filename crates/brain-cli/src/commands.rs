use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, info, warn};

use brain_core::api::ApiRequest;
use brain_core::auth::AuthError;
use brain_core::{BrainClient, Config};

use crate::notice::{LoginHint, StderrNotifier};
use crate::ResourceKind;

pub fn build_client(config: &Config) -> Result<BrainClient> {
    BrainClient::from_config(config, Arc::new(StderrNotifier), Arc::new(LoginHint::default()))
}

fn prompt_username(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (true, Some(last)) => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

/// Turn a login failure into something a person can act on
fn login_failure_message(e: &AuthError) -> String {
    match e {
        AuthError::CredentialsRejected(_) => "Invalid username or password".to_string(),
        AuthError::NetworkError(e) if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
        AuthError::NetworkError(_) => "Unable to connect to server. Check the base URL and your network.".to_string(),
        other => format!("Login failed: {}", other),
    }
}

pub async fn login(client: &BrainClient, config: &mut Config, username: Option<String>, remember: bool) -> Result<()> {
    let username = match username.or_else(|| std::env::var("BRAIN_USERNAME").ok()) {
        Some(username) => username,
        None => prompt_username(config.last_username.as_deref())?,
    };
    let password = match std::env::var("BRAIN_PASSWORD") {
        Ok(password) => password,
        Err(_) => prompt_password()?,
    };

    if username.is_empty() || password.is_empty() {
        anyhow::bail!("Username and password required");
    }

    let credentials = config.credentials(&username, &password);
    let remember = remember && config.remember;
    match client.authority().login(&credentials, remember).await {
        Ok(session) => {
            config.last_username = Some(username);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!(
                "Logged in, token valid for {} minutes{}",
                session.minutes_until_expiry(),
                if session.remember { " (auto-renew on)" } else { "" }
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Login failed");
            Err(anyhow::anyhow!(login_failure_message(&e)))
        }
    }
}

pub fn logout(client: &BrainClient) {
    client.authority().logout(None);
    println!("Logged out");
}

pub fn status(client: &BrainClient) {
    let session = client.authority().snapshot();
    if !session.has_token() {
        println!("Not logged in");
        return;
    }

    let user = session
        .identity
        .as_ref()
        .map(|i| i.name.as_str())
        .unwrap_or("unknown");
    println!("User:          {}", user);
    println!(
        "Authenticated: {}",
        if session.is_authenticated() { "yes" } else { "no (expired)" }
    );
    println!("Expires in:    {} min", session.minutes_until_expiry());
    println!("Auto-renew:    {}", if session.remember { "on" } else { "off" });
}

pub async fn renew(client: &BrainClient) -> Result<()> {
    if client.authority().ensure_fresh(true).await {
        println!(
            "Token valid for {} minutes",
            client.authority().snapshot().minutes_until_expiry()
        );
        Ok(())
    } else {
        anyhow::bail!("No usable session - run `brainctl login`")
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn list(client: &BrainClient, kind: ResourceKind) -> Result<()> {
    if !client.authority().guard_protected().await {
        anyhow::bail!("Not logged in");
    }

    let resources = client.resources();
    match kind {
        ResourceKind::Images => print_json(&resources.list_images().await?),
        ResourceKind::MvServers => print_json(&resources.list_mv_servers().await?),
        ResourceKind::BareMetals => print_json(&resources.list_bare_metals().await?),
        ResourceKind::SystemDisks => print_json(&resources.list_system_disks().await?),
        ResourceKind::Networks => print_json(&resources.list_interfaces().await?),
    }
}

pub async fn get(client: &BrainClient, path: &str) -> Result<()> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    let value: Value = client
        .pipeline()
        .request(ApiRequest::get(path.as_str()))
        .await
        .with_context(|| format!("GET {} failed", path))?;
    print_json(&value)
}

pub async fn watch(client: &BrainClient, config: &Config) -> Result<()> {
    if !client.authority().has_token() {
        anyhow::bail!("Not logged in");
    }

    let timer = client.start_renewal_timer(config);
    println!(
        "Keeping session alive (check every {}s), Ctrl-C to stop",
        config.renewal_check_interval().as_secs()
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    timer.abort();
    info!("Watch stopped");
    Ok(())
}
