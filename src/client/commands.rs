//! CLI command implementations on top of `GatewayClient`

use super::GatewayClient;
use crate::config::ClientConfig;
use crate::qr;
use crate::session::SessionState;
use anyhow::{bail, Result};
use std::time::Duration;

pub async fn create(client: &GatewayClient, name: &str, id: Option<&str>) -> Result<()> {
    let response = client.create(name, id).await?;
    println!("{}", response.connection_id);
    tracing::info!("{}", response.message);
    Ok(())
}

pub async fn list(client: &GatewayClient) -> Result<()> {
    let connections = client.connections().await?;
    if connections.is_empty() {
        println!("No connections");
        return Ok(());
    }

    println!("{:<32} {:<20} {:<18} PHONE", "ID", "NAME", "STATUS");
    for conn in connections {
        println!(
            "{:<32} {:<20} {:<18} {}",
            conn.id,
            conn.name,
            conn.status.as_str(),
            conn.phone_number.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn status(client: &GatewayClient, id: &str) -> Result<()> {
    let status = client.status(id).await?;
    println!("connection: {}", status.connection_id);
    println!("name:       {}", status.name);
    println!("status:     {}", status.status);
    println!(
        "phone:      {}",
        status.phone_number.as_deref().unwrap_or("-")
    );
    println!("qr ready:   {}", if status.has_qr_code { "yes" } else { "no" });
    Ok(())
}

pub async fn show_qr(client: &GatewayClient, id: &str, data_url: bool) -> Result<()> {
    if data_url {
        println!("{}", client.qr_image(id).await?);
        return Ok(());
    }

    match client.qr_payload(id).await? {
        Some(payload) => println!("{}", qr::render_terminal(&payload)?),
        None => println!("No QR code available for {} yet", id),
    }
    Ok(())
}

pub async fn send(client: &GatewayClient, id: &str, to: &str, message: &str) -> Result<()> {
    let response = client.send(id, to, message).await?;
    println!("{}", response.message);
    Ok(())
}

pub async fn disconnect(client: &GatewayClient, id: &str) -> Result<()> {
    let response = client.disconnect(id).await?;
    println!("{}", response.message);
    Ok(())
}

pub async fn refresh(client: &GatewayClient, id: &str) -> Result<()> {
    let response = client.refresh(id).await?;
    println!("{}", response.message);
    Ok(())
}

pub async fn pair(client: &GatewayClient, id: &str, phone: &str) -> Result<()> {
    let response = client.simulate_pair(id, phone).await?;
    println!("{}", response.message);
    Ok(())
}

/// Poll until the connection is paired, printing each new QR code
pub async fn watch(client: &GatewayClient, id: &str, config: &ClientConfig) -> Result<()> {
    let interval = Duration::from_secs(config.poll_interval_secs.max(1));
    let mut last_payload: Option<String> = None;

    for attempt in 1..=config.max_poll_attempts {
        let status = client.status(id).await?;
        match status.status {
            SessionState::Connected => {
                println!(
                    "Connected as {}",
                    status.phone_number.as_deref().unwrap_or("unknown number")
                );
                return Ok(());
            }
            SessionState::Disconnected => bail!("Connection {} was disconnected", id),
            SessionState::AwaitingPairing => {
                if let Some(payload) = client.qr_payload(id).await? {
                    if last_payload.as_deref() != Some(payload.as_str()) {
                        println!("{}", qr::render_terminal(&payload)?);
                        println!("Scan with WhatsApp > Linked devices");
                        last_payload = Some(payload);
                    }
                }
            }
            SessionState::Connecting => {
                tracing::debug!("Attempt {}: waiting for QR code", attempt);
            }
        }

        tokio::time::sleep(interval).await;
    }

    bail!(
        "Timed out waiting for {} after {} attempts",
        id,
        config.max_poll_attempts
    )
}
