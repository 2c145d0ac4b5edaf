use anyhow::Result;

use crate::config::Config;

/// Checks that the configured search service answers its root endpoint.
pub async fn healthcheck(config: &Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.target.connect_timeout)
        .build()?;
    let url = &config.target.url;

    tracing::debug!("sending healthcheck request to {}", url);
    let mut request = client.get(url);
    if let Some(credentials) = config.target.credentials() {
        request = credentials.apply(request);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Bad Status: {}", response.status());
    }

    tracing::info!("OK");
    Ok(())
}
