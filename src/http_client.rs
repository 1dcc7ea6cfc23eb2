use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const USER_AGENT: &str = concat!("pitchside/", env!("CARGO_PKG_VERSION"));

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client for the sports API, identity provider and Firestore.
///
/// No request timeout is configured: a slow upstream simply keeps the worker
/// thread waiting, same as every other call site.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}

/// Reads the body and turns any non-2xx status into an error carrying the body.
pub fn read_success_body(resp: reqwest::blocking::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }
    Ok(body)
}
