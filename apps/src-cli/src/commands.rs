use std::io::Write;

use srclib_auth::{Credential, CredentialStore, FileCredentialStore, resolve_credential, resolve_ticket};
use srclib_client::{ClientConfig, new_client_with_stored_auth_if_present, resolve_endpoint};

/// Print the resolved endpoint, the credential UID (if any) and whether a ticket is set.
pub fn endpoint(config: &ClientConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let endpoint = resolve_endpoint(&config.env)?;
    let credential = resolve_credential(&config.env, config.store.as_ref(), &endpoint)?;

    writeln!(out, "endpoint: {endpoint}")?;
    match credential {
        Some(credential) => writeln!(out, "auth: UID {}", credential.uid())?,
        None => writeln!(out, "auth: none")?,
    }
    if resolve_ticket(&config.env).is_some() {
        writeln!(out, "ticket: SRCLIB_TICKET")?;
    }
    Ok(())
}

pub async fn get(config: &ClientConfig, path: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let api = new_client_with_stored_auth_if_present(config)?;
    let response = api.get(path)?.send().await?;
    if response.is_from_cache() {
        tracing::debug!(path, "served from HTTP cache");
    }

    let body = response.error_for_status()?.bytes().await?;
    out.write_all(&body)?;
    if !body.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}

pub fn login(
    config: &ClientConfig,
    store: &FileCredentialStore,
    credential: Credential,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let endpoint = resolve_endpoint(&config.env)?;
    let uid = credential.uid();

    let mut credentials = store.load()?;
    credentials.insert(endpoint.to_string(), credential);
    store.save(&credentials)?;

    tracing::debug!(endpoint = %endpoint, uid, path = %store.path().display(), "stored credential");
    writeln!(out, "Logged in to {endpoint} as UID {uid}.")?;
    Ok(())
}

pub fn logout(
    config: &ClientConfig,
    store: &FileCredentialStore,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let endpoint = resolve_endpoint(&config.env)?;

    let mut credentials = store.load()?;
    if credentials.remove(endpoint.as_str()).is_none() {
        writeln!(out, "No credential stored for {endpoint}.")?;
        return Ok(());
    }
    store.save(&credentials)?;

    writeln!(out, "Logged out of {endpoint}.")?;
    Ok(())
}
