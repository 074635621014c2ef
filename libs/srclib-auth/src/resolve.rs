use url::Url;

use crate::env::{EnvSnapshot, SRC_KEY, SRC_UID, SRCLIB_TICKET};
use crate::error::CredentialError;
use crate::store::CredentialStore;
use crate::types::{Credential, Ticket};

/// Find the credential to use for `endpoint`.
///
/// `SRC_UID` and `SRC_KEY`, when both are set, win and the store is not
/// read. Otherwise the store entry keyed by `endpoint.as_str()` is used.
/// `Ok(None)` means the client runs unauthenticated.
///
/// # Errors
/// - [`CredentialError::InvalidUid`] if `SRC_UID` is not an integer
/// - [`CredentialError::Store`] if the store cannot be loaded
pub fn resolve_credential(
    env: &EnvSnapshot,
    store: &dyn CredentialStore,
    endpoint: &Url,
) -> Result<Option<Credential>, CredentialError> {
    if let (Some(uid), Some(key)) = (env.get(SRC_UID), env.get(SRC_KEY)) {
        let uid = uid
            .parse::<i64>()
            .map_err(|source| CredentialError::InvalidUid {
                value: uid.to_owned(),
                source,
            })?;
        tracing::trace!(uid, "credential taken from SRC_UID/SRC_KEY");
        return Ok(Some(Credential::new(uid, key)));
    }

    let mut stored = store.load()?;
    let credential = stored.remove(endpoint.as_str());
    tracing::trace!(
        endpoint = %endpoint,
        found = credential.is_some(),
        "looked up stored credential"
    );
    Ok(credential)
}

/// The permission-grant ticket from `SRCLIB_TICKET`, if set.
#[must_use]
pub fn resolve_ticket(env: &EnvSnapshot) -> Option<Ticket> {
    env.get(SRCLIB_TICKET).map(Ticket::new)
}
