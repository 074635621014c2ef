use srclib_auth::{Credential, HttpClientBuilderExt, Ticket};
use srclib_http::{DiskCache, HttpClient, HttpClientBuilder, TransportSecurity};
use url::Url;

use crate::config::{CacheFailurePolicy, ClientConfig};
use crate::error::ClientError;

/// Build the HTTP client for `endpoint`.
///
/// Layers, innermost first: base transport, disk cache, ticket auth (if
/// `ticket`), basic auth (if `credential`). Basic auth runs first and sets
/// `Authorization`; ticket auth then appends its own value, so both reach
/// the cache and the network.
///
/// Must be called inside a Tokio runtime.
///
/// # Errors
/// - [`ClientError::CacheUnavailable`] if the cache directory cannot be
///   opened and `config.cache_failure` is [`CacheFailurePolicy::Fail`]
/// - [`ClientError::Transport`] if the base client cannot be built
pub fn compose_transport(
    config: &ClientConfig,
    endpoint: &Url,
    ticket: Option<&Ticket>,
    credential: Option<&Credential>,
) -> Result<HttpClient, ClientError> {
    let mut http = config.http.clone();
    if endpoint.scheme() == "http" {
        tracing::warn!(
            endpoint = %endpoint,
            "API endpoint uses plain HTTP; credentials will be sent unencrypted"
        );
        http.transport = TransportSecurity::AllowInsecureHttp;
    }

    let mut builder = HttpClientBuilder::with_config(http);

    match DiskCache::open(&config.cache_dir) {
        Ok(cache) => builder = builder.cache(cache),
        Err(source) => match config.cache_failure {
            CacheFailurePolicy::Bypass => {
                tracing::warn!(
                    path = %config.cache_dir.display(),
                    error = %source,
                    "HTTP cache unavailable; continuing without it"
                );
            }
            CacheFailurePolicy::Fail => {
                return Err(ClientError::CacheUnavailable {
                    path: config.cache_dir.clone(),
                    source,
                });
            }
        },
    }

    if let Some(ticket) = ticket {
        tracing::info!("using perm grant ticket from SRCLIB_TICKET");
        builder = builder.with_ticket_auth(ticket.clone());
    }

    if let Some(credential) = credential {
        tracing::debug!(
            endpoint = %endpoint,
            uid = credential.uid(),
            "using authenticated API client"
        );
        builder = builder.with_basic_auth(credential.clone());
    } else {
        tracing::debug!(endpoint = %endpoint, "using unauthenticated API client");
    }

    Ok(builder.build()?)
}
