use tower::ServiceExt;

use crate::layer::{BasicAuthLayer, TicketAuthLayer};
use crate::types::{Credential, Ticket};

/// Extension trait for adding srclib auth to [`srclib_http::HttpClientBuilder`].
///
/// Each call adds a layer outside the ones added before it, so add the
/// ticket first and the credential second to get basic auth outermost.
///
/// ```ignore
/// use srclib_auth::HttpClientBuilderExt;
///
/// let client = HttpClientBuilder::new()
///     .with_ticket_auth(ticket)
///     .with_basic_auth(credential)
///     .build()?;
/// ```
pub trait HttpClientBuilderExt {
    /// Append `Authorization: Sourcegraph-Ticket <ticket>` to every request.
    #[must_use]
    fn with_ticket_auth(self, ticket: Ticket) -> Self;

    /// Set `Authorization: Basic base64(<uid>:<key>)` on every request.
    #[must_use]
    fn with_basic_auth(self, credential: Credential) -> Self;
}

impl HttpClientBuilderExt for srclib_http::HttpClientBuilder {
    fn with_ticket_auth(self, ticket: Ticket) -> Self {
        let layer = TicketAuthLayer::new(ticket);
        self.with_auth_layer(move |svc| {
            tower::ServiceBuilder::new()
                .layer(layer)
                .service(svc)
                .boxed_clone()
        })
    }

    fn with_basic_auth(self, credential: Credential) -> Self {
        let layer = BasicAuthLayer::new(credential);
        self.with_auth_layer(move |svc| {
            tower::ServiceBuilder::new()
                .layer(layer)
                .service(svc)
                .boxed_clone()
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use srclib_http::HttpClientBuilder;

    #[tokio::test]
    async fn with_basic_auth_sends_credentials() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/api/repos")
                .header("authorization", "Basic NDI6c2VjcmV0");
            then.status(200).body("[]");
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .with_basic_auth(Credential::new(42, "secret"))
            .build()
            .unwrap();

        let resp = client.get(&server.url("/api/repos")).send().await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        m.assert();
    }

    #[tokio::test]
    async fn with_ticket_auth_sends_ticket() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/api/units")
                .header("authorization", "Sourcegraph-Ticket signed-ticket");
            then.status(200);
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .with_ticket_auth(Ticket::new("signed-ticket"))
            .build()
            .unwrap();

        client.get(&server.url("/api/units")).send().await.unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn without_auth_no_authorization_header() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/api/").header_missing("authorization");
            then.status(204);
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .build()
            .unwrap();

        client.get(&server.url("/api/")).send().await.unwrap();
        m.assert();
    }
}
