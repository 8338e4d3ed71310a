use reqwest::Client;

use crate::error::B2Result;

/// Maximum number of idle connections to keep per host
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

/// Builds the HTTP client a pipeline uses when none is injected.
///
/// No timeout is configured; callers bound each operation themselves.
///
/// # Errors
///
/// Returns `B2Error::Network` if the TLS backend cannot be initialized
pub fn default_http_client() -> B2Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
        .user_agent(format!("b2-pipeline/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Into::into)
}
