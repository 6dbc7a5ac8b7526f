use std::time::Duration;

use reqwest::Client;

/// `User-Agent` sent on every outbound request.
pub const USER_AGENT: &str = concat!("skald/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client backed by rustls with the aws-lc-rs provider.
///
/// reqwest is compiled without a bundled crypto provider, so the process-wide
/// default is installed here before the first client is built. Installing
/// twice is a no-op.
pub fn client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_repeatedly() {
        client(None).unwrap();
        client(Some(Duration::from_secs(5))).unwrap();
    }
}
