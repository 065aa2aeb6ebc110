use std::time::Duration;

use tracing::warn;

use crate::{Error, Result};

/// Settings for the probe HTTP client.
#[derive(Debug, Clone, Default)]
pub struct HttpClientOptions {
    pub user_agent: Option<String>,
    /// Whole-request timeout; zero disables it.
    pub timeout: Duration,
    pub proxy: Option<String>,
}

/// Apply an optional explicit proxy to a `reqwest::ClientBuilder`.
///
/// - `None` keeps reqwest's default, which honours the system/env proxy
/// - `Some(url)` routes every request through `url`
/// - an unparsable URL is logged and proxying is disabled
pub fn apply_proxy(builder: reqwest::ClientBuilder, proxy: Option<&str>) -> reqwest::ClientBuilder {
    let Some(url) = proxy else {
        return builder;
    };

    match reqwest::Proxy::all(url) {
        Ok(proxy) => builder.proxy(proxy),
        Err(error) => {
            warn!(
                proxy_url = %url,
                error = %error,
                "Invalid proxy URL; disabling proxy"
            );
            builder.no_proxy()
        }
    }
}

/// Build the `reqwest::Client` used for liveness probes.
pub fn build_probe_client(options: &HttpClientOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Some(ua) = options.user_agent.as_deref() {
        builder = builder.user_agent(ua);
    }

    if options.timeout > Duration::ZERO {
        builder = builder.timeout(options.timeout);
    }

    builder = apply_proxy(builder, options.proxy.as_deref());

    builder
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}
