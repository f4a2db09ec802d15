use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::{info, warn};

enum ProxyResolution {
    UseProxy(String),
    /// `proxy = ""` in config disables environment proxies too.
    ForceDirectConnect,
    /// Let reqwest read HTTPS_PROXY / HTTP_PROXY.
    FromEnvironment,
}

fn resolve_proxy(proxy: Option<&str>) -> ProxyResolution {
    match proxy.map(str::trim) {
        Some("") => ProxyResolution::ForceDirectConnect,
        Some(p) => ProxyResolution::UseProxy(p.to_string()),
        None => ProxyResolution::FromEnvironment,
    }
}

/// Build the HTTP client used to reach the language backend.
///
/// The request timeout is the transport's own ceiling; callers still wrap
/// each completion in their own deadline.
pub fn build_http_client(proxy: Option<&str>, api_base: &str, timeout: Duration) -> Client {
    let mut builder = Client::builder().timeout(timeout);

    match resolve_proxy(proxy) {
        ProxyResolution::UseProxy(proxy_url) => match Proxy::all(&proxy_url) {
            Ok(p) => {
                info!(proxy = %proxy_url, api_base = %api_base, "Backend using proxy");
                builder = builder.proxy(p);
            }
            Err(e) => {
                warn!(error = %e, proxy = %proxy_url, "Invalid proxy URL, falling back to direct connect");
            }
        },
        ProxyResolution::ForceDirectConnect => {
            info!(api_base = %api_base, "Backend forced to direct connect");
            builder = builder.no_proxy();
        }
        ProxyResolution::FromEnvironment => {}
    }

    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build HTTP client, using default");
        Client::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_proxy_explicit() {
        let r = resolve_proxy(Some("http://gateway:3128"));
        assert!(matches!(r, ProxyResolution::UseProxy(url) if url == "http://gateway:3128"));
    }

    #[test]
    fn test_resolve_proxy_empty_forces_direct() {
        assert!(matches!(resolve_proxy(Some("  ")), ProxyResolution::ForceDirectConnect));
    }

    #[test]
    fn test_resolve_proxy_unset_follows_environment() {
        assert!(matches!(resolve_proxy(None), ProxyResolution::FromEnvironment));
    }

    #[test]
    fn test_build_http_client_with_bad_proxy() {
        let client = build_http_client(
            Some("::not a url::"),
            "http://localhost:11434",
            Duration::from_secs(5),
        );
        drop(client);
    }
}
