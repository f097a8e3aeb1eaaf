pub mod dns;
pub mod geohash;
pub mod http;
pub mod nip11;
pub mod provider;
pub mod rtt;

pub use provider::{CheckResult, DefaultProbeProvider, ProbeProvider};

/// NIP-11 and the plain HTTP probe both fetch the relay over HTTP(S) rather
/// than WebSocket, on the same host/port with the scheme swapped.
pub(crate) fn to_http_url(relay_url: &str) -> Option<String> {
    let mut url = url::Url::parse(relay_url).ok()?;
    match url.scheme() {
        "ws" => url.set_scheme("http").ok()?,
        "wss" => url.set_scheme("https").ok()?,
        _ => return None,
    };
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_ws_schemes_for_http() {
        assert_eq!(
            to_http_url("wss://relay.example.com").as_deref(),
            Some("https://relay.example.com/")
        );
        assert_eq!(
            to_http_url("ws://relay.example.com").as_deref(),
            Some("http://relay.example.com/")
        );
    }
}
