//! Candidate hub URL derivation.

use url::Url;

use crate::config::{ApiConfig, HubConfig};

/// Build the list of hub URLs to try, in priority order.
///
/// An explicit override is the only candidate. Otherwise the hub URL is
/// derived from the REST base URL with the API suffix stripped, falling back
/// to the un-stripped variant, de-duplicated. HTTP schemes are mapped to
/// their WebSocket equivalents.
pub fn hub_candidates(api: &ApiConfig, hub: &HubConfig) -> Vec<String> {
    if let Some(override_url) = hub.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return vec![to_ws_scheme(override_url)];
    }

    let base = api.base_url.trim().trim_end_matches('/');
    let stripped = base.strip_suffix(hub.api_suffix.as_str()).unwrap_or(base);

    let mut candidates: Vec<String> = Vec::new();
    for candidate in [
        format!("{stripped}{}", hub.path),
        format!("{base}{}", hub.path),
    ] {
        let candidate = to_ws_scheme(&candidate);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Map http/https to ws/wss; other schemes and unparseable values are left
/// as-is for the transport to reject with a useful error.
fn to_ws_scheme(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let mapped = match url.scheme() {
                "http" => url.set_scheme("ws").is_ok(),
                "https" => url.set_scheme("wss").is_ok(),
                _ => false,
            };
            if mapped {
                url.to_string()
            } else {
                raw.to_string()
            }
        }
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
        }
    }

    #[test]
    fn test_override_is_the_sole_candidate() {
        let hub = HubConfig {
            url: Some("https://hub.fitdesk.test/live".to_string()),
            ..HubConfig::default()
        };
        let candidates = hub_candidates(&api("http://api.fitdesk.test/api"), &hub);
        assert_eq!(candidates, vec!["wss://hub.fitdesk.test/live".to_string()]);
    }

    #[test]
    fn test_derives_stripped_and_unstripped_variants() {
        let candidates = hub_candidates(&api("http://api.fitdesk.test/api"), &HubConfig::default());
        assert_eq!(
            candidates,
            vec![
                "ws://api.fitdesk.test/hubs/attendance".to_string(),
                "ws://api.fitdesk.test/api/hubs/attendance".to_string(),
            ]
        );
    }

    #[test]
    fn test_deduplicates_when_base_has_no_suffix() {
        let candidates = hub_candidates(&api("http://api.fitdesk.test"), &HubConfig::default());
        assert_eq!(
            candidates,
            vec!["ws://api.fitdesk.test/hubs/attendance".to_string()]
        );
    }

    #[test]
    fn test_https_maps_to_wss_and_trailing_slash_is_tolerated() {
        let candidates =
            hub_candidates(&api("https://api.fitdesk.test/api/"), &HubConfig::default());
        assert_eq!(
            candidates,
            vec![
                "wss://api.fitdesk.test/hubs/attendance".to_string(),
                "wss://api.fitdesk.test/api/hubs/attendance".to_string(),
            ]
        );
    }

    #[test]
    fn test_blank_override_falls_back_to_derivation() {
        let hub = HubConfig {
            url: Some("   ".to_string()),
            ..HubConfig::default()
        };
        let candidates = hub_candidates(&api("http://api.fitdesk.test/api"), &hub);
        assert_eq!(candidates.len(), 2);
    }
}
