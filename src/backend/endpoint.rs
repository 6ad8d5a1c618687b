use thiserror::Error;
use url::Url;

const CHAT_SOCKET_PATH: &str = "chat";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("api url is empty")]
    Empty,
    #[error("api url `{0}` is not a valid url")]
    Invalid(String),
}

/// Derives the chat socket URL from the REST base URL.
///
/// `https` maps to `wss`, `http` to `ws`, and a bare host is assumed to be
/// TLS. Any path on the base URL is kept, with the trailing slash removed.
pub fn chat_socket_url(api_url: &str, token: &str) -> Result<Url, EndpointError> {
    let trimmed = api_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(EndpointError::Empty);
    }

    let socket_base = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
        trimmed.to_owned()
    } else {
        format!("wss://{trimmed}")
    };

    let mut url = Url::parse(&format!("{socket_base}/{CHAT_SOCKET_PATH}"))
        .map_err(|_| EndpointError::Invalid(api_url.to_owned()))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

/// Builds a REST endpoint URL from the base URL and raw path segments.
/// Each segment is percent-encoded, so ids can never change the request
/// target. An empty last segment yields a trailing slash.
pub fn api_endpoint(api_url: &str, segments: &[&str]) -> Result<Url, EndpointError> {
    if api_url.trim().is_empty() {
        return Err(EndpointError::Empty);
    }

    let base = join_api_path(api_url, "");
    let mut url = Url::parse(&base).map_err(|_| EndpointError::Invalid(api_url.to_owned()))?;
    url.path_segments_mut()
        .map_err(|()| EndpointError::Invalid(api_url.to_owned()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Joins a REST path onto the base URL, collapsing duplicate slashes in the
/// path part.
fn join_api_path(api_url: &str, path: &str) -> String {
    let base = api_url.trim().trim_end_matches('/');
    let joined = format!("{base}/{}", path.trim_start_matches('/'));

    let (scheme, rest) = match joined.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, joined.as_str()),
    };

    let mut collapsed = String::with_capacity(rest.len());
    let mut previous_slash = false;
    for ch in rest.chars() {
        if ch == '/' && previous_slash {
            continue;
        }
        previous_slash = ch == '/';
        collapsed.push(ch);
    }

    match scheme {
        Some(scheme) => format!("{scheme}://{collapsed}"),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_http_schemes_to_socket_schemes() {
        let secure = chat_socket_url("https://api.example.com/", "abc").expect("url");
        let plain = chat_socket_url("http://localhost:8000", "abc").expect("url");

        assert_eq!(secure.as_str(), "wss://api.example.com/chat?token=abc");
        assert_eq!(plain.as_str(), "ws://localhost:8000/chat?token=abc");
    }

    #[test]
    fn bare_host_defaults_to_tls() {
        let url = chat_socket_url("api.example.com", "abc").expect("url");

        assert_eq!(url.as_str(), "wss://api.example.com/chat?token=abc");
    }

    #[test]
    fn keeps_base_path_and_encodes_token() {
        let url = chat_socket_url("https://example.com/api/", "a b+c").expect("url");

        assert_eq!(url.path(), "/api/chat");
        assert_eq!(
            url.query_pairs().find(|(key, _)| key == "token").map(|(_, v)| v.into_owned()),
            Some("a b+c".to_owned())
        );
    }

    #[test]
    fn rejects_empty_base() {
        assert_eq!(chat_socket_url("  ", "abc"), Err(EndpointError::Empty));
    }

    #[test]
    fn join_collapses_double_slashes_but_keeps_scheme() {
        assert_eq!(
            join_api_path("https://api.example.com/", "/chat//with-recent-messages"),
            "https://api.example.com/chat/with-recent-messages"
        );
        assert_eq!(join_api_path("http://h:1/v1", "chat/"), "http://h:1/v1/chat/");
    }

    #[test]
    fn endpoint_segments_are_percent_encoded() {
        let url = api_endpoint("https://api.example.com/v1/", &["chat", "a/b?c#d", "messages"])
            .expect("url");

        assert_eq!(url.as_str(), "https://api.example.com/v1/chat/a%2Fb%3Fc%23d/messages");
    }

    #[test]
    fn endpoint_keeps_trailing_slash_and_rejects_bad_bases() {
        let url = api_endpoint("http://h:1", &["chat", ""]).expect("url");

        assert_eq!(url.as_str(), "http://h:1/chat/");
        assert_eq!(api_endpoint(" ", &["chat"]), Err(EndpointError::Empty));
        assert!(matches!(api_endpoint("no scheme", &["chat"]), Err(EndpointError::Invalid(_))));
    }
}
