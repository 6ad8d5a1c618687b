use std::panic;

use url::Url;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 5] = ["password", "secret", "token", "bearer", "authorization"];

const SENSITIVE_QUERY_KEYS: [&str; 3] = ["token", "access_token", "auth"];

pub fn redact_text(input: &str) -> String {
    input
        .split_whitespace()
        .map(redact_chunk)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a URL with credential-bearing query values and userinfo masked.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();

    if !redacted.username().is_empty() || redacted.password().is_some() {
        let _ = redacted.set_username(REDACTED);
        let _ = redacted.set_password(None);
    }

    if redacted.query().is_some() {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if SENSITIVE_QUERY_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                    REDACTED.to_owned()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }

    redacted.to_string()
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "chatsync panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("chatsync panic: {}", scrubbed);
        }
    }));
}

fn redact_chunk(chunk: &str) -> String {
    let lowered = chunk.to_ascii_lowercase();
    if SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || looks_like_jwt(chunk)
    {
        REDACTED.to_owned()
    } else {
        chunk.to_owned()
    }
}

/// Three dot-separated base64url segments, the first starting with `eyJ`.
fn looks_like_jwt(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    let segments: Vec<&str> = cleaned.split('.').collect();

    segments.len() == 3
        && cleaned.starts_with("eyJ")
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_text_scrubs_sensitive_fragments() {
        let input = "wrong password=superSecret99 token=abc123 eyJhbGciOi.eyJ1c2VyIjoxfQ.c2lnbmF0dXJl ok";
        let output = redact_text(input);

        assert!(!output.contains("superSecret99"));
        assert!(!output.contains("abc123"));
        assert!(!output.contains("eyJhbGciOi"));
        assert!(output.contains("[REDACTED]"));
        assert!(output.ends_with("ok"));
    }

    #[test]
    fn redact_url_masks_token_query() {
        let url = Url::parse("wss://api.example.com/chat?token=eyJsecret&room=1").expect("url");

        let rendered = redact_url(&url);

        assert!(!rendered.contains("eyJsecret"));
        assert!(rendered.contains("room=1"));
        assert!(rendered.starts_with("wss://api.example.com/chat?"));
    }

    #[test]
    fn redact_url_leaves_plain_urls_alone() {
        let url = Url::parse("https://api.example.com/chat/").expect("url");

        assert_eq!(redact_url(&url), "https://api.example.com/chat/");
    }
}
