//! Secret scrubbing for upstream error text before it reaches logs or users.

use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn scrub_after_marker(scrubbed: &mut String, marker: &str) -> bool {
    let mut modified = false;
    let mut search_from = 0;
    loop {
        let Some(rel) = scrubbed[search_from..].find(marker) else {
            break;
        };

        let start = search_from + rel;
        let content_start = start + marker.len();
        let end = token_end(scrubbed, content_start);

        // Skip bare markers without a token value.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        scrubbed.replace_range(start..end, "[REDACTED]");
        modified = true;
        search_from = start + "[REDACTED]".len();
    }

    modified
}

const PREFIX_PATTERNS: [&str; 4] = ["sk-", "ghp_", "ya29.", "AIza"];

const MARKER_PATTERNS: [&str; 15] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "\"authorization\":\"Bearer ",
    "api_key=",
    "access_token=",
    "refresh_token=",
    "client_secret=",
    "code=",
    "code_verifier=",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"refresh_token\":\"",
    "\"client_secret\":\"",
    "\"code_verifier\":\"",
    "\"token\":\"",
];

fn needs_scrubbing(input: &str) -> bool {
    PREFIX_PATTERNS
        .iter()
        .chain(MARKER_PATTERNS.iter())
        .any(|pattern| input.contains(pattern))
}

/// Scrub known secret-like token patterns from upstream error strings.
///
/// Redacts credentials in the forms this crate actually handles:
/// - Prefix tokens: `sk-`, `ghp_`, etc.
/// - Header/query/json markers: `Authorization: Bearer ...`,
///   `access_token=...`, `"code_verifier":"..."`, `client_secret=...`
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    if !needs_scrubbing(input) {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();

    for pattern in PREFIX_PATTERNS {
        scrub_after_marker(&mut scrubbed, pattern);
    }

    for marker in MARKER_PATTERNS {
        scrub_after_marker(&mut scrubbed, marker);
    }

    Cow::Owned(scrubbed)
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let scrubbed = scrubbed.as_ref();
    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Drain a failed response into `(status, sanitized body)` for error variants.
pub async fn sanitized_failure(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    (status, sanitize_api_error(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_redacted() {
        let input = "upstream said: Authorization: Bearer abc.def-123 rejected";
        let out = scrub_secret_patterns(input);
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("abc.def-123"));
    }

    #[test]
    fn code_verifier_marker_is_redacted() {
        let input = r#"body was {"code_verifier":"dBjftJeZ4CVP-mB92K27uh"}"#;
        let out = scrub_secret_patterns(input);
        assert!(!out.contains("dBjftJeZ4CVP"));
    }

    #[test]
    fn client_secret_query_is_redacted() {
        let input = "request client_secret=super-secret-value failed";
        let out = scrub_secret_patterns(input);
        assert!(!out.contains("super-secret-value"));
    }

    #[test]
    fn clean_input_is_borrowed() {
        let input = "plain error with nothing sensitive";
        assert!(matches!(scrub_secret_patterns(input), Cow::Borrowed(_)));
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let long = "e".repeat(500);
        let out = sanitize_api_error(&long);
        assert!(out.len() < 500);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn sanitize_keeps_short_bodies_whole() {
        assert_eq!(sanitize_api_error("short"), "short");
    }
}
