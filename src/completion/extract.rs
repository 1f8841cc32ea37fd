//! Balanced-span extraction for completion output.
//!
//! Models wrap JSON in prose, code fences, or apologies. Rather than
//! demanding a clean payload, we take the first balanced `{...}` or
//! `[...]` span and parse that. The scanner is string-aware: brackets
//! inside JSON string literals do not affect the depth count.

/// First balanced span delimited by `open`/`close`, or `None` when no
/// such span exists. Unterminated spans also return `None`.
fn first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                let end = start + offset + close.len_utf8();
                return Some(&text[start..end]);
            }
        }
    }

    None
}

/// First balanced `{...}` span in `text`.
pub fn first_object(text: &str) -> Option<&str> {
    first_balanced(text, '{', '}')
}

/// First balanced `[...]` span in `text`.
pub fn first_array(text: &str) -> Option<&str> {
    first_balanced(text, '[', ']')
}
