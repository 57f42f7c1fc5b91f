//! Code-fence stripping for raw model replies

const FENCE: &str = "```";

/// Strip an optional leading fence line (with optional language tag) and an
/// optional trailing fence, then trim surrounding whitespace.
///
/// Stripping repeats until nothing changes, so the result is a fixed point:
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(raw: &str) -> &str {
    let mut text = raw.trim();
    loop {
        let stripped = strip_trailing_fence(strip_leading_fence(text)).trim();
        if stripped.len() == text.len() {
            return text;
        }
        text = stripped;
    }
}

fn strip_leading_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    // language tag such as `json`, `JSON` or `jsonc`
    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+'))
        .unwrap_or(rest.len());
    let rest = rest[tag_len..].trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest)
}

fn strip_trailing_fence(text: &str) -> &str {
    text.strip_suffix(FENCE).unwrap_or(text)
}
