//! Plausibility checks for provider credentials.
//!
//! A credential that fails these checks is treated as absent and its
//! provider is skipped without a network call.

fn looks_real(value: Option<&str>, min_len: usize, placeholder_prefixes: &[&str]) -> bool {
    let Some(value) = value.map(str::trim) else {
        return false;
    };
    if value.len() <= min_len {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    !lower.contains("placeholder") && !placeholder_prefixes.iter().any(|p| lower.starts_with(p))
}

/// OpenAI API key.
pub fn openai_key_valid(key: Option<&str>) -> bool {
    looks_real(key, 20, &["your_ope", "sk-xxx"])
}

/// Groq API key.
pub fn groq_key_valid(key: Option<&str>) -> bool {
    looks_real(key, 10, &["your_"])
}

/// Replicate API token.
pub fn replicate_token_valid(token: Option<&str>) -> bool {
    looks_real(token, 20, &["r8_xxx"])
}
