//! Client language tags → provider language codes.

/// Provider code used for any tag missing from [`LANGUAGE_MAP`].
pub const FALLBACK_PROVIDER_LANG: &str = "en";

/// Locale tags the recorder UI offers, with the code the TTS provider expects.
pub const LANGUAGE_MAP: &[(&str, &str)] = &[("ar-IQ", "ar"), ("en-US", "en")];

/// Map a client locale tag (e.g. `"ar-IQ"`) to a provider code (e.g. `"ar"`).
///
/// Matching is exact; unknown tags fall back to English.
pub fn provider_lang(tag: &str) -> &'static str {
    LANGUAGE_MAP
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, code)| *code)
        .unwrap_or(FALLBACK_PROVIDER_LANG)
}
