//! Provider language tags -> display names.

const LANGUAGES: &[(&[&str], &str)] = &[
    (&["en", "eng", "english", "en-us", "en-gb"], "English"),
    (&["fr", "fre", "fra", "french"], "French"),
    (&["de", "ger", "deu", "german"], "German"),
    (&["es", "spa", "spanish"], "Spanish"),
    (&["it", "ita", "italian"], "Italian"),
    (&["pt", "por", "portuguese", "pt-br"], "Portuguese"),
    (&["nl", "dut", "nld", "dutch"], "Dutch"),
    (&["ru", "rus", "russian"], "Russian"),
    (&["ja", "jpn", "japanese"], "Japanese"),
    (&["zh", "chi", "zho", "chinese", "zh-cn", "zh-tw"], "Chinese"),
    (&["pl", "pol", "polish"], "Polish"),
    (&["sv", "swe", "swedish"], "Swedish"),
];

/// `/languages/eng` -> `eng`; plain tags are lowercased.
pub fn language_code(tag: &str) -> String {
    tag.trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

pub fn display_language(tag: &str) -> Option<String> {
    let code = language_code(tag);
    if code.is_empty() {
        return None;
    }
    let name = LANGUAGES
        .iter()
        .find(|(codes, _)| codes.contains(&code.as_str()))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_uppercase());
    Some(name)
}

pub fn is_english(tag: &str) -> bool {
    display_language(tag).as_deref() == Some("English")
}
