// src/utils/html.rs

/// Sanitizes author-supplied rich text (intro, consent and outro pages).
///
/// Whitelist based: formatting tags like <b> and <p> survive, while <script>,
/// <iframe> and event-handler attributes are stripped. Script contents are
/// dropped entirely.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
