//! Content-policy filter: media requirement, sensitivity, language
//! allowlist, and engagement floors.
//!
//! Language handling has two modes. By default the post's language is
//! detected from its text (HTML, mentions, hashtags, and URLs stripped
//! first) because the protocol-supplied field is frequently wrong on
//! federated content. Setting `use_mastodon_language_detection` trusts
//! the field verbatim instead. Whenever an allowlist is configured and no
//! language can be determined — empty text, very short text, or an
//! unreliable detection — the post is skipped.

use regex::Regex;

use crate::config::Config;
use crate::mastodon::Status;
use crate::reason::SkipReason;

/// Detection below this many characters of cleaned text is noise.
const MIN_DETECTABLE_CHARS: usize = 20;

/// Policy-driven skip decisions for a single post.
pub struct ContentFilter {
    require_media: bool,
    skip_sensitive_without_cw: bool,
    languages_allowlist: Vec<String>,
    use_mastodon_language_detection: bool,
    min_reblogs: u64,
    min_favourites: u64,
    min_replies: u64,
    html_tag: Regex,
    noise: Regex,
}

impl ContentFilter {
    pub fn new(config: &Config) -> Self {
        Self {
            require_media: config.require_media,
            skip_sensitive_without_cw: config.skip_sensitive_without_cw,
            languages_allowlist: config.languages_allowlist.clone(),
            use_mastodon_language_detection: config.use_mastodon_language_detection,
            min_reblogs: config.min_reblogs,
            min_favourites: config.min_favourites,
            min_replies: config.min_replies,
            html_tag: Regex::new(r"<[^>]*>").expect("html pattern is valid"),
            noise: Regex::new(r"(?i)@\w+(@[\w.\-]+)?|#\w+|https?://\S+")
                .expect("noise pattern is valid"),
        }
    }

    /// `Some(reason)` when the post must be skipped, `None` when it passes.
    pub fn should_skip(&self, status: &Status) -> Option<SkipReason> {
        if self.require_media && status.media_attachments.is_empty() {
            return Some(SkipReason::RequireMedia);
        }
        if self.skip_sensitive_without_cw
            && status.sensitive
            && status.spoiler_text.trim().is_empty()
        {
            return Some(SkipReason::Sensitive);
        }
        if !self.languages_allowlist.is_empty() {
            match self.post_language(status) {
                Some(lang) if self.languages_allowlist.contains(&lang) => {}
                _ => return Some(SkipReason::Language),
            }
        }
        if status.reblogs_count < self.min_reblogs
            || status.favourites_count < self.min_favourites
            || status.replies_count < self.min_replies
        {
            return Some(SkipReason::EngagementFloor);
        }
        None
    }

    /// The post's language as a lowercase two-letter code, or `None` when
    /// it cannot be determined.
    fn post_language(&self, status: &Status) -> Option<String> {
        if self.use_mastodon_language_detection {
            return status
                .language
                .as_deref()
                .map(|l| l.to_lowercase())
                .filter(|l| !l.is_empty());
        }
        self.detect_language(&status.content)
    }

    /// Content-based detection on cleaned text.
    fn detect_language(&self, content: &str) -> Option<String> {
        let text = self.clean_content(content);
        if text.chars().count() < MIN_DETECTABLE_CHARS {
            return None;
        }
        let info = whatlang::detect(&text)?;
        if !info.is_reliable() {
            return None;
        }
        iso639_1(info.lang()).map(String::from)
    }

    /// Strip HTML tags, mentions, hashtags, and URLs before detection.
    fn clean_content(&self, content: &str) -> String {
        let without_tags = self.html_tag.replace_all(content, " ");
        let cleaned = self.noise.replace_all(&without_tags, " ");
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// whatlang reports ISO 639-3; operators configure the two-letter codes
/// the protocol uses. Languages without a two-letter code stay unmapped
/// and fail the allowlist, which is the conservative outcome.
fn iso639_1(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang;
    Some(match lang {
        Lang::Eng => "en",
        Lang::Deu => "de",
        Lang::Nld => "nl",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Nob => "no",
        Lang::Fin => "fi",
        Lang::Ces => "cs",
        Lang::Slk => "sk",
        Lang::Hun => "hu",
        Lang::Ron => "ro",
        Lang::Bul => "bg",
        Lang::Ell => "el",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Cmn => "zh",
        Lang::Vie => "vi",
        Lang::Ind => "id",
        Lang::Tha => "th",
        Lang::Cat => "ca",
        Lang::Lit => "lt",
        Lang::Lav => "lv",
        Lang::Est => "et",
        Lang::Slv => "sl",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Epo => "eo",
        Lang::Afr => "af",
        _ => return None,
    })
}
