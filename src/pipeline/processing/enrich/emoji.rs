use once_cell::sync::Lazy;
use regex::Regex;

/// Decides whether a piece of text contains an emoji
pub trait EmojiDetector: Send + Sync {
    fn contains_emoji(&self, text: &str) -> bool;
}

// Pictographic code points plus the regional indicator letters used for flags.
// Keycap bases (digits, '#', '*') are plain characters on their own and do not count.
static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\x{1F1E6}-\x{1F1FF}]").expect("emoji pattern is valid")
});

/// Emoji detection over the Unicode `Extended_Pictographic` property
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeEmojiDetector;

impl EmojiDetector for UnicodeEmojiDetector {
    fn contains_emoji(&self, text: &str) -> bool {
        EMOJI_RE.is_match(text)
    }
}
