//! Lexicon and rule based polarity scoring for short titles.
//!
//! Word valences use a -4..4 scale. Boosters, negations, shouted words and trailing
//! `!`/`?` runs adjust the summed valence, which is then squashed into [-1, 1].

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Scores the polarity of a text in [-1.0, 1.0], 0.0 for neutral or empty text
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> f64;

    /// Identifies the lexicon and rules; equal versions must give equal scores
    fn version(&self) -> &str;
}

pub const LEXICON_VERSION: &str = "lexicon-v1";

const BOOST_INCREMENT: f64 = 0.293;
const BOOST_DECAY: [f64; 3] = [1.0, 0.95, 0.9];
const CAPS_INCREMENT: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const QUESTION_INCREMENT: f64 = 0.18;
const NORMALIZATION_ALPHA: f64 = 15.0;

static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        // positive
        ("amazing", 2.8),
        ("awesome", 3.1),
        ("best", 3.2),
        ("better", 1.9),
        ("beautiful", 2.9),
        ("blessed", 2.9),
        ("brilliant", 2.8),
        ("celebrate", 2.7),
        ("celebration", 2.3),
        ("cool", 1.3),
        ("cute", 2.0),
        ("enjoy", 2.2),
        ("epic", 2.3),
        ("excellent", 2.7),
        ("excited", 2.4),
        ("exciting", 2.2),
        ("fantastic", 2.6),
        ("favorite", 2.0),
        ("friendly", 2.2),
        ("fun", 2.3),
        ("funny", 1.9),
        ("glad", 2.0),
        ("good", 1.9),
        ("great", 3.1),
        ("happy", 2.7),
        ("hilarious", 1.7),
        ("hope", 1.9),
        ("incredible", 2.7),
        ("joy", 2.8),
        ("legendary", 2.5),
        ("love", 3.2),
        ("loved", 2.9),
        ("lovely", 2.8),
        ("loves", 2.7),
        ("magic", 1.7),
        ("nice", 1.8),
        ("peace", 2.5),
        ("perfect", 2.7),
        ("proud", 2.1),
        ("relaxing", 2.0),
        ("satisfying", 2.0),
        ("success", 2.7),
        ("successful", 2.8),
        ("super", 2.9),
        ("sweet", 2.0),
        ("thank", 1.5),
        ("thanks", 1.9),
        ("wholesome", 2.2),
        ("win", 2.8),
        ("winner", 2.8),
        ("wins", 2.7),
        ("won", 2.7),
        ("wonderful", 2.7),
        ("wow", 2.8),
        ("yes", 1.7),
        // negative
        ("angry", -2.3),
        ("arrested", -2.1),
        ("attack", -2.1),
        ("awful", -2.0),
        ("bad", -2.5),
        ("boring", -1.3),
        ("broken", -2.1),
        ("crash", -1.7),
        ("cringe", -1.6),
        ("crisis", -3.1),
        ("cry", -2.1),
        ("crying", -2.1),
        ("danger", -2.4),
        ("dangerous", -2.1),
        ("dead", -3.3),
        ("death", -2.9),
        ("die", -2.9),
        ("died", -2.6),
        ("dies", -2.9),
        ("disaster", -3.1),
        ("fail", -2.5),
        ("failed", -2.3),
        ("fails", -2.0),
        ("fake", -2.1),
        ("fear", -2.2),
        ("guilty", -1.8),
        ("hate", -2.7),
        ("hated", -3.2),
        ("horrible", -2.5),
        ("hurt", -2.4),
        ("kill", -3.7),
        ("killed", -3.5),
        ("killing", -3.4),
        ("lose", -1.7),
        ("loses", -1.3),
        ("losing", -1.6),
        ("lost", -1.3),
        ("nightmare", -2.7),
        ("pain", -2.3),
        ("problem", -1.7),
        ("problems", -1.7),
        ("sad", -2.1),
        ("scam", -2.4),
        ("scared", -1.9),
        ("scary", -2.2),
        ("shocked", -1.3),
        ("shocking", -1.7),
        ("stupid", -2.4),
        ("terrible", -2.1),
        ("toxic", -2.3),
        ("tragedy", -3.4),
        ("tragic", -3.4),
        ("ugly", -3.1),
        ("war", -2.9),
        ("worried", -1.2),
        ("worse", -2.1),
        ("worst", -3.1),
        ("wrong", -2.1),
    ]
    .into_iter()
    .collect()
});

static EMOJI_VALENCE: Lazy<HashMap<char, f64>> = Lazy::new(|| {
    [
        ('😂', 1.6),
        ('🤣', 1.6),
        ('😍', 2.8),
        ('🥰', 2.7),
        ('❤', 2.8),
        ('😊', 2.2),
        ('🙂', 1.2),
        ('😁', 2.0),
        ('👍', 1.8),
        ('🔥', 1.5),
        ('🎉', 2.3),
        ('💯', 1.5),
        ('😢', -2.1),
        ('😭', -1.8),
        ('😡', -2.8),
        ('😠', -2.5),
        ('💔', -2.4),
        ('😱', -1.7),
        ('👎', -1.8),
        ('😞', -2.0),
    ]
    .into_iter()
    .collect()
});

static BOOSTERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        ("absolutely", BOOST_INCREMENT),
        ("extremely", BOOST_INCREMENT),
        ("incredibly", BOOST_INCREMENT),
        ("insanely", BOOST_INCREMENT),
        ("most", BOOST_INCREMENT),
        ("really", BOOST_INCREMENT),
        ("so", BOOST_INCREMENT),
        ("totally", BOOST_INCREMENT),
        ("very", BOOST_INCREMENT),
        ("barely", -BOOST_INCREMENT),
        ("kinda", -BOOST_INCREMENT),
        ("slightly", -BOOST_INCREMENT),
        ("somewhat", -BOOST_INCREMENT),
    ]
    .into_iter()
    .collect()
});

const NEGATIONS: [&str; 16] = [
    "aint", "cannot", "cant", "dont", "doesnt", "didnt", "isnt", "neither", "never", "no",
    "nobody", "none", "nor", "not", "nothing", "wont",
];

fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word) || word.ends_with("n't") || word.ends_with("n’t")
}

/// At least two letters, all of them uppercase
fn is_shouting(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

struct Token {
    word: String,
    shouting: bool,
}

fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .map(|raw| raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '’'))
        .filter(|word| !word.is_empty())
        .map(|word| Token {
            word: word.to_lowercase(),
            shouting: is_shouting(word),
        })
        .collect()
}

/// Default scorer backed by the built-in lexicon
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconSentimentScorer;

impl LexiconSentimentScorer {
    pub fn new() -> Self {
        Self
    }

    fn word_valence(tokens: &[Token], index: usize, cap_differential: bool) -> Option<f64> {
        let base = *LEXICON.get(tokens[index].word.as_str())?;
        let direction = base.signum();
        let mut valence = base;

        if cap_differential && tokens[index].shouting {
            valence += CAPS_INCREMENT * direction;
        }

        for (distance, decay) in BOOST_DECAY.iter().enumerate().map(|(d, decay)| (d + 1, decay)) {
            if index < distance {
                break;
            }
            let previous = &tokens[index - distance].word;
            if let Some(boost) = BOOSTERS.get(previous.as_str()) {
                valence += boost * decay * direction;
            }
            if is_negation(previous) {
                valence *= NEGATION_SCALAR;
            }
        }

        Some(valence)
    }

    fn punctuation_emphasis(text: &str) -> f64 {
        let exclamations = text.chars().filter(|c| *c == '!').count().min(4);
        let questions = text.chars().filter(|c| *c == '?').count();
        let question_emphasis = if questions > 1 {
            questions.min(3) as f64 * QUESTION_INCREMENT
        } else {
            0.0
        };
        exclamations as f64 * EXCLAMATION_INCREMENT + question_emphasis
    }
}

impl SentimentScorer for LexiconSentimentScorer {
    fn score(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let shouted = tokens.iter().filter(|t| t.shouting).count();
        let cap_differential = shouted > 0 && shouted < tokens.len();

        let mut hits = 0usize;
        let mut sum = 0.0;
        for index in 0..tokens.len() {
            if let Some(valence) = Self::word_valence(&tokens, index, cap_differential) {
                sum += valence;
                hits += 1;
            }
        }
        for valence in text.chars().filter_map(|c| EMOJI_VALENCE.get(&c)) {
            sum += valence;
            hits += 1;
        }

        if hits == 0 || sum == 0.0 {
            return 0.0;
        }

        let emphasis = Self::punctuation_emphasis(text);
        if sum > 0.0 {
            sum += emphasis;
        } else {
            sum -= emphasis;
        }

        (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
    }

    fn version(&self) -> &str {
        LEXICON_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> f64 {
        LexiconSentimentScorer::new().score(text)
    }

    #[test]
    fn neutral_and_empty_text_score_zero() {
        assert_eq!(score(""), 0.0);
        assert_eq!(score("   "), 0.0);
        assert_eq!(score("Official Music Video"), 0.0);
        assert_eq!(score("Is this real?? 😮"), 0.0);
    }

    #[test]
    fn polarity_follows_lexicon() {
        assert!(score("I love this") > 0.0);
        assert!(score("This is terrible") < 0.0);
        assert!(score("Best day ever 😍") > score("Best day ever"));
    }

    #[test]
    fn negation_flips_polarity() {
        assert!(score("I do not love this") < 0.0);
        assert!(score("This isn't bad") > 0.0);
    }

    #[test]
    fn boosters_and_shouting_amplify() {
        assert!(score("very good video") > score("good video"));
        assert!(score("GREAT news today") > score("great news today"));
        assert!(score("slightly good video") < score("good video"));
    }

    #[test]
    fn exclamations_amplify_without_changing_sign() {
        assert!(score("great!!!") > score("great"));
        assert!(score("terrible!!!") < score("terrible"));
    }

    #[test]
    fn score_stays_in_bounds() {
        let hype = "AMAZING AMAZING AMAZING best best best WOW 😍😍😍🔥🔥 !!!!!!";
        let doom = "worst worst worst DISASTER tragedy killed 😡😡💔 !!!!";
        for text in [hype, doom] {
            let s = score(text);
            assert!((-1.0..=1.0).contains(&s), "{} out of range for {}", s, text);
        }
        assert!(score(hype) > 0.9);
        assert!(score(doom) < -0.9);
    }

    #[test]
    fn scoring_is_deterministic() {
        let text = "Really not a bad show tonight!";
        assert_eq!(score(text), score(text));
        assert_eq!(LexiconSentimentScorer::new().version(), LEXICON_VERSION);
    }
}
