//! Lexical sentiment scorer
//!
//! Scores text by the presence (not frequency) of keywords from two fixed
//! lists. A keyword matches any word it starts, so "dropped" counts as
//! "drop" and "gains" as "gain". The lists are paired index-by-index, so
//! swapping every positive word for its partner flips the sign of the score.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Static keyword lists, paired by index
pub const POSITIVE_WORDS: &[&str] = &["good", "positive", "growth", "gain", "strong", "improve"];

pub const NEGATIVE_WORDS: &[&str] = &["bad", "negative", "decline", "loss", "weak", "drop"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentReport {
    pub sentiment: Sentiment,
    pub score: i32,
}

pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn analyze(text: &str) -> SentimentReport {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let present = |word: &&&str| tokens.iter().any(|t| t.starts_with(**word));
        let positive = POSITIVE_WORDS.iter().filter(present).count() as i32;
        let negative = NEGATIVE_WORDS.iter().filter(present).count() as i32;

        let score = positive - negative;
        let sentiment = if score > 0 {
            Sentiment::Positive
        } else if score < 0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };

        SentimentReport { sentiment, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap_polarity(text: &str) -> String {
        text.split(' ')
            .map(|word| {
                if let Some(i) = POSITIVE_WORDS.iter().position(|w| *w == word) {
                    NEGATIVE_WORDS[i].to_string()
                } else if let Some(i) = NEGATIVE_WORDS.iter().position(|w| *w == word) {
                    POSITIVE_WORDS[i].to_string()
                } else {
                    word.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_word_lists_pair_up() {
        assert_eq!(POSITIVE_WORDS.len(), NEGATIVE_WORDS.len());
        for w in POSITIVE_WORDS {
            assert!(!NEGATIVE_WORDS.contains(w));
        }
    }

    #[test]
    fn test_labels() {
        let r = SentimentAnalyzer::analyze("Strong quarter: profit and revenue growth");
        assert_eq!(r.sentiment, Sentiment::Positive);
        assert_eq!(r.score, 2);

        let r = SentimentAnalyzer::analyze("Shares DROP after a weak quarter");
        assert_eq!(r.sentiment, Sentiment::Negative);
        assert_eq!(r.score, -2);

        let r = SentimentAnalyzer::analyze("The company held its annual meeting");
        assert_eq!(r.sentiment, Sentiment::Neutral);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn test_inflected_forms() {
        let r = SentimentAnalyzer::analyze("Apple shares dropped as profits declined and losses widened");
        assert_eq!(r.sentiment, Sentiment::Negative);
        assert_eq!(r.score, -3);

        let r = SentimentAnalyzer::analyze("Revenue gains and improved margins");
        assert_eq!(r.sentiment, Sentiment::Positive);
        assert_eq!(r.score, 2);

        let r = SentimentAnalyzer::analyze("Stock is up today");
        assert_eq!(r.score, 0);
    }

    #[test]
    fn test_presence_not_frequency() {
        let r = SentimentAnalyzer::analyze("gain gains gained gaining");
        assert_eq!(r.score, 1);
    }

    #[test]
    fn test_keyword_must_start_the_word() {
        // "outgrowth" and "airdrop" contain keywords but do not start with them
        let r = SentimentAnalyzer::analyze("an outgrowth of the airdrop");
        assert_eq!(r.score, 0);
    }

    #[test]
    fn test_swap_flips_sign() {
        let cases = [
            "good growth and strong margins",
            "loss widened while margins decline",
            "improve estimates but guidance drop",
            "positive gain weak bad",
            "nothing to see here",
        ];

        for text in cases {
            let original = SentimentAnalyzer::analyze(text).score;
            let swapped = SentimentAnalyzer::analyze(&swap_polarity(text)).score;
            assert_eq!(original, -swapped, "{}", text);
        }
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(SentimentAnalyzer::analyze("bad")).unwrap();
        assert_eq!(json["sentiment"], "negative");
        assert_eq!(json["score"], -1);
    }
}
