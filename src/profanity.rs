use regex::{Regex, RegexBuilder};

use crate::error::AppError;

const BLOCKLIST: &[&str] = &[
    "arsehole",
    "asshole",
    "bastard",
    "bitch",
    "bollocks",
    "bullshit",
    "cunt",
    "dickhead",
    "douchebag",
    "fuck",
    "fucked",
    "fucker",
    "fucking",
    "motherfucker",
    "prick",
    "shit",
    "shitty",
    "slut",
    "twat",
    "wanker",
    "whore",
];

/// Whole-word, case-insensitive blocklist match.
#[derive(Clone, Debug)]
pub struct ProfanityFilter {
    pattern: Regex,
}

impl ProfanityFilter {
    pub fn new(extra_words: &[String]) -> Result<Self, regex::Error> {
        let words = BLOCKLIST
            .iter()
            .map(|w| regex::escape(w))
            .chain(extra_words.iter().map(|w| regex::escape(w)))
            .collect::<Vec<_>>();
        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", words.join("|")))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern })
    }

    pub fn exists(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn check(&self, text: &str) -> Result<(), AppError> {
        if self.exists(text) {
            return Err(AppError::profanity());
        }
        Ok(())
    }
}
