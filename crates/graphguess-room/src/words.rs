//! Secret word selection.

use rand::seq::IndexedRandom;

use crate::RoomError;

/// Words used when no vocabulary is configured.
pub const DEFAULT_WORDS: &[&str] = &[
    "elma",
    "araba",
    "ev",
    "kalem",
    "masa",
    "kitap",
    "telefon",
    "bilgisayar",
];

/// Supplies the secret word for each round.
pub trait WordSource: Send + Sync + 'static {
    fn next_word(&self) -> String;
}

/// Uniform random choice from a fixed, non-empty word list. Repeats across
/// rounds are allowed.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    /// Builds a vocabulary, dropping blank entries.
    ///
    /// # Errors
    /// Returns [`RoomError::EmptyVocabulary`] if no word remains.
    pub fn new<I, S>(words: I) -> Result<Self, RoomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| {
                let w: String = w.into();
                w.trim().to_string()
            })
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Err(RoomError::EmptyVocabulary);
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl WordSource for Vocabulary {
    fn next_word(&self) -> String {
        // `new` guarantees at least one word.
        self.words
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_vocabulary_is_rejected() {
        let result = Vocabulary::new(Vec::<String>::new());
        assert_eq!(result.unwrap_err(), RoomError::EmptyVocabulary);
    }

    #[test]
    fn test_blank_words_are_dropped() {
        let vocab = Vocabulary::new([" ", "sinüs ", ""]).unwrap();
        assert_eq!(vocab.words(), ["sinüs"]);
        let result = Vocabulary::new(["  ", ""]);
        assert!(result.is_err());
    }

    #[test]
    fn test_next_word_comes_from_list() {
        let vocab = Vocabulary::default();
        for _ in 0..50 {
            let word = vocab.next_word();
            assert!(DEFAULT_WORDS.contains(&word.as_str()));
        }
    }

    #[test]
    fn test_next_word_reaches_every_word() {
        let vocab = Vocabulary::new(["sinüs", "kosinüs"]).unwrap();
        let drawn: std::collections::BTreeSet<String> =
            (0..200).map(|_| vocab.next_word()).collect();
        assert_eq!(drawn.len(), 2);
    }

    #[test]
    fn test_single_word_vocabulary() {
        let vocab = Vocabulary::new(["parabol"]).unwrap();
        assert_eq!(vocab.next_word(), "parabol");
        assert_eq!(vocab.next_word(), "parabol");
    }
}
