//! JLPT kanji quiz.
//!
//! Picks random kanji from the selected JLPT levels and resolves each one
//! against the KANJIDIC search index.

use crate::core::dictionary::{BuiltinDictionary, DictionaryLayout};
use crate::core::fetch::is_complete;
use crate::error::{AedictError, Result};
use rand::Rng;
use std::collections::BTreeSet;
use std::fmt;

pub const QUIZ_QUESTION_COUNT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JlptLevel {
    N1 = 1,
    N2 = 2,
    N3 = 3,
    N4 = 4,
    N5 = 5,
    N6 = 6,
}

/// Every selectable level with its label, in display order.
pub const JLPT_LEVELS: [(JlptLevel, &str); 6] = [
    (JlptLevel::N1, "JLPT Level 1"),
    (JlptLevel::N2, "JLPT Level 2"),
    (JlptLevel::N3, "JLPT Level 3"),
    (JlptLevel::N4, "JLPT Level 4"),
    (JlptLevel::N5, "JLPT Level 5"),
    (JlptLevel::N6, "JLPT Level 6"),
];

impl JlptLevel {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        JLPT_LEVELS
            .iter()
            .map(|(level, _)| *level)
            .find(|level| level.number() == number)
    }

    pub fn label(self) -> &'static str {
        JLPT_LEVELS
            .iter()
            .find(|(level, _)| *level == self)
            .map(|(_, label)| *label)
            .unwrap_or_default()
    }
}

impl fmt::Display for JlptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Kanji(char),
}

/// A search hit. Invalid entries carry the failure text in `english`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub kanji: Option<String>,
    pub reading: Option<String>,
    pub english: String,
    pub valid: bool,
}

/// Query in, ranked entries out. Implemented by the search index component.
pub trait SearchIndex {
    fn search(&self, query: &SearchQuery) -> Result<Vec<DictEntry>>;
}

/// Source of the kanji taught at each JLPT level.
pub trait KanjiPool {
    fn kanji_for_level(&self, level: JlptLevel) -> &str;
}

/// Draws up to [`QUIZ_QUESTION_COUNT`] distinct kanji from the selected
/// levels and looks each one up.
pub fn generate_questions<R: Rng>(
    levels: &BTreeSet<JlptLevel>,
    pool: &dyn KanjiPool,
    index: &dyn SearchIndex,
    rng: &mut R,
) -> Result<Vec<DictEntry>> {
    let mut kanji: Vec<char> = levels
        .iter()
        .flat_map(|level| pool.kanji_for_level(*level).chars())
        .collect();

    let mut questions = Vec::new();
    while questions.len() < QUIZ_QUESTION_COUNT && !kanji.is_empty() {
        let picked = kanji.swap_remove(rng.random_range(0..kanji.len()));
        let results = index.search(&SearchQuery::Kanji(picked))?;
        if let Some(invalid) = results.iter().find(|e| !e.valid) {
            return Err(AedictError::InvalidEntry {
                message: invalid.english.clone(),
            });
        }
        let best = results
            .into_iter()
            .next()
            .ok_or(AedictError::KanjiNotFound { kanji: picked })?;
        questions.push(best);
    }
    Ok(questions)
}

/// Starts quizzes once KANJIDIC is available.
pub struct QuizLauncher<'a> {
    pool: &'a dyn KanjiPool,
    index: &'a dyn SearchIndex,
}

impl<'a> QuizLauncher<'a> {
    pub fn new(
        layout: &DictionaryLayout,
        pool: &'a dyn KanjiPool,
        index: &'a dyn SearchIndex,
    ) -> Result<Self> {
        if !is_complete(&layout.kanjidic_dir()) {
            return Err(AedictError::DictionaryMissing {
                name: BuiltinDictionary::Kanjidic.display_name().to_string(),
            });
        }
        Ok(Self { pool, index })
    }

    pub fn launch(&self, levels: &BTreeSet<JlptLevel>) -> Result<Vec<DictEntry>> {
        if levels.is_empty() {
            return Ok(Vec::new());
        }
        generate_questions(levels, self.pool, self.index, &mut rand::rng())
    }
}
