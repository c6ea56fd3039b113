//! Question bank management
//!
//! The bank merges the read-only built-in questions with the user's custom
//! questions. Custom questions are written through to a [`KeyValueStore`]
//! on every change, so the stored array always equals the in-memory list
//! once a mutating call returns.

use std::str::FromStr;

use derive_where::derive_where;
use enum_map::EnumMap;
use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    builtin,
    constants::bank::CUSTOM_QUESTIONS_KEY,
    question::{Category, Difficulty, Question},
    storage::{self, KeyValueStore},
};

/// Which part of the bank a query reads from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Built-in questions followed by custom questions
    #[default]
    All,
    /// Built-in questions only
    Base,
    /// Custom questions only
    Custom,
}

/// The text names no known [`Source`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown question source `{0}`")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "base" => Ok(Self::Base),
            "custom" => Ok(Self::Custom),
            _ => Err(UnknownSource(s.to_owned())),
        }
    }
}

/// Optional constraints applied by [`QuestionBank::list`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    /// Keep only questions of this difficulty
    pub difficulty: Option<Difficulty>,
    /// Keep only questions of this category
    pub category: Option<Category>,
}

impl Filter {
    /// A filter accepting every question
    pub fn any() -> Self {
        Self::default()
    }

    /// Restricts the filter to one difficulty
    #[must_use]
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Restricts the filter to one category
    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Whether `question` satisfies every supplied constraint
    pub fn matches(&self, question: &Question) -> bool {
        self.difficulty.is_none_or(|d| d == question.difficulty)
            && self.category.is_none_or(|c| c == question.category)
    }
}

/// Errors raised by the question bank
#[derive(Error, Debug)]
pub enum Error {
    /// Import content is not JSON at all
    #[error("import is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    /// Import content is JSON but not a top-level array
    #[error("import must be a JSON array of questions")]
    NotAnArray,
    /// A question failed schema validation
    #[error("question is invalid: {0}")]
    Invalid(#[from] garde::Report),
    /// Questions could not be encoded for storage or export
    #[error("failed to encode questions: {0}")]
    Encode(#[source] serde_json::Error),
    /// The storage backend failed; the in-memory list is unchanged
    #[error(transparent)]
    Storage(#[from] storage::Error),
}

/// An import entry that failed the schema check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejected {
    /// Position of the entry in the imported array
    pub index: usize,
    /// Why the entry was rejected
    pub reason: String,
}

/// Outcome of [`QuestionBank::import`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Number of questions appended to the custom list
    pub added: usize,
    /// Entries skipped because they failed the schema check
    pub rejected: Vec<Rejected>,
}

/// Built-in and custom questions with write-through persistence
#[derive_where(Debug)]
pub struct QuestionBank<S> {
    /// Read-only questions shipped with the game
    built_in: Vec<Question>,
    /// User-authored questions, mirrored in `store`
    custom: Vec<Question>,
    #[derive_where(skip)]
    store: S,
}

/// Reads the custom list, treating absent or malformed content as empty
fn load_custom<S: KeyValueStore>(store: &S) -> Vec<Question> {
    match store.get(CUSTOM_QUESTIONS_KEY) {
        Ok(None) => Vec::new(),
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("stored custom questions are malformed, starting empty: {e}");
            Vec::new()
        }),
        Err(e) => {
            warn!("could not read custom questions, starting empty: {e}");
            Vec::new()
        }
    }
}

impl<S: KeyValueStore> QuestionBank<S> {
    /// Opens the bank with the shipped built-in questions
    pub fn open(store: S) -> Self {
        Self::with_built_in(builtin::questions().to_vec(), store)
    }

    /// Opens the bank with a specific built-in set
    pub fn with_built_in(built_in: Vec<Question>, store: S) -> Self {
        let custom = load_custom(&store);
        debug!(
            built_in = built_in.len(),
            custom = custom.len(),
            "opened question bank"
        );
        Self {
            built_in,
            custom,
            store,
        }
    }

    /// The storage backend
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The built-in questions
    pub fn built_in(&self) -> &[Question] {
        &self.built_in
    }

    /// The custom questions, in insertion order
    pub fn custom(&self) -> &[Question] {
        &self.custom
    }

    fn source(&self, source: Source) -> impl Iterator<Item = &Question> {
        let (base, custom) = match source {
            Source::All => (self.built_in.as_slice(), self.custom.as_slice()),
            Source::Base => (self.built_in.as_slice(), &[][..]),
            Source::Custom => (&[][..], self.custom.as_slice()),
        };
        base.iter().chain(custom)
    }

    /// Questions from `source` matching `filter`, in storage order
    pub fn list(&self, source: Source, filter: Filter) -> Vec<&Question> {
        self.source(source)
            .filter(|question| filter.matches(question))
            .collect_vec()
    }

    /// Number of questions per category in `source` at `difficulty`
    pub fn category_counts(
        &self,
        source: Source,
        difficulty: Difficulty,
    ) -> EnumMap<Category, usize> {
        let mut counts = EnumMap::default();
        for question in self
            .source(source)
            .filter(|question| question.difficulty == difficulty)
        {
            counts[question.category] += 1;
        }
        counts
    }

    /// Persists `custom` and only then adopts it as the in-memory list
    fn commit(&mut self, custom: Vec<Question>) -> Result<(), Error> {
        let raw = serde_json::to_string(&custom).map_err(Error::Encode)?;
        self.store.set(CUSTOM_QUESTIONS_KEY, &raw)?;
        self.custom = custom;
        Ok(())
    }

    /// Appends a custom question and returns its index
    ///
    /// # Errors
    ///
    /// Fails if the question is invalid or cannot be persisted.
    pub fn add(&mut self, question: Question) -> Result<usize, Error> {
        question.validate()?;
        let mut custom = self.custom.clone();
        custom.push(question);
        self.commit(custom)?;
        info!(total = self.custom.len(), "added custom question");
        Ok(self.custom.len() - 1)
    }

    /// Appends several custom questions; nothing is added if any is invalid
    ///
    /// # Errors
    ///
    /// Fails if a question is invalid or the list cannot be persisted.
    pub fn add_many<I>(&mut self, questions: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = Question>,
    {
        let questions = questions.into_iter().collect_vec();
        for question in &questions {
            question.validate()?;
        }
        let added = questions.len();
        let mut custom = self.custom.clone();
        custom.extend(questions);
        self.commit(custom)?;
        info!(added, total = self.custom.len(), "added custom questions");
        Ok(added)
    }

    /// Replaces the custom question at `index`
    ///
    /// Returns `false` without touching anything if `index` is out of range.
    ///
    /// # Errors
    ///
    /// Fails if the question is invalid or the list cannot be persisted.
    pub fn update(&mut self, index: usize, question: Question) -> Result<bool, Error> {
        if index >= self.custom.len() {
            debug!(index, "update ignored, no such custom question");
            return Ok(false);
        }
        question.validate()?;
        let mut custom = self.custom.clone();
        custom[index] = question;
        self.commit(custom)?;
        Ok(true)
    }

    /// Removes the custom question at `index`
    ///
    /// Built-in questions are not addressable here. Returns `None` if
    /// `index` is out of range.
    ///
    /// # Errors
    ///
    /// Fails if the list cannot be persisted.
    pub fn delete(&mut self, index: usize) -> Result<Option<Question>, Error> {
        if index >= self.custom.len() {
            debug!(index, "delete ignored, no such custom question");
            return Ok(None);
        }
        let mut custom = self.custom.clone();
        let removed = custom.remove(index);
        self.commit(custom)?;
        Ok(Some(removed))
    }

    /// Removes every custom question and returns how many were removed
    ///
    /// # Errors
    ///
    /// Fails if the empty list cannot be persisted.
    pub fn clear_custom(&mut self) -> Result<usize, Error> {
        let removed = self.custom.len();
        self.commit(Vec::new())?;
        info!(removed, "cleared custom questions");
        Ok(removed)
    }

    /// Pretty-printed JSON array of the custom questions
    ///
    /// # Errors
    ///
    /// Fails only if encoding fails.
    pub fn export(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(&self.custom).map_err(Error::Encode)
    }

    /// Appends the valid questions of a JSON array
    ///
    /// Each entry is decoded and validated on its own; entries that fail are
    /// listed in the summary and skipped.
    ///
    /// # Errors
    ///
    /// Fails if `raw` is not JSON, is not an array, or the result cannot be
    /// persisted.
    pub fn import(&mut self, raw: &[u8]) -> Result<ImportSummary, Error> {
        let value: serde_json::Value = serde_json::from_slice(raw).map_err(Error::Parse)?;
        let serde_json::Value::Array(entries) = value else {
            return Err(Error::NotAnArray);
        };

        let mut accepted = Vec::with_capacity(entries.len());
        let mut rejected = Vec::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let checked = serde_json::from_value::<Question>(entry)
                .map_err(|e| e.to_string())
                .and_then(|question| {
                    question
                        .validate()
                        .map(|()| question)
                        .map_err(|report| report.to_string())
                });
            match checked {
                Ok(question) => accepted.push(question),
                Err(reason) => {
                    warn!(index, %reason, "rejected imported question");
                    rejected.push(Rejected { index, reason });
                }
            }
        }

        let added = accepted.len();
        if added > 0 {
            let mut custom = self.custom.clone();
            custom.extend(accepted);
            self.commit(custom)?;
        }

        info!(added, rejected = rejected.len(), "imported questions");
        Ok(ImportSummary { added, rejected })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        question::MatchType,
        storage::{Error as StorageError, MemoryStore},
    };

    fn built_in() -> Vec<Question> {
        vec![
            Question::new("Кто построил ковчег?", "Ной", Category::OldTestament, Difficulty::Easy)
                .with_keywords(["ной"]),
            Question::new("Кто крестил Иисуса?", "Иоанн", Category::NewTestament, Difficulty::Medium)
                .with_keywords(["иоанн"]),
        ]
    }

    fn custom(n: usize) -> Question {
        Question::new(
            format!("Вопрос {n}"),
            format!("Ответ {n}"),
            Category::Miracles,
            Difficulty::Hard,
        )
    }

    fn bank() -> QuestionBank<MemoryStore> {
        QuestionBank::with_built_in(built_in(), MemoryStore::new())
    }

    fn stored<S: KeyValueStore>(bank: &QuestionBank<S>) -> Vec<Question> {
        bank.store()
            .get(CUSTOM_QUESTIONS_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
            .unwrap_or_default()
    }

    /// Accepts reads but refuses every write
    #[derive(Default)]
    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: key.to_owned(),
                source: std::io::Error::other("read-only"),
            })
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.set(key, "")
        }
    }

    #[test]
    fn test_absent_storage_is_empty() {
        let bank = bank();
        assert!(bank.custom().is_empty());
        assert_eq!(bank.list(Source::All, Filter::any()).len(), 2);
    }

    #[test]
    fn test_malformed_storage_is_empty() {
        let store = MemoryStore::with_entry(CUSTOM_QUESTIONS_KEY, "{not json");
        let bank = QuestionBank::with_built_in(built_in(), store);
        assert!(bank.custom().is_empty());

        let store = MemoryStore::with_entry(CUSTOM_QUESTIONS_KEY, r#"{"text": "object"}"#);
        let bank = QuestionBank::with_built_in(built_in(), store);
        assert!(bank.custom().is_empty());
    }

    #[test]
    fn test_reopen_reads_stored_questions() {
        let mut bank = bank();
        bank.add(custom(1)).unwrap();
        let store = bank.store().clone();

        let reopened = QuestionBank::with_built_in(built_in(), store);
        assert_eq!(reopened.custom(), &[custom(1)]);
    }

    #[test]
    fn test_write_through_after_every_mutation() {
        let mut bank = bank();

        bank.add(custom(1)).unwrap();
        assert_eq!(stored(&bank), bank.custom());

        bank.add_many([custom(2), custom(3), custom(4)]).unwrap();
        assert_eq!(stored(&bank), bank.custom());

        assert!(bank.update(1, custom(20)).unwrap());
        assert_eq!(stored(&bank), bank.custom());

        assert_eq!(bank.delete(0).unwrap(), Some(custom(1)));
        assert_eq!(stored(&bank), bank.custom());

        assert_eq!(bank.custom(), &[custom(20), custom(3), custom(4)]);

        assert_eq!(bank.clear_custom().unwrap(), 3);
        assert!(stored(&bank).is_empty());
        assert!(bank.custom().is_empty());
    }

    #[test]
    fn test_write_through_with_pseudo_random_operations() {
        let mut bank = bank();
        let mut rng = fastrand::Rng::with_seed(7);

        for step in 0..200 {
            let len = bank.custom().len();
            match rng.u8(0..3) {
                0 => {
                    bank.add(custom(step)).unwrap();
                }
                1 => {
                    bank.update(rng.usize(0..=len), custom(step)).unwrap();
                }
                _ => {
                    bank.delete(rng.usize(0..=len)).unwrap();
                }
            }
            assert_eq!(stored(&bank), bank.custom());
        }
    }

    #[test]
    fn test_no_op_on_empty_bank_writes_nothing() {
        let mut bank = bank();
        assert!(!bank.update(0, custom(1)).unwrap());
        assert_eq!(bank.delete(0).unwrap(), None);

        assert_eq!(bank.store().get(CUSTOM_QUESTIONS_KEY).unwrap(), None);
        assert!(stored(&bank).is_empty());
    }

    #[test]
    fn test_update_out_of_range_is_silent() {
        let mut bank = bank();
        bank.add(custom(1)).unwrap();

        assert!(!bank.update(1, custom(2)).unwrap());
        assert_eq!(bank.custom(), &[custom(1)]);
    }

    #[test]
    fn test_delete_out_of_range_is_silent() {
        let mut bank = bank();
        assert_eq!(bank.delete(0).unwrap(), None);
        assert_eq!(bank.built_in().len(), 2);
    }

    #[test]
    fn test_built_in_never_deleted() {
        let mut bank = bank();
        bank.add(custom(1)).unwrap();
        bank.delete(0).unwrap();

        assert_eq!(bank.list(Source::Base, Filter::any()).len(), 2);
        assert!(bank.list(Source::Custom, Filter::any()).is_empty());
    }

    #[test]
    fn test_invalid_question_rejected_on_add() {
        let mut bank = bank();
        let mut question = custom(1);
        question.correct_answer = " ".to_string();

        assert!(matches!(bank.add(question.clone()), Err(Error::Invalid(_))));
        assert!(matches!(
            bank.add_many([custom(2), question]),
            Err(Error::Invalid(_))
        ));
        assert!(bank.custom().is_empty());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let mut bank = QuestionBank::with_built_in(built_in(), ReadOnlyStore::default());

        assert!(matches!(bank.add(custom(1)), Err(Error::Storage(_))));
        assert!(bank.custom().is_empty());
        assert!(matches!(
            bank.import(br#"[]"#),
            Ok(ImportSummary { added: 0, .. })
        ));
    }

    #[test]
    fn test_list_filters() {
        let mut bank = bank();
        bank.add(custom(1)).unwrap();

        assert_eq!(bank.list(Source::All, Filter::any()).len(), 3);
        assert_eq!(bank.list(Source::Base, Filter::any()).len(), 2);
        assert_eq!(bank.list(Source::Custom, Filter::any()), vec![&custom(1)]);

        let easy = bank.list(Source::All, Filter::any().difficulty(Difficulty::Easy));
        assert_eq!(easy.len(), 1);
        assert_eq!(easy[0].correct_answer, "Ной");

        let none = bank.list(
            Source::All,
            Filter::any()
                .difficulty(Difficulty::Easy)
                .category(Category::Miracles),
        );
        assert!(none.is_empty());

        let all = bank.list(Source::All, Filter::any());
        assert_eq!(all[2], &custom(1));
    }

    #[test]
    fn test_category_counts() {
        let mut bank = bank();
        bank.add_many([custom(1), custom(2)]).unwrap();

        let counts = bank.category_counts(Source::All, Difficulty::Hard);
        assert_eq!(counts[Category::Miracles], 2);
        assert_eq!(counts[Category::OldTestament], 0);

        let counts = bank.category_counts(Source::Base, Difficulty::Hard);
        assert_eq!(counts.values().sum::<usize>(), 0);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut bank = bank();
        bank.add_many([
            custom(1),
            custom(2).with_keywords(["ответ"]).with_match_type(MatchType::Fuzzy),
        ])
        .unwrap();

        let exported = bank.export().unwrap();
        assert!(exported.contains('\n'));

        let mut fresh = QuestionBank::with_built_in(Vec::new(), MemoryStore::new());
        let summary = fresh.import(exported.as_bytes()).unwrap();

        assert_eq!(summary.added, 2);
        assert!(summary.rejected.is_empty());
        assert_eq!(fresh.custom(), bank.custom());
        assert_eq!(stored(&fresh), fresh.custom());
    }

    #[test]
    fn test_import_rejects_non_array() {
        let mut bank = bank();
        assert!(matches!(
            bank.import(br#"{"text": "q"}"#),
            Err(Error::NotAnArray)
        ));
        assert!(matches!(bank.import(b"not json"), Err(Error::Parse(_))));
        assert!(bank.custom().is_empty());
    }

    #[test]
    fn test_import_rejects_malformed_entries_individually() {
        let mut bank = bank();
        let raw = r#"[
            {"text": "Кто построил ковчег?", "correctAnswer": "Ной",
             "acceptableKeywords": ["ной"], "category": "old_testament",
             "difficulty": 1, "matchType": "exact"},
            {"text": "Без ответа", "category": "miracles", "difficulty": 1, "matchType": "exact"},
            {"text": "Сложность", "correctAnswer": "x", "category": "miracles",
             "difficulty": 7, "matchType": "exact"},
            {"text": "Правило", "correctAnswer": "x", "category": "miracles",
             "difficulty": 2, "matchType": "loose"},
            {"text": "   ", "correctAnswer": "x", "category": "miracles",
             "difficulty": 2, "matchType": "exact"},
            42
        ]"#;

        let summary = bank.import(raw.as_bytes()).unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(
            summary.rejected.iter().map(|r| r.index).collect_vec(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(bank.custom().len(), 1);
        assert_eq!(stored(&bank), bank.custom());
    }

    #[test]
    fn test_import_appends_after_existing() {
        let mut bank = bank();
        bank.add(custom(1)).unwrap();
        let exported = bank.export().unwrap();

        let summary = bank.import(exported.as_bytes()).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(bank.custom(), &[custom(1), custom(1)]);
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("base".parse::<Source>().unwrap(), Source::Base);
        assert!("builtin".parse::<Source>().is_err());
    }
}
