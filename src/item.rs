use include_dir::{include_dir, Dir};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::fmt;
use thiserror::Error;

static ALPHABET_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/alphabets");

/// Identifier of the learner whose statistics are being read or written.
/// Profiles are owned elsewhere; the engine only ever sees the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LetterCase {
    Lower,
    Upper,
}

impl LetterCase {
    /// Parse the tag written by `Display` ("lower" / "upper")
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            _ => None,
        }
    }
}

/// A single practiceable unit: one letter in one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub letter: char,
    pub case: LetterCase,
}

impl ItemKey {
    /// Build a key from any rendering of the letter; the base letter is always stored lowercase.
    pub fn new(letter: char, case: LetterCase) -> Self {
        Self {
            letter: to_base_letter(letter),
            case,
        }
    }

    pub fn lower(letter: char) -> Self {
        Self::new(letter, LetterCase::Lower)
    }

    pub fn upper(letter: char) -> Self {
        Self::new(letter, LetterCase::Upper)
    }

    /// The letter as it is shown to the learner
    pub fn glyph(&self) -> String {
        match self.case {
            LetterCase::Lower => self.letter.to_string(),
            LetterCase::Upper => self.letter.to_uppercase().collect(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glyph())
    }
}

/// Which case variants a round may draw from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaseFilter {
    #[default]
    Lower,
    Upper,
    Mixed,
}

impl CaseFilter {
    pub fn cases(&self) -> &'static [LetterCase] {
        match self {
            CaseFilter::Lower => &[LetterCase::Lower],
            CaseFilter::Upper => &[LetterCase::Upper],
            CaseFilter::Mixed => &[LetterCase::Lower, LetterCase::Upper],
        }
    }

    pub fn allows(&self, case: LetterCase) -> bool {
        self.cases().contains(&case)
    }

    /// Pick a case for one letter, uniformly at random when both are allowed
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> LetterCase {
        match self {
            CaseFilter::Lower => LetterCase::Lower,
            CaseFilter::Upper => LetterCase::Upper,
            CaseFilter::Mixed => {
                if rng.gen_bool(0.5) {
                    LetterCase::Upper
                } else {
                    LetterCase::Lower
                }
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum UniverseError {
    #[error("alphabet file not found: {0}")]
    NotFound(String),

    #[error("alphabet file {0} is not valid UTF-8")]
    NotUtf8(String),

    #[error("malformed alphabet file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Alphabets shipped with the crate
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Alphabet {
    English,
    German,
}

impl Alphabet {
    pub fn universe(&self) -> Result<ItemUniverse, UniverseError> {
        ItemUniverse::load(&self.to_string())
    }
}

#[derive(Deserialize)]
struct AlphabetFile {
    name: String,
    letters: Vec<char>,
}

/// The set of letters a profile practices. Passed explicitly to every
/// operation that needs it, so independent universes can coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUniverse {
    name: String,
    letters: Vec<char>,
}

impl ItemUniverse {
    /// Letters are lowercased and de-duplicated, keeping first-seen order
    pub fn new(name: impl Into<String>, letters: impl IntoIterator<Item = char>) -> Self {
        let mut unique: Vec<char> = Vec::new();
        for letter in letters.into_iter().map(to_base_letter) {
            if !unique.contains(&letter) {
                unique.push(letter);
            }
        }
        Self {
            name: name.into(),
            letters: unique,
        }
    }

    /// Load one of the embedded alphabets by file stem
    pub fn load(name: &str) -> Result<Self, UniverseError> {
        let file_name = format!("{name}.json");
        let file = ALPHABET_DIR
            .get_file(&file_name)
            .ok_or_else(|| UniverseError::NotFound(file_name.clone()))?;
        let contents = file
            .contents_utf8()
            .ok_or(UniverseError::NotUtf8(file_name))?;
        let parsed: AlphabetFile = from_str(contents)?;
        Ok(Self::new(parsed.name, parsed.letters))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn letters(&self) -> &[char] {
        &self.letters
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Letters kept by an optional focus set, in universe order
    pub fn focused_letters(&self, focus: Option<&[char]>) -> Vec<char> {
        match focus {
            None => self.letters.clone(),
            Some(focus) => {
                let focus: Vec<char> = focus.iter().copied().map(to_base_letter).collect();
                self.letters
                    .iter()
                    .copied()
                    .filter(|letter| focus.contains(letter))
                    .collect()
            }
        }
    }

    /// Every item eligible under `filter`, letter-major
    pub fn items(&self, filter: CaseFilter) -> Vec<ItemKey> {
        self.letters
            .iter()
            .flat_map(|&letter| filter.cases().iter().map(move |&case| ItemKey::new(letter, case)))
            .collect()
    }

    /// Both cases of every letter; the set seeded at profile initialization
    pub fn all_items(&self) -> Vec<ItemKey> {
        self.items(CaseFilter::Mixed)
    }
}

fn to_base_letter(letter: char) -> char {
    let mut lower = letter.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => letter,
    }
}
