use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Identifier of a person record.
///
/// Upstream records carry ids either as strings or as integers; both are
/// normalized to their string form on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(value: impl Into<String>) -> Result<Self, PersonsError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(PersonsError::EmptyId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for PersonId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Int(value) => value.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for PersonId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawId::deserialize(deserializer)?;
        PersonId::new(raw.into_string()).map_err(serde::de::Error::custom)
    }
}

/// `null`, a missing field and `""` all mean "no parent recorded".
fn deserialize_parent_ref<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PersonId>, D::Error> {
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw
        .map(RawId::into_string)
        .filter(|value| !value.trim().is_empty())
        .map(PersonId))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Homme,
    Femme,
}

impl Genre {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "homme" | "male" | "m" | "h" | "man" => Some(Self::Homme),
            "femme" | "female" | "f" | "woman" => Some(Self::Femme),
            _ => None,
        }
    }
}

fn deserialize_genre<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Genre>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Genre::from_token))
}

/// Source record as supplied by the person store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub prenom: String,
    #[serde(default, deserialize_with = "deserialize_genre")]
    pub genre: Option<Genre>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date_naissance: Option<String>,
    #[serde(default)]
    pub date_deces: Option<String>,
    #[serde(default)]
    pub ordre_naissance: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_parent_ref")]
    pub pere: Option<PersonId>,
    #[serde(default, deserialize_with = "deserialize_parent_ref")]
    pub mere: Option<PersonId>,
}

impl Person {
    pub fn new(id: PersonId) -> Self {
        Self {
            id,
            nom: String::new(),
            prenom: String::new(),
            genre: None,
            description: None,
            date_naissance: None,
            date_deces: None,
            ordre_naissance: None,
            image: None,
            pere: None,
            mere: None,
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.prenom.trim(), self.nom.trim());
        let name = name.trim();
        if name.is_empty() {
            self.id.to_string()
        } else {
            name.to_string()
        }
    }

    pub fn is_root(&self) -> bool {
        self.pere.is_none() && self.mere.is_none()
    }

    pub fn is_deceased(&self) -> bool {
        self.date_deces
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.date_naissance.as_deref().and_then(parse_calendar_date)
    }

    pub fn is_child_of(&self, parent: &PersonId) -> bool {
        self.pere.as_ref() == Some(parent) || self.mere.as_ref() == Some(parent)
    }
}

/// Parses the leading `YYYY-MM-DD` of a date string; time suffixes such as
/// `T00:00:00.000Z` are ignored.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[derive(Debug, thiserror::Error)]
pub enum PersonsError {
    #[error("person id must not be empty")]
    EmptyId,
    #[error("failed to read persons from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid persons JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersonsDocument {
    List(Vec<Person>),
    Wrapped { persons: Vec<Person> },
}

/// Parses a pre-fetched person collection, either a bare array or
/// `{ "persons": [...] }`. Later records reusing an id are dropped.
pub fn parse_persons(input: &str) -> Result<Vec<Person>, PersonsError> {
    let document: PersonsDocument = serde_json::from_str(input)?;
    let persons = match document {
        PersonsDocument::List(persons) | PersonsDocument::Wrapped { persons } => persons,
    };
    Ok(dedup_persons(persons))
}

pub fn load_persons(path: &Path) -> Result<Vec<Person>, PersonsError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PersonsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_persons(&contents)
}

fn dedup_persons(persons: Vec<Person>) -> Vec<Person> {
    let mut seen: HashSet<PersonId> = HashSet::with_capacity(persons.len());
    let mut out = Vec::with_capacity(persons.len());
    for person in persons {
        if !seen.insert(person.id.clone()) {
            tracing::warn!(id = %person.id, "dropping duplicate person record");
            continue;
        }
        out.push(person);
    }
    out
}
