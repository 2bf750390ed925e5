//! Collaborator contracts the resolver consumes.
//!
//! Storage, fetching and rendering of the underlying records live outside this
//! crate; only the minimal query surface is described here.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::errors::{FilterError, Result};

pub type Id = u64;

/// A user account as seen by the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: Id,
    pub username: String,
    pub idnumber: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub phone1: String,
    pub phone2: String,
    pub address: String,
    pub city: String,
    pub country: String,
    /// Unix timestamp; `None` when the account never logged in.
    pub lastlogin: Option<i64>,
    pub picture: String,
}

impl Profile {
    pub fn fullname(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

/// The course (or any other subject) the text is rendered within.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    pub id: Id,
    pub fullname: String,
    pub shortname: String,
    pub idnumber: String,
    pub summary: String,
    pub startdate: i64,
}

/// Level of a metadata context. Codes follow the usual LMS numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLevel {
    User,
    #[serde(rename = "coursecat")]
    CourseCategory,
    Course,
    Module,
}

impl ContextLevel {
    pub fn code(self) -> u16 {
        match self {
            ContextLevel::User => 30,
            ContextLevel::CourseCategory => 40,
            ContextLevel::Course => 50,
            ContextLevel::Module => 70,
        }
    }
}

pub trait ProfileStore {
    fn profile(&self, id: Id) -> Result<Option<Profile>>;
    /// Custom profile fields keyed by shortname.
    fn custom_fields(&self, id: Id) -> Result<HashMap<String, String>>;
}

pub trait ScopeStore {
    fn scope(&self, id: Id) -> Result<Option<Scope>>;
}

pub trait MembershipStore {
    fn roles_of(&self, user: Id, scope: Id) -> Result<Vec<String>>;
    /// Accounts holding `role` in `scope`, in query order.
    fn role_holders(&self, scope: Id, role: &str) -> Result<Vec<Profile>>;
    fn groups_of(&self, user: Id, scope: Id) -> Result<Vec<String>>;
    fn groupings_of(&self, user: Id, scope: Id) -> Result<Vec<String>>;
    fn enrolment_date(&self, user: Id, scope: Id) -> Result<Option<i64>>;
    fn final_grade(&self, user: Id, scope: Id) -> Result<Option<f64>>;
}

/// Maps a metadata context name to an instance when the token doesn't carry one.
pub trait InstanceResolver {
    fn resolve_instance(&self, category: &str, scope: Option<Id>) -> Result<Option<Id>>;
}

pub trait MetadataStore {
    fn field_value(&self, instance: Id, level: ContextLevel, field: &str) -> Result<Option<String>>;
}

/// Everything a filtering pass may query.
pub trait DataSource:
    ProfileStore + ScopeStore + MembershipStore + InstanceResolver + MetadataStore
{
}

impl<T> DataSource for T where
    T: ProfileStore + ScopeStore + MembershipStore + InstanceResolver + MetadataStore
{
}

pub trait Localizer {
    fn string_for(&self, key: &str, component: &str) -> String;
}

/// Built-in English strings, optionally overridden per key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnglishStrings {
    #[serde(default)]
    overrides: HashMap<String, String>,
}

impl EnglishStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, key: &str, value: &str) -> Self {
        self.overrides.insert(key.to_string(), value.to_string());
        self
    }
}

impl Localizer for EnglishStrings {
    fn string_for(&self, key: &str, component: &str) -> String {
        if let Some(s) = self.overrides.get(key) {
            return s.clone();
        }
        match key {
            "guest" => "Guest user".to_string(),
            "nograde" => "No grade".to_string(),
            "novalue" => "No value".to_string(),
            "noinstance" => "No matching instance".to_string(),
            "unknowncontext" => "Unknown metadata context".to_string(),
            "lookuperror" => "Error retrieving value".to_string(),
            // Unknown keys render the way a missing language string does.
            _ => format!("[[{key}, {component}]]"),
        }
    }
}

pub trait DateFormatter {
    fn format(&self, timestamp: i64) -> String;
}

/// Formats Unix timestamps in UTC with a strftime pattern.
#[derive(Debug, Clone)]
pub struct ChronoDateFormatter {
    pattern: String,
}

impl ChronoDateFormatter {
    /// Takes the pattern as is; a bad specifier makes `format` fall back to
    /// the raw timestamp.
    pub fn new(pattern: &str) -> Self {
        Self { pattern: pattern.to_string() }
    }

    /// Like `new`, but rejects patterns chrono can't render.
    pub fn try_new(pattern: &str) -> Result<Self> {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(FilterError::Config(format!("bad date pattern `{pattern}`")));
        }
        Ok(Self::new(pattern))
    }
}

impl Default for ChronoDateFormatter {
    fn default() -> Self {
        Self::new("%A, %-d %B %Y, %-I:%M %p")
    }
}

impl DateFormatter for ChronoDateFormatter {
    fn format(&self, timestamp: i64) -> String {
        let Some(dt) = DateTime::from_timestamp(timestamp, 0) else {
            return timestamp.to_string();
        };
        let mut out = String::new();
        match write!(out, "{}", dt.format(&self.pattern)) {
            Ok(()) => out,
            Err(_) => {
                tracing::warn!(pattern = %self.pattern, timestamp, "date pattern not renderable");
                timestamp.to_string()
            }
        }
    }
}
