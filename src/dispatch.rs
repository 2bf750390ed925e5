//! Maps parsed tokens to concrete lookups.
//!
//! Simple tokens are classified into a closed [`Target`] first, then resolved
//! against the viewer's authentication branch. Namespaced tokens go through
//! the [`ContextRegistry`]. Every field's "no data" policy is spelled out
//! here, and the policies differ on purpose: some fields give `-`, some a
//! localized string, some leave the token alone.

use itertools::Itertools;
use tracing::{debug, warn};

use crate::cache::{CacheKey, LookupCache};
use crate::context::ResolutionContext;
use crate::engine::EngineConfig;
use crate::errors::{FilterError, Result};
use crate::parser::{NamespacedToken, Token};
use crate::registry::ContextRegistry;
use crate::store::{Id, Profile};

/// Placeholder for values withheld or absent.
pub const DASH: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    Resolved(String),
    /// Leave the token text as it was.
    Unresolved,
    /// Replace the token with this (already localized) message.
    ErrorPlaceholder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Username,
    IdNumber,
    Email,
    FirstName,
    LastName,
    FullName,
    Phone1,
    Phone2,
    Address,
    City,
    Country,
    LastLogin,
    Picture,
}

impl UserField {
    pub fn from_segment(s: &str) -> Option<Self> {
        Some(match s {
            "ID" => Self::Id,
            "USERNAME" => Self::Username,
            "IDNUMBER" => Self::IdNumber,
            "EMAIL" => Self::Email,
            "FIRSTNAME" => Self::FirstName,
            "LASTNAME" => Self::LastName,
            "FULLNAME" => Self::FullName,
            "PHONE1" => Self::Phone1,
            "PHONE2" => Self::Phone2,
            "ADDRESS" => Self::Address,
            "CITY" => Self::City,
            "COUNTRY" => Self::Country,
            "LASTLOGIN" => Self::LastLogin,
            "PICTURE" => Self::Picture,
            _ => return None,
        })
    }

    fn key(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::IdNumber => "idnumber",
            Self::Email => "email",
            Self::FirstName => "firstname",
            Self::LastName => "lastname",
            Self::FullName => "fullname",
            Self::Phone1 => "phone1",
            Self::Phone2 => "phone2",
            Self::Address => "address",
            Self::City => "city",
            Self::Country => "country",
            Self::LastLogin => "lastlogin",
            Self::Picture => "picture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseField {
    Id,
    FullName,
    ShortName,
    IdNumber,
    Summary,
    StartDate,
}

impl CourseField {
    pub fn from_segment(s: &str) -> Option<Self> {
        Some(match s {
            "ID" => Self::Id,
            "FULLNAME" => Self::FullName,
            "SHORTNAME" => Self::ShortName,
            "IDNUMBER" => Self::IdNumber,
            "SUMMARY" => Self::Summary,
            "STARTDATE" => Self::StartDate,
            _ => return None,
        })
    }

    fn key(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::FullName => "fullname",
            Self::ShortName => "shortname",
            Self::IdNumber => "idnumber",
            Self::Summary => "summary",
            Self::StartDate => "startdate",
        }
    }
}

/// `COURSE_USER_<sub>`: facts about the viewer inside the current course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseUserField {
    Role,
    EnrolDate,
    Grade,
    Group,
    Grouping,
}

impl CourseUserField {
    pub fn from_segment(s: &str) -> Option<Self> {
        Some(match s {
            "ROLE" => Self::Role,
            "ENROLDATE" => Self::EnrolDate,
            "GRADE" => Self::Grade,
            "GROUP" => Self::Group,
            "GROUPING" => Self::Grouping,
            _ => return None,
        })
    }

    fn key(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::EnrolDate => "enroldate",
            Self::Grade => "grade",
            Self::Group => "group",
            Self::Grouping => "grouping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Manager,
    CourseCreator,
    EditingTeacher,
    Teacher,
}

impl Role {
    pub fn from_segment(s: &str) -> Option<Self> {
        Some(match s {
            "MANAGER" => Self::Manager,
            "COURSECREATOR" => Self::CourseCreator,
            "EDITINGTEACHER" => Self::EditingTeacher,
            "TEACHER" => Self::Teacher,
            _ => return None,
        })
    }

    /// Role name as the membership store knows it.
    pub fn shortname(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::CourseCreator => "coursecreator",
            Self::EditingTeacher => "editingteacher",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderAttr {
    Email,
    FullName,
}

impl HolderAttr {
    pub fn from_segment(s: &str) -> Option<Self> {
        match s {
            "EMAIL" => Some(Self::Email),
            "FULLNAME" => Some(Self::FullName),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::FullName => "fullname",
        }
    }
}

/// What a simple token asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(UserField),
    /// `USER_FIELD_<shortname>`
    UserCustom(String),
    Course(CourseField),
    CourseUser(CourseUserField),
    RoleHolders(Role, HolderAttr),
    Unrecognized,
}

impl Target {
    pub fn classify(segments: &[String]) -> Self {
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
        match segs.as_slice() {
            ["USER", "FIELD", rest @ ..] => {
                let name = rest.join("_");
                if name.is_empty() {
                    Target::Unrecognized
                } else {
                    Target::UserCustom(name)
                }
            }
            ["USER", field] => UserField::from_segment(field).map_or(Target::Unrecognized, Target::User),
            ["COURSE", "USER", sub] => {
                CourseUserField::from_segment(sub).map_or(Target::Unrecognized, Target::CourseUser)
            }
            ["COURSE", field] => CourseField::from_segment(field).map_or(Target::Unrecognized, Target::Course),
            ["COURSE", role, attr] | [role, attr] => {
                match (Role::from_segment(role), HolderAttr::from_segment(attr)) {
                    (Some(role), Some(attr)) => Target::RoleHolders(role, attr),
                    _ => Target::Unrecognized,
                }
            }
            _ => Target::Unrecognized,
        }
    }
}

/// Resolves tokens for one engine instance.
pub struct Dispatcher<'s, 'a> {
    ctx: &'s ResolutionContext<'a>,
    cache: &'s mut LookupCache,
    config: &'s EngineConfig,
}

impl<'s, 'a> Dispatcher<'s, 'a> {
    pub fn new(ctx: &'s ResolutionContext<'a>, cache: &'s mut LookupCache, config: &'s EngineConfig) -> Self {
        Self { ctx, cache, config }
    }

    /// Simple grammar: unknown tokens pass through untouched.
    pub fn resolve_simple(&mut self, token: &Token) -> ResolutionResult {
        let target = Target::classify(&token.segments);
        let outcome = if self.ctx.viewer.is_authenticated() {
            self.resolve_authenticated(&target)
        } else {
            self.resolve_anonymous(&target)
        };
        match outcome {
            Ok(result) => {
                debug!(token = %token.raw, category = token.category(), ?target, ?result, "resolved");
                result
            }
            Err(e) => {
                warn!(token = %token.raw, error = %e, "lookup failed");
                ResolutionResult::ErrorPlaceholder(self.localized_error(&e))
            }
        }
    }

    /// Namespaced grammar: anything unresolvable becomes a localized message.
    pub fn resolve_namespaced(&mut self, token: &NamespacedToken, registry: &ContextRegistry) -> ResolutionResult {
        match self.metadata_value(token, registry) {
            Ok(Some(value)) if !value.is_empty() => {
                debug!(token = %token.raw, %value, "resolved");
                ResolutionResult::Resolved(value)
            }
            Ok(_) => ResolutionResult::ErrorPlaceholder(self.string("novalue")),
            Err(e) => {
                warn!(token = %token.raw, error = %e, "metadata token not resolved");
                ResolutionResult::ErrorPlaceholder(self.localized_error(&e))
            }
        }
    }

    fn metadata_value(&mut self, token: &NamespacedToken, registry: &ContextRegistry) -> Result<Option<String>> {
        let context = registry
            .get(&token.category)
            .ok_or_else(|| FilterError::UnknownContext(token.category.clone()))?;
        let instance = match token.instance {
            Some(id) => id,
            None => context
                .instance(self.ctx)?
                .ok_or_else(|| FilterError::MissingInstance(token.category.clone()))?,
        };
        let data = self.ctx.data;
        debug!(context = context.name(), level = context.level().code(), instance, "metadata lookup");
        let key = CacheKey::new(format!("metadata:{}", context.name()), token.field.as_str(), instance);
        self.cache
            .get_or_compute(key, || data.field_value(instance, context.level(), &token.field))
    }

    fn resolve_authenticated(&mut self, target: &Target) -> Result<ResolutionResult> {
        let Some(viewer) = self.ctx.viewer.id() else {
            return self.resolve_anonymous(target);
        };
        let value = match target {
            Target::User(field) => self.user_value(viewer, *field)?,
            Target::UserCustom(name) => self.custom_field(viewer, name)?,
            Target::Course(field) => self.course_value(*field)?,
            Target::CourseUser(sub) => self.course_user_value(viewer, *sub)?,
            Target::RoleHolders(role, attr) => self.role_holders(*role, *attr)?,
            Target::Unrecognized => None,
        };
        Ok(value.map_or(ResolutionResult::Unresolved, ResolutionResult::Resolved))
    }

    /// Guests see course facts and teacher names, never anything that identifies an account.
    fn resolve_anonymous(&mut self, target: &Target) -> Result<ResolutionResult> {
        let value = match target {
            Target::User(UserField::FirstName | UserField::FullName | UserField::Username) => {
                Some(self.string("guest"))
            }
            Target::User(UserField::LastName) => Some(String::new()),
            Target::User(_) | Target::UserCustom(_) | Target::CourseUser(_) => Some(DASH.to_string()),
            Target::RoleHolders(_, HolderAttr::Email) => Some(DASH.to_string()),
            Target::RoleHolders(role, HolderAttr::FullName) => self.role_holders(*role, HolderAttr::FullName)?,
            Target::Course(field) => self.course_value(*field)?,
            Target::Unrecognized => None,
        };
        Ok(value.map_or(ResolutionResult::Unresolved, ResolutionResult::Resolved))
    }

    fn user_value(&mut self, viewer: Id, field: UserField) -> Result<Option<String>> {
        let ctx = self.ctx;
        let key = CacheKey::new("user", field.key(), viewer);
        self.cache.get_or_compute(key, || {
            let Some(p) = ctx.data.profile(viewer)? else {
                return Ok(None);
            };
            Ok(Some(match field {
                UserField::Id => p.id.to_string(),
                UserField::Username => p.username,
                UserField::IdNumber => p.idnumber,
                UserField::Email => p.email,
                UserField::FullName => p.fullname(),
                UserField::FirstName => p.firstname,
                UserField::LastName => p.lastname,
                UserField::Phone1 => p.phone1,
                UserField::Phone2 => p.phone2,
                UserField::Address => p.address,
                UserField::City => p.city,
                UserField::Country => p.country,
                UserField::LastLogin => p.lastlogin.map_or_else(|| DASH.to_string(), |t| ctx.dates.format(t)),
                UserField::Picture => p.picture,
            }))
        })
    }

    fn custom_field(&mut self, viewer: Id, name: &str) -> Result<Option<String>> {
        let data = self.ctx.data;
        let key = CacheKey::new("user_field", name, viewer);
        self.cache
            .get_or_compute(key, || Ok(data.custom_fields(viewer)?.remove(name)))
    }

    fn course_value(&mut self, field: CourseField) -> Result<Option<String>> {
        let Some(scope) = self.ctx.scope else {
            return Ok(None);
        };
        let ctx = self.ctx;
        let key = CacheKey::new("course", field.key(), scope);
        self.cache.get_or_compute(key, || {
            let Some(s) = ctx.data.scope(scope)? else {
                return Ok(None);
            };
            Ok(Some(match field {
                CourseField::Id => s.id.to_string(),
                CourseField::FullName => s.fullname,
                CourseField::ShortName => s.shortname,
                CourseField::IdNumber => s.idnumber,
                CourseField::Summary => s.summary,
                CourseField::StartDate => ctx.dates.format(s.startdate),
            }))
        })
    }

    fn course_user_value(&mut self, viewer: Id, sub: CourseUserField) -> Result<Option<String>> {
        let Some(scope) = self.ctx.scope else {
            return Ok(None);
        };
        let (ctx, config) = (self.ctx, self.config);
        let separator = config.list_separator.as_str();
        let component = config.component.as_str();
        let key = CacheKey::new("course_user", sub.key(), viewer);
        self.cache.get_or_compute(key, || {
            let data = ctx.data;
            Ok(match sub {
                CourseUserField::Role => Some(join_or_dash(data.roles_of(viewer, scope)?, separator)),
                CourseUserField::Group => Some(join_or_dash(data.groups_of(viewer, scope)?, separator)),
                CourseUserField::Grouping => Some(join_or_dash(data.groupings_of(viewer, scope)?, separator)),
                CourseUserField::EnrolDate => data.enrolment_date(viewer, scope)?.map(|t| ctx.dates.format(t)),
                CourseUserField::Grade => Some(match data.final_grade(viewer, scope)? {
                    Some(grade) => format!("{grade:.2}"),
                    None => ctx.strings.string_for("nograde", component),
                }),
            })
        })
    }

    fn role_holders(&mut self, role: Role, attr: HolderAttr) -> Result<Option<String>> {
        let Some(scope) = self.ctx.scope else {
            return Ok(None);
        };
        let (data, config) = (self.ctx.data, self.config);
        let separator = config.list_separator.as_str();
        let key = CacheKey::new(format!("role:{}", role.shortname()), attr.key(), scope);
        self.cache.get_or_compute(key, || {
            let holders = data.role_holders(scope, role.shortname())?;
            let values = holders.iter().map(|p: &Profile| match attr {
                HolderAttr::Email => p.email.clone(),
                HolderAttr::FullName => p.fullname(),
            });
            Ok(Some(join_or_dash(values.filter(|v| !v.is_empty()), separator)))
        })
    }

    fn string(&self, key: &str) -> String {
        self.ctx.strings.string_for(key, &self.config.component)
    }

    /// Inline marker for a token that failed with `e`.
    pub fn error_placeholder(&self, e: &FilterError) -> ResolutionResult {
        ResolutionResult::ErrorPlaceholder(self.localized_error(e))
    }

    fn localized_error(&self, e: &FilterError) -> String {
        self.string(match e {
            FilterError::Parse(_) => "novalue",
            FilterError::MissingInstance(_) => "noinstance",
            FilterError::UnknownContext(_) => "unknowncontext",
            FilterError::DataAccess(_) | FilterError::Config(_) => "lookuperror",
        })
    }
}

/// Distinct values in first-seen order, joined; `-` when there are none.
fn join_or_dash<I>(values: I, separator: &str) -> String
where
    I: IntoIterator<Item = String>,
{
    let joined = values.into_iter().unique().join(separator);
    if joined.is_empty() {
        DASH.to_string()
    } else {
        joined
    }
}
