//! In-memory implementation of every store contract.
//!
//! Loadable from JSON so the command line runner can be pointed at a fixture.
//! Each query is counted, which is how tests observe the lookup cache.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::Deserialize;

use crate::errors::{FilterError, Result};
use crate::store::{
    ContextLevel, Id, InstanceResolver, MembershipStore, MetadataStore, Profile, ProfileStore,
    Scope, ScopeStore,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RoleAssignment {
    pub user: Id,
    pub scope: Id,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupMembership {
    pub user: Id,
    pub scope: Id,
    pub group: String,
    #[serde(default)]
    pub grouping: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Enrolment {
    pub user: Id,
    pub scope: Id,
    pub timestart: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grade {
    pub user: Id,
    pub scope: Id,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceMapping {
    pub category: String,
    #[serde(default)]
    pub scope: Option<Id>,
    pub instance: Id,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataValue {
    pub instance: Id,
    pub level: ContextLevel,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemoryStore {
    profiles: Vec<Profile>,
    custom_fields: HashMap<Id, HashMap<String, String>>,
    scopes: Vec<Scope>,
    roles: Vec<RoleAssignment>,
    groups: Vec<GroupMembership>,
    enrolments: Vec<Enrolment>,
    grades: Vec<Grade>,
    instances: Vec<InstanceMapping>,
    metadata: Vec<MetadataValue>,
    #[serde(skip)]
    failing: HashSet<String>,
    #[serde(skip)]
    calls: RefCell<HashMap<String, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FilterError::Config(e.to_string()))
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn with_custom_field(mut self, user: Id, shortname: &str, value: &str) -> Self {
        self.custom_fields
            .entry(user)
            .or_default()
            .insert(shortname.to_string(), value.to_string());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn with_role(mut self, user: Id, scope: Id, role: &str) -> Self {
        self.roles.push(RoleAssignment { user, scope, role: role.to_string() });
        self
    }

    pub fn with_group(mut self, user: Id, scope: Id, group: &str, grouping: Option<&str>) -> Self {
        self.groups.push(GroupMembership {
            user,
            scope,
            group: group.to_string(),
            grouping: grouping.map(str::to_string),
        });
        self
    }

    pub fn with_enrolment(mut self, user: Id, scope: Id, timestart: i64) -> Self {
        self.enrolments.push(Enrolment { user, scope, timestart });
        self
    }

    pub fn with_grade(mut self, user: Id, scope: Id, value: f64) -> Self {
        self.grades.push(Grade { user, scope, value });
        self
    }

    pub fn with_instance(mut self, category: &str, scope: Option<Id>, instance: Id) -> Self {
        self.instances.push(InstanceMapping { category: category.to_string(), scope, instance });
        self
    }

    pub fn with_metadata(mut self, instance: Id, level: ContextLevel, field: &str, value: &str) -> Self {
        self.metadata.push(MetadataValue {
            instance,
            level,
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Make the named query fail with a data access error.
    pub fn failing(mut self, op: &str) -> Self {
        self.failing.insert(op.to_string());
        self
    }

    /// How many times the named query ran.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.borrow().get(op).copied().unwrap_or(0)
    }

    fn record(&self, op: &'static str) -> Result<()> {
        *self.calls.borrow_mut().entry(op.to_string()).or_default() += 1;
        if self.failing.contains(op) {
            return Err(FilterError::DataAccess(format!("{op} unavailable")));
        }
        Ok(())
    }

    fn find_profile(&self, id: Id) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }
}

impl ProfileStore for MemoryStore {
    fn profile(&self, id: Id) -> Result<Option<Profile>> {
        self.record("profile")?;
        Ok(self.find_profile(id).cloned())
    }

    fn custom_fields(&self, id: Id) -> Result<HashMap<String, String>> {
        self.record("custom_fields")?;
        Ok(self.custom_fields.get(&id).cloned().unwrap_or_default())
    }
}

impl ScopeStore for MemoryStore {
    fn scope(&self, id: Id) -> Result<Option<Scope>> {
        self.record("scope")?;
        Ok(self.scopes.iter().find(|s| s.id == id).cloned())
    }
}

impl MembershipStore for MemoryStore {
    fn roles_of(&self, user: Id, scope: Id) -> Result<Vec<String>> {
        self.record("roles_of")?;
        Ok(self
            .roles
            .iter()
            .filter(|r| r.user == user && r.scope == scope)
            .map(|r| r.role.clone())
            .collect())
    }

    fn role_holders(&self, scope: Id, role: &str) -> Result<Vec<Profile>> {
        self.record("role_holders")?;
        Ok(self
            .roles
            .iter()
            .filter(|r| r.scope == scope && r.role == role)
            .filter_map(|r| self.find_profile(r.user).cloned())
            .collect())
    }

    fn groups_of(&self, user: Id, scope: Id) -> Result<Vec<String>> {
        self.record("groups_of")?;
        Ok(self
            .groups
            .iter()
            .filter(|g| g.user == user && g.scope == scope)
            .map(|g| g.group.clone())
            .collect())
    }

    fn groupings_of(&self, user: Id, scope: Id) -> Result<Vec<String>> {
        self.record("groupings_of")?;
        Ok(self
            .groups
            .iter()
            .filter(|g| g.user == user && g.scope == scope)
            .filter_map(|g| g.grouping.clone())
            .unique()
            .collect())
    }

    fn enrolment_date(&self, user: Id, scope: Id) -> Result<Option<i64>> {
        self.record("enrolment_date")?;
        Ok(self
            .enrolments
            .iter()
            .filter(|e| e.user == user && e.scope == scope)
            .map(|e| e.timestart)
            .min())
    }

    fn final_grade(&self, user: Id, scope: Id) -> Result<Option<f64>> {
        self.record("final_grade")?;
        Ok(self
            .grades
            .iter()
            .find(|g| g.user == user && g.scope == scope)
            .map(|g| g.value))
    }
}

impl InstanceResolver for MemoryStore {
    fn resolve_instance(&self, category: &str, scope: Option<Id>) -> Result<Option<Id>> {
        self.record("resolve_instance")?;
        Ok(self
            .instances
            .iter()
            .find(|m| m.category == category && (m.scope.is_none() || m.scope == scope))
            .map(|m| m.instance))
    }
}

impl MetadataStore for MemoryStore {
    fn field_value(&self, instance: Id, level: ContextLevel, field: &str) -> Result<Option<String>> {
        self.record("field_value")?;
        Ok(self
            .metadata
            .iter()
            .find(|m| m.instance == instance && m.level == level && m.field == field)
            .map(|m| m.value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_fixture_from_json() {
        let store = MemoryStore::from_json(
            r#"{
                "profiles": [{"id": 2, "firstname": "Alice", "lastname": "Lee"}],
                "custom_fields": {"2": {"dept": "Physics"}},
                "roles": [{"user": 2, "scope": 5, "role": "teacher"}],
                "metadata": [{"instance": 5, "level": "course", "field": "credits", "value": "3"}]
            }"#,
        )
        .unwrap();
        assert_eq!(store.profile(2).unwrap().unwrap().fullname(), "Alice Lee");
        assert_eq!(store.custom_fields(2).unwrap().get("dept").unwrap(), "Physics");
        assert_eq!(store.role_holders(5, "teacher").unwrap().len(), 1);
        assert_eq!(
            store.field_value(5, ContextLevel::Course, "credits").unwrap(),
            Some("3".to_string())
        );
    }

    #[test]
    fn bad_fixture_is_a_config_error() {
        let err = MemoryStore::from_json("{\"profiles\": 3}").unwrap_err();
        assert!(matches!(err, FilterError::Config(_)));
    }

    #[test]
    fn counts_and_fails_queries() {
        let store = MemoryStore::new().failing("scope");
        assert!(store.scope(1).is_err());
        assert!(store.profile(1).unwrap().is_none());
        assert_eq!(store.calls("scope"), 1);
        assert_eq!(store.calls("profile"), 1);
        assert_eq!(store.calls("roles_of"), 0);
    }

    #[test]
    fn groupings_are_distinct() {
        let store = MemoryStore::new()
            .with_group(1, 5, "Red", Some("Colours"))
            .with_group(1, 5, "Blue", Some("Colours"))
            .with_group(1, 5, "Solo", None);
        assert_eq!(store.groupings_of(1, 5).unwrap(), vec!["Colours".to_string()]);
        assert_eq!(store.groups_of(1, 5).unwrap().len(), 3);
    }
}
