//! Role and permission policy
//!
//! Authorization is a lookup in a `role -> permissions` table shared by every
//! route guard. Roles created while the server runs are added to the same
//! table, so they grant access immediately. The wildcard permission `*`
//! grants everything.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Permission granting every other permission
pub const WILDCARD: &str = "*";

/// Role name that maps onto "any authenticated principal"
const ANY_ROLE: &str = "any";

/// Built-in roles created at startup when missing
pub fn seed_roles() -> Vec<(&'static str, BTreeSet<String>)> {
    vec![
        ("admin", BTreeSet::from([WILDCARD.to_string()])),
        ("guest", BTreeSet::from(["read".to_string()])),
    ]
}

/// What a route demands of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any principal carrying a role claim
    AnyAuthenticated,
    /// Role name must match exactly
    Role(String),
    /// Role must hold the named permission
    Permission(String),
}

impl Requirement {
    /// Role-equality requirement; `"any"` means any authenticated principal
    pub fn role(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == ANY_ROLE {
            Requirement::AnyAuthenticated
        } else {
            Requirement::Role(name)
        }
    }

    pub fn permission(name: impl Into<String>) -> Self {
        Requirement::Permission(name.into())
    }
}

/// Permission table shared between the route guards and the role endpoints
pub type SharedPermissionTable = Arc<RwLock<PermissionTable>>;

/// Role -> permission set table
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    roles: HashMap<String, HashSet<String>>,
}

impl PermissionTable {
    /// Build a table from `(role, permissions)` pairs; later pairs for the
    /// same role add to earlier ones
    pub fn new<I, R, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, P)>,
        R: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let mut table = Self::default();
        for (role, permissions) in entries {
            table.insert_role(role, permissions);
        }
        table
    }

    /// The default two-tier policy: admin holds everything, guest may read
    pub fn seeded() -> Self {
        Self::new(seed_roles())
    }

    /// Add a role, or extend an existing one with more permissions
    pub fn insert_role<P>(&mut self, role: impl Into<String>, permissions: P)
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.roles
            .entry(role.into())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
    }

    pub fn into_shared(self) -> SharedPermissionTable {
        Arc::new(RwLock::new(self))
    }

    /// Whether `role` holds `permission`
    pub fn allows(&self, role: &str, permission: &str) -> bool {
        self.roles
            .get(role)
            .is_some_and(|perms| perms.contains(WILDCARD) || perms.contains(permission))
    }

    /// Evaluate a requirement for a principal's role claim
    ///
    /// A missing or empty role is denied for every requirement.
    pub fn check(&self, role: Option<&str>, requirement: &Requirement) -> bool {
        let Some(role) = role.filter(|r| !r.is_empty()) else {
            return false;
        };
        match requirement {
            Requirement::AnyAuthenticated => true,
            Requirement::Role(required) => role == required,
            Requirement::Permission(permission) => self.allows(role, permission),
        }
    }

    /// Known role names
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}

/// A requirement bound to the table that evaluates it
///
/// This is the state of the per-route authorization layer.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub table: SharedPermissionTable,
    pub requirement: Requirement,
}

impl AccessRule {
    pub fn new(table: SharedPermissionTable, requirement: Requirement) -> Self {
        Self { table, requirement }
    }

    pub fn permission(table: &SharedPermissionTable, permission: &str) -> Self {
        Self::new(table.clone(), Requirement::permission(permission))
    }

    pub fn role(table: &SharedPermissionTable, role: &str) -> Self {
        Self::new(table.clone(), Requirement::role(role))
    }

    pub fn any(table: &SharedPermissionTable) -> Self {
        Self::new(table.clone(), Requirement::AnyAuthenticated)
    }

    pub fn allows(&self, role: Option<&str>) -> bool {
        self.table.read().check(role, &self.requirement)
    }
}
