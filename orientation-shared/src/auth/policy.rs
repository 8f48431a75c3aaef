/// Static role-to-permission policy
///
/// Authorization is a plain lookup: `policy[resource][action]` lists the roles
/// allowed to perform the action, and a caller is allowed if any of their roles
/// appears in that list. There is no role hierarchy and no inheritance; an
/// admin is allowed everything only because the table says so.
///
/// # Example
///
/// ```
/// use orientation_shared::auth::policy::{can, Action, Resource, Role};
///
/// assert!(can(&[Role::Admin], Action::Read, Resource::Users));
/// assert!(!can(&[Role::Trainee], Action::Read, Resource::Users));
/// assert!(can(&[Role::Viewer, Role::Manager], Action::Publish, Resource::Programs));
/// ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Builtin roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,

    /// Manages programs, templates and trainees
    Manager,

    /// Read-only access to programs, templates and tasks
    Viewer,

    /// Works through assigned orientation tasks
    Trainee,

    /// Read-only access including the audit log
    Auditor,
}

impl Role {
    /// All builtin roles
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Viewer,
        Role::Trainee,
        Role::Auditor,
    ];

    /// Role key as stored in `roles.role_key`
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Viewer => "viewer",
            Role::Trainee => "trainee",
            Role::Auditor => "auditor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "viewer" => Ok(Role::Viewer),
            "trainee" => Ok(Role::Trainee),
            "auditor" => Ok(Role::Auditor),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Protected resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Users,
    Roles,
    Programs,
    Templates,
    Tasks,
    Audit,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::Programs => "programs",
            Resource::Templates => "templates",
            Resource::Tasks => "tasks",
            Resource::Audit => "audit",
        }
    }
}

/// Actions that can be performed on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    AssignRoles,
    Publish,
    Deprecate,
    Archive,
    Restore,
    Link,
    Assign,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::AssignRoles => "assign_roles",
            Action::Publish => "publish",
            Action::Deprecate => "deprecate",
            Action::Archive => "archive",
            Action::Restore => "restore",
            Action::Link => "link",
            Action::Assign => "assign",
        }
    }
}

/// Formats a permission key (`resource:action`)
pub fn permission_key(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

/// Role lookup table keyed by resource, then action
#[derive(Debug, Clone, Default)]
pub struct Policy {
    rules: HashMap<Resource, HashMap<Action, Vec<Role>>>,
}

impl Policy {
    /// Builds an empty policy that denies everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `roles` to perform `action` on `resource`
    pub fn allow(mut self, resource: Resource, action: Action, roles: &[Role]) -> Self {
        self.rules
            .entry(resource)
            .or_default()
            .entry(action)
            .or_default()
            .extend_from_slice(roles);
        self
    }

    /// The policy compiled into the service
    ///
    /// Kept in sync with `migrations/*_seed_rbac.sql`.
    pub fn builtin() -> Self {
        use Action::*;
        use Resource::*;
        use Role::*;

        let everyone = [Admin, Manager, Viewer, Trainee, Auditor];
        let editors = [Admin, Manager];

        Policy::new()
            .allow(Users, Read, &[Admin, Manager, Auditor])
            .allow(Users, Create, &editors)
            .allow(Users, Update, &editors)
            .allow(Users, AssignRoles, &editors)
            .allow(Users, Delete, &[Admin])
            .allow(Roles, Read, &[Admin, Manager, Auditor])
            .allow(Programs, Read, &everyone)
            .allow(Programs, Create, &editors)
            .allow(Programs, Update, &editors)
            .allow(Programs, Publish, &editors)
            .allow(Programs, Deprecate, &editors)
            .allow(Programs, Assign, &editors)
            .allow(Programs, Archive, &[Admin])
            .allow(Programs, Restore, &[Admin])
            .allow(Programs, Delete, &[Admin])
            .allow(Templates, Read, &[Admin, Manager, Viewer, Auditor])
            .allow(Templates, Create, &editors)
            .allow(Templates, Update, &editors)
            .allow(Templates, Publish, &editors)
            .allow(Templates, Deprecate, &editors)
            .allow(Templates, Link, &editors)
            .allow(Templates, Archive, &[Admin])
            .allow(Templates, Restore, &[Admin])
            .allow(Templates, Delete, &[Admin])
            .allow(Tasks, Read, &everyone)
            .allow(Tasks, Update, &[Admin, Manager, Trainee])
            .allow(Audit, Read, &[Admin, Auditor])
    }

    /// Roles allowed to perform `action` on `resource`
    pub fn allowed_roles(&self, resource: Resource, action: Action) -> &[Role] {
        self.rules
            .get(&resource)
            .and_then(|actions| actions.get(&action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if any of `roles` may perform `action` on `resource`
    pub fn can(&self, roles: &[Role], action: Action, resource: Resource) -> bool {
        let allowed = self.allowed_roles(resource, action);
        roles.iter().any(|role| allowed.contains(role))
    }

    /// Sorted `resource:action` keys granted to any of `roles`
    pub fn permissions_for(&self, roles: &[Role]) -> Vec<String> {
        let mut keys = BTreeSet::new();
        for (resource, actions) in &self.rules {
            for (action, allowed) in actions {
                if roles.iter().any(|role| allowed.contains(role)) {
                    keys.insert(permission_key(*resource, *action));
                }
            }
        }
        keys.into_iter().collect()
    }
}

fn builtin_policy() -> &'static Policy {
    static POLICY: OnceLock<Policy> = OnceLock::new();
    POLICY.get_or_init(Policy::builtin)
}

/// Checks the builtin policy
pub fn can(roles: &[Role], action: Action, resource: Resource) -> bool {
    builtin_policy().can(roles, action, resource)
}

/// Permission keys granted by the builtin policy
pub fn permissions_for(roles: &[Role]) -> Vec<String> {
    builtin_policy().permissions_for(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_can_list_users_and_assign_roles() {
        assert!(can(&[Role::Admin], Action::Read, Resource::Users));
        assert!(can(&[Role::Admin], Action::AssignRoles, Resource::Users));
    }

    #[test]
    fn test_non_admin_roles_cannot_delete_users() {
        for role in [Role::Manager, Role::Viewer, Role::Trainee, Role::Auditor] {
            assert!(!can(&[role], Action::Delete, Resource::Users), "{role}");
        }
    }

    #[test]
    fn test_trainee_and_viewer_cannot_read_users() {
        assert!(!can(&[Role::Trainee], Action::Read, Resource::Users));
        assert!(!can(&[Role::Viewer], Action::Read, Resource::Users));
    }

    #[test]
    fn test_any_role_grants_access() {
        let roles = [Role::Trainee, Role::Auditor];
        assert!(can(&roles, Action::Read, Resource::Audit));
        assert!(can(&roles, Action::Update, Resource::Tasks));
        assert!(!can(&roles, Action::Create, Resource::Programs));
    }

    #[test]
    fn test_no_roles_denies_everything() {
        assert!(!can(&[], Action::Read, Resource::Programs));
    }

    #[test]
    fn test_archive_is_admin_only() {
        assert!(can(&[Role::Admin], Action::Archive, Resource::Programs));
        assert!(!can(&[Role::Manager], Action::Archive, Resource::Programs));
        assert!(can(&[Role::Manager], Action::Publish, Resource::Templates));
        assert!(!can(&[Role::Manager], Action::Restore, Resource::Templates));
    }

    #[test]
    fn test_unlisted_pair_denies() {
        // No rule for linking programs
        assert!(!can(&[Role::Admin], Action::Link, Resource::Programs));
    }

    #[test]
    fn test_custom_policy() {
        let policy = Policy::new().allow(Resource::Audit, Action::Read, &[Role::Viewer]);
        assert!(policy.can(&[Role::Viewer], Action::Read, Resource::Audit));
        assert!(!policy.can(&[Role::Admin], Action::Read, Resource::Audit));
    }

    #[test]
    fn test_permissions_for_viewer() {
        assert_eq!(
            permissions_for(&[Role::Viewer]),
            vec!["programs:read", "tasks:read", "templates:read"]
        );
    }

    #[test]
    fn test_permissions_for_merges_roles() {
        let perms = permissions_for(&[Role::Trainee, Role::Auditor]);
        assert!(perms.contains(&"audit:read".to_string()));
        assert!(perms.contains(&"tasks:update".to_string()));
        assert_eq!(perms.iter().filter(|p| *p == "tasks:read").count(), 1);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(" trainee ".parse::<Role>().unwrap(), Role::Trainee);
        assert!("owner".parse::<Role>().is_err());

        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_permission_key() {
        assert_eq!(
            permission_key(Resource::Users, Action::AssignRoles),
            "users:assign_roles"
        );
    }
}
