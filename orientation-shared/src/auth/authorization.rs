/// Authorization helpers and permission checks
///
/// Thin wrappers over the static [`policy`](super::policy) that turn a denied
/// lookup into an [`AuthzError`], plus the one rule the table cannot express:
/// which roles a caller is allowed to hand out.
///
/// # Role assignment
///
/// - **admin**: may grant or revoke any role
/// - **manager**: may grant or revoke only `viewer` and `trainee`
/// - everyone else: may not change roles
///
/// # Example
///
/// ```
/// use orientation_shared::auth::authorization::{check_role_assignment, require};
/// use orientation_shared::auth::middleware::AuthContext;
/// use orientation_shared::auth::policy::{Action, Resource, Role};
/// use uuid::Uuid;
///
/// let manager = AuthContext::new(Uuid::new_v4(), vec![Role::Manager]);
/// assert!(require(&manager, Action::AssignRoles, Resource::Users).is_ok());
/// assert!(check_role_assignment(&manager.roles, &[], &[Role::Trainee]).is_ok());
/// assert!(check_role_assignment(&manager.roles, &[], &[Role::Admin]).is_err());
/// ```

use std::collections::BTreeSet;
use uuid::Uuid;

use super::middleware::AuthContext;
use super::policy::{Action, Resource, Role};

/// Roles a manager may grant or revoke
pub const MANAGER_ASSIGNABLE: [Role; 2] = [Role::Viewer, Role::Trainee];

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The policy does not grant the action to any of the caller's roles
    #[error("Missing permission {resource}:{action}")]
    Denied {
        resource: &'static str,
        action: &'static str,
    },

    /// Caller may not grant or revoke the given role
    #[error("Not allowed to assign role {0}")]
    RoleNotAssignable(Role),

    /// Target user holds a role the caller could not assign
    #[error("Not allowed to manage a user with role {0}")]
    UserNotManageable(Role),

    /// Caller may not act on another user's resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Requires the policy to grant `action` on `resource`
pub fn require(auth: &AuthContext, action: Action, resource: Resource) -> Result<(), AuthzError> {
    if !auth.can(action, resource) {
        tracing::warn!(
            user_id = %auth.user_id,
            resource = resource.as_str(),
            action = action.as_str(),
            "Authorization denied"
        );
        return Err(AuthzError::Denied {
            resource: resource.as_str(),
            action: action.as_str(),
        });
    }

    Ok(())
}

/// Passes for the subject user themselves, otherwise falls back to [`require`]
pub fn require_self_or(
    auth: &AuthContext,
    subject_user_id: Uuid,
    action: Action,
    resource: Resource,
) -> Result<(), AuthzError> {
    if auth.user_id == subject_user_id {
        return Ok(());
    }

    require(auth, action, resource)
}

/// Requires the caller to own the resource
pub fn require_ownership(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id != owner_id {
        return Err(AuthzError::NotAuthorized);
    }

    Ok(())
}

/// Returns true if the caller sees every user's tasks rather than only their own
pub fn sees_all_tasks(auth: &AuthContext) -> bool {
    auth.can(Action::Read, Resource::Users)
}

/// Returns true if the caller may modify tasks belonging to other users
pub fn edits_all_tasks(auth: &AuthContext) -> bool {
    auth.can(Action::Update, Resource::Users)
}

/// Checks that `actor_roles` may turn `current` into `requested`
///
/// Only roles that actually change (granted or revoked) are checked, so a
/// manager can edit the trainee roles of a user who also holds `admin`.
pub fn check_role_assignment(
    actor_roles: &[Role],
    current: &[Role],
    requested: &[Role],
) -> Result<(), AuthzError> {
    let current: BTreeSet<Role> = current.iter().copied().collect();
    let requested: BTreeSet<Role> = requested.iter().copied().collect();

    for role in current.symmetric_difference(&requested) {
        if !may_assign(actor_roles, *role) {
            return Err(AuthzError::RoleNotAssignable(*role));
        }
    }

    Ok(())
}

/// Checks that `actor_roles` may change the account of a user holding `target_roles`
///
/// Status and profile changes on another user are limited to users whose
/// every role the caller could assign, so a manager cannot suspend an admin.
pub fn check_user_management(actor_roles: &[Role], target_roles: &[Role]) -> Result<(), AuthzError> {
    match target_roles.iter().find(|role| !may_assign(actor_roles, **role)) {
        Some(role) => Err(AuthzError::UserNotManageable(*role)),
        None => Ok(()),
    }
}

fn may_assign(actor_roles: &[Role], role: Role) -> bool {
    actor_roles.contains(&Role::Admin)
        || (actor_roles.contains(&Role::Manager) && MANAGER_ASSIGNABLE.contains(&role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(roles: &[Role]) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), roles.to_vec())
    }

    #[test]
    fn test_require() {
        assert!(require(&ctx(&[Role::Admin]), Action::Read, Resource::Users).is_ok());

        let err = require(&ctx(&[Role::Viewer]), Action::Read, Resource::Users).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Denied {
                resource: "users",
                action: "read"
            }
        );
        assert_eq!(err.to_string(), "Missing permission users:read");
    }

    #[test]
    fn test_require_self_or() {
        let trainee = ctx(&[Role::Trainee]);

        assert!(require_self_or(&trainee, trainee.user_id, Action::Update, Resource::Users).is_ok());
        assert!(require_self_or(&trainee, Uuid::new_v4(), Action::Update, Resource::Users).is_err());

        let manager = ctx(&[Role::Manager]);
        assert!(require_self_or(&manager, Uuid::new_v4(), Action::Update, Resource::Users).is_ok());
    }

    #[test]
    fn test_require_ownership() {
        let auth = ctx(&[Role::Trainee]);
        assert!(require_ownership(&auth, auth.user_id).is_ok());
        assert_eq!(
            require_ownership(&auth, Uuid::new_v4()),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_manager_cannot_manage_privileged_users() {
        let manager = [Role::Manager];

        assert!(check_user_management(&manager, &[Role::Trainee, Role::Viewer]).is_ok());
        assert!(check_user_management(&manager, &[]).is_ok());
        assert_eq!(
            check_user_management(&manager, &[Role::Trainee, Role::Admin]),
            Err(AuthzError::UserNotManageable(Role::Admin))
        );
        assert_eq!(
            check_user_management(&manager, &[Role::Manager]),
            Err(AuthzError::UserNotManageable(Role::Manager))
        );

        assert!(check_user_management(&[Role::Admin], &[Role::Admin, Role::Auditor]).is_ok());
        assert!(check_user_management(&[Role::Auditor], &[Role::Trainee]).is_err());
    }

    #[test]
    fn test_task_visibility() {
        assert!(sees_all_tasks(&ctx(&[Role::Auditor])));
        assert!(!sees_all_tasks(&ctx(&[Role::Trainee])));
        assert!(!sees_all_tasks(&ctx(&[Role::Viewer])));
        assert!(edits_all_tasks(&ctx(&[Role::Manager])));
        assert!(!edits_all_tasks(&ctx(&[Role::Auditor])));
    }

    #[test]
    fn test_admin_assigns_any_role() {
        let admin = [Role::Admin];
        assert!(check_role_assignment(&admin, &[], &[Role::Admin, Role::Manager]).is_ok());
        assert!(check_role_assignment(&admin, &[Role::Admin], &[]).is_ok());
    }

    #[test]
    fn test_manager_assigns_viewer_and_trainee() {
        let manager = [Role::Manager];
        assert!(check_role_assignment(&manager, &[], &[Role::Viewer, Role::Trainee]).is_ok());
        assert!(check_role_assignment(&manager, &[Role::Trainee], &[Role::Viewer]).is_ok());
    }

    #[test]
    fn test_manager_cannot_assign_admin_or_manager() {
        let manager = [Role::Manager];
        assert_eq!(
            check_role_assignment(&manager, &[], &[Role::Admin]),
            Err(AuthzError::RoleNotAssignable(Role::Admin))
        );
        assert_eq!(
            check_role_assignment(&manager, &[Role::Trainee], &[Role::Trainee, Role::Manager]),
            Err(AuthzError::RoleNotAssignable(Role::Manager))
        );
        assert!(check_role_assignment(&manager, &[], &[Role::Auditor]).is_err());
    }

    #[test]
    fn test_manager_cannot_revoke_admin() {
        assert_eq!(
            check_role_assignment(&[Role::Manager], &[Role::Admin], &[]),
            Err(AuthzError::RoleNotAssignable(Role::Admin))
        );
    }

    #[test]
    fn test_unchanged_roles_are_not_checked() {
        let manager = [Role::Manager];
        let current = [Role::Admin, Role::Viewer];
        let requested = [Role::Admin, Role::Viewer, Role::Trainee];
        assert!(check_role_assignment(&manager, &current, &requested).is_ok());
    }

    #[test]
    fn test_other_roles_cannot_assign() {
        for role in [Role::Viewer, Role::Trainee, Role::Auditor] {
            assert!(check_role_assignment(&[role], &[], &[Role::Viewer]).is_err());
        }
    }
}
