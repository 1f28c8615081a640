use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Cohost,
    Guest,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Manage/update the project, the capability that makes a participant authoritative.
    UpdateProject,
    ManageGuests,
    ManageSelf,
}

/// Pure role to permission predicate supplied by the host application.
pub trait PermissionTable: Send + Sync {
    fn has_permission(&self, role: Role, permission: Permission) -> bool;
}

impl<F> PermissionTable for F
where
    F: Fn(Role, Permission) -> bool + Send + Sync,
{
    fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self(role, permission)
    }
}

/// Hosts and cohosts hold every permission, guests may only manage themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissions;

impl PermissionTable for DefaultPermissions {
    fn has_permission(&self, role: Role, permission: Permission) -> bool {
        match role {
            Role::Host | Role::Cohost => true,
            Role::Guest => permission == Permission::ManageSelf,
            Role::Viewer => false,
        }
    }
}

/// Decides per event whether a role is the authoritative clock holder.
#[derive(Clone)]
pub struct AuthorityResolver {
    table: Arc<dyn PermissionTable>,
}

impl AuthorityResolver {
    pub fn new(table: Arc<dyn PermissionTable>) -> Self {
        Self { table }
    }

    pub fn is_authority(&self, role: Role) -> bool {
        self.table.has_permission(role, Permission::UpdateProject)
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.table.has_permission(role, permission)
    }
}

impl Default for AuthorityResolver {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPermissions))
    }
}

impl fmt::Debug for AuthorityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityResolver").finish_non_exhaustive()
    }
}
