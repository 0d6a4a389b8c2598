//! Role resolution for imported assignments.
//!
//! An HR role code resolves to its canonical role, then to the backend role
//! mapped to that canonical role. Without such a mapping the role attached to
//! the organization is used; administrative organizations defer to their
//! nearest non-administrative ancestor first. The canonical role is the last
//! resort.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use hrsync_core::{Org, ReferenceDirectory, Role, StoreResult};

/// How the role to use was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    /// Explicit canonical → backend mapping.
    Mapping,
    /// Role attached to the (ancestor) organization.
    Organization,
    /// Canonical role, no backend role known.
    Canonical,
}

/// Outcome of resolving one role code.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRole {
    /// Canonical role whose shortname equals the HR code.
    pub canonical: Option<Role>,
    /// Backend role found through a mapping or the organization.
    pub backend: Option<Role>,
    pub source: RoleSource,
}

impl ResolvedRole {
    /// The role the edge is created for.
    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        self.backend.as_ref().or(self.canonical.as_ref())
    }
}

/// Resolves role codes against the reference directory.
pub struct RoleResolver {
    directory: Arc<dyn ReferenceDirectory>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn ReferenceDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve `code` for an assignment at `org`. `None` when nothing resolves.
    pub async fn resolve(&self, code: &str, org: Option<&Org>) -> StoreResult<Option<ResolvedRole>> {
        let canonical = self.directory.role_by_code(code).await?;

        if let Some(role) = &canonical {
            if let Some(backend) = self.directory.backend_role_for(role.id).await? {
                return Ok(Some(ResolvedRole {
                    canonical,
                    backend: Some(backend),
                    source: RoleSource::Mapping,
                }));
            }
        }

        if let Some(org) = org {
            let lookup = self.role_lookup_org(org).await?;
            if let Some(backend) = self.directory.org_role(lookup.id).await? {
                debug!(code = code, org = %lookup.name, "Role resolved through organization");
                return Ok(Some(ResolvedRole {
                    canonical,
                    backend: Some(backend),
                    source: RoleSource::Organization,
                }));
            }
        }

        Ok(canonical.map(|role| ResolvedRole {
            canonical: Some(role),
            backend: None,
            source: RoleSource::Canonical,
        }))
    }

    /// Nearest non-administrative organization at or above `org`.
    ///
    /// Stops at the root, or when the hierarchy loops back on itself, and
    /// returns the last organization reached.
    pub async fn role_lookup_org(&self, org: &Org) -> StoreResult<Org> {
        let mut current = org.clone();
        let mut visited = HashSet::new();
        while current.is_administrative && visited.insert(current.id) {
            match self.directory.parent_org(current.id).await? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(current)
    }
}

impl std::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver").finish_non_exhaustive()
    }
}
