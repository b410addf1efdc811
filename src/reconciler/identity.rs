//! Legacy `_member_` role assignment.
//!
//! Trusts stored by the orchestration service reference the `_member_`
//! role; when the role exists the admin user must hold it on the admin
//! project.

use tracing::{debug, info};

use crate::error::{ReconcileError, Result, UndercloudError};
use crate::openstack::IdentityApi;

/// Role restored on the admin user.
pub const MEMBER_ROLE: &str = "_member_";

/// Name of the admin user and project.
const ADMIN: &str = "admin";

fn missing(resource_type: &str) -> UndercloudError {
    ReconcileError::ResourceReconcileFailed {
        resource_type: resource_type.to_string(),
        name: ADMIN.to_string(),
        reason: "not found".to_string(),
    }
    .into()
}

/// Grants `_member_` to the admin user on the admin project.
///
/// Does nothing when the role does not exist. An existing grant counts as
/// success. Returns true when a grant was added.
///
/// # Errors
///
/// Returns an error when the admin project or user is missing, or any API
/// error other than a conflict.
pub async fn ensure_member_role<I: IdentityApi + ?Sized>(identity: &I) -> Result<bool> {
    let Some(role) = identity.find_role(MEMBER_ROLE).await? else {
        debug!("No {MEMBER_ROLE} role to restore");
        return Ok(false);
    };
    let project = identity
        .find_project(ADMIN)
        .await?
        .ok_or_else(|| missing("project"))?;
    let user = identity
        .find_user(ADMIN)
        .await?
        .ok_or_else(|| missing("user"))?;

    match identity.grant_project_role(&project.id, &user.id, &role.id).await {
        Ok(()) => {
            info!("Added {MEMBER_ROLE} role to admin user");
            Ok(true)
        }
        Err(UndercloudError::OpenStack(e)) if e.is_conflict() => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack::testing::FakeCloud;
    use crate::openstack::types::IdentityRef;

    fn named(id: &str, name: &str) -> IdentityRef {
        IdentityRef {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn cloud_with_admin() -> FakeCloud {
        let cloud = FakeCloud::new();
        {
            let mut state = cloud.state();
            state.roles = vec![named("r1", "_member_")];
            state.projects = vec![named("p1", "admin")];
            state.users = vec![named("u1", "admin")];
        }
        cloud
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let cloud = cloud_with_admin();
        assert!(ensure_member_role(&cloud).await.unwrap());
        assert!(!ensure_member_role(&cloud).await.unwrap());
        assert_eq!(cloud.state().grants.len(), 1);
    }

    #[tokio::test]
    async fn test_no_member_role() {
        let cloud = FakeCloud::new();
        assert!(!ensure_member_role(&cloud).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_admin_user() {
        let cloud = cloud_with_admin();
        cloud.state().users.clear();
        let err = ensure_member_role(&cloud).await.unwrap_err();
        assert!(matches!(err, UndercloudError::Reconcile(_)));
    }
}
