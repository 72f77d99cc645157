use std::future::Future;

use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::user::Role;

/// Identity established from a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn may_manage(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

/// Resolves the owner of a resource with `load_owner` and lets the caller
/// through when they own it or are an admin.
///
/// A missing resource is reported as `NotFound` before ownership is looked at.
pub async fn require_owner_or_admin<F, Fut>(
    caller: &Caller,
    resource: &'static str,
    load_owner: F,
) -> ServiceResult<Uuid>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ServiceResult<Option<Uuid>>>,
{
    let owner_id = load_owner()
        .await?
        .ok_or(ServiceError::NotFound(resource))?;

    if !caller.may_manage(owner_id) {
        return Err(ServiceError::forbidden(format!(
            "only the owner or an admin can modify this {}",
            resource
        )));
    }

    Ok(owner_id)
}

pub fn require_admin(caller: &Caller) -> ServiceResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden("admin access required"))
    }
}
