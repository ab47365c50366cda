//! Ownership checks for resources an actor can mutate or read privately.

use moyu_types::models::{Campaign, User};

use super::{ServiceError, ServiceResult};

/// A resource with a single owning user.
pub trait OwnedResource {
    fn owner_id(&self) -> i64;
}

impl OwnedResource for Campaign {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// Fails closed: anything other than an exact id match is `Forbidden`.
pub fn require_owner<R: OwnedResource>(resource: &R, actor: &User) -> ServiceResult<()> {
    if resource.owner_id() == actor.id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "user {} is not an owner of the campaign",
            actor.id
        )))
    }
}

/// Resolve an optional lookup and check ownership in one step.
pub trait OwnershipCheck<R> {
    fn owned_by(self, actor: &User, what: &'static str) -> ServiceResult<R>;
}

impl<R: OwnedResource> OwnershipCheck<R> for Option<R> {
    fn owned_by(self, actor: &User, what: &'static str) -> ServiceResult<R> {
        let resource = self.ok_or(ServiceError::NotFound(what))?;
        require_owner(&resource, actor)?;
        Ok(resource)
    }
}
