//! Authorization checks consumed by read and write entry points.
//!
//! Authentication lives outside this crate; callers hand in an already
//! resolved user id. A user may touch a room when they are an admin or
//! the creator of the room's project.

use crate::model::UserId;
use std::collections::BTreeSet;

/// External capability check.
pub trait AccessPolicy {
    fn is_admin(&self, user: UserId) -> bool;

    /// Whether `user` owns a resource created by `owner`.
    fn owns_resource(&self, user: UserId, owner: UserId) -> bool {
        user == owner
    }

    /// Combined admin-or-owner decision.
    fn allows(&self, user: UserId, owner: UserId) -> bool {
        self.is_admin(user) || self.owns_resource(user, owner)
    }
}

/// Policy backed by a fixed admin role list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAccessPolicy {
    admins: BTreeSet<UserId>,
}

impl RoleAccessPolicy {
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn grant_admin(&mut self, user: UserId) {
        self.admins.insert(user);
    }
}

impl AccessPolicy for RoleAccessPolicy {
    fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessPolicy, RoleAccessPolicy};
    use uuid::Uuid;

    #[test]
    fn owner_and_admin_are_allowed_others_denied() {
        let admin = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let policy = RoleAccessPolicy::new([admin]);

        assert!(policy.allows(admin, owner));
        assert!(policy.allows(owner, owner));
        assert!(!policy.allows(stranger, owner));
    }

    #[test]
    fn granted_admin_is_recognized() {
        let user = Uuid::new_v4();
        let mut policy = RoleAccessPolicy::default();
        assert!(!policy.is_admin(user));

        policy.grant_admin(user);
        assert!(policy.is_admin(user));
    }
}
