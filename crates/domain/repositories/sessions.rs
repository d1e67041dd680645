use mockall::automock;

use crate::domain::entities::users::UserIdentity;

/// Read access to whoever is signed in for the current request.
#[automock]
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
}
