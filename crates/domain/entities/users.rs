use uuid::Uuid;

/// The signed-in purchaser as seen by the reconciliation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
}
