/// The authenticated user a request acts for. Resolved once by the auth
/// collaborator and passed explicitly to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    pub user_id: i64,
}

impl Caller {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }
}
