//! Write-access policy, dispatched by entity kind.
//!
//! Reads are handled elsewhere: community content is readable by anyone,
//! pet-scoped rows are filtered to the caller at query time, and looking up
//! a pet by id scoped to its owner reports a miss as not-found so that a
//! foreign pet is indistinguishable from a nonexistent one.

use crate::error::{AppError, AppResult};

/// The entity a caller is attempting to update or delete, reduced to the
/// identity that owns writes to it.
#[derive(Debug, Clone, Copy)]
pub enum WriteTarget<'a> {
    Post { author_id: &'a str },
    Comment { author_id: &'a str },
    Message { sender_id: &'a str },
    /// A pet, or any record owned transitively through a pet reference.
    PetScoped { owner_id: &'a str },
}

pub fn can_write(user_id: &str, target: WriteTarget<'_>) -> bool {
    match target {
        WriteTarget::Post { author_id } => author_id == user_id,
        WriteTarget::Comment { author_id } => author_id == user_id,
        WriteTarget::Message { sender_id } => sender_id == user_id,
        WriteTarget::PetScoped { owner_id } => owner_id == user_id,
    }
}

pub fn ensure_can_write(user_id: &str, target: WriteTarget<'_>) -> AppResult<()> {
    if can_write(user_id, target) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_may_write_own_post_and_comment() {
        assert!(can_write("u1", WriteTarget::Post { author_id: "u1" }));
        assert!(can_write("u1", WriteTarget::Comment { author_id: "u1" }));
    }

    #[test]
    fn non_author_may_not_write() {
        assert!(!can_write("u2", WriteTarget::Post { author_id: "u1" }));
        assert!(!can_write("u2", WriteTarget::Comment { author_id: "u1" }));
    }

    #[test]
    fn only_sender_may_write_message() {
        assert!(can_write("u1", WriteTarget::Message { sender_id: "u1" }));
        assert!(!can_write("u2", WriteTarget::Message { sender_id: "u1" }));
    }

    #[test]
    fn pet_scoped_rows_follow_the_pet_owner() {
        assert!(can_write("owner", WriteTarget::PetScoped { owner_id: "owner" }));
        assert!(!can_write("other", WriteTarget::PetScoped { owner_id: "owner" }));
    }

    #[test]
    fn ensure_maps_denial_to_forbidden() {
        let err = ensure_can_write("u2", WriteTarget::Post { author_id: "u1" }).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }
}
