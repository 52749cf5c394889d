use crate::error::ApiError;

pub fn is_owner(resource_owner_id: u64, caller_id: u64) -> bool {
    resource_owner_id == caller_id
}

/// Every mutate/delete path goes through here.
pub fn ensure_owner(resource_owner_id: u64, caller_id: u64, what: &str) -> Result<(), ApiError> {
    if is_owner(resource_owner_id, caller_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("You are not the author of this {what}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_owner_passes() {
        assert!(is_owner(3, 3));
        assert!(!is_owner(3, 4));
        assert!(ensure_owner(3, 3, "article").is_ok());
        assert!(matches!(ensure_owner(3, 4, "article"), Err(ApiError::Forbidden(_))));
    }
}
