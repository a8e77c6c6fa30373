//! Password hashing.
//!
//! bcrypt is CPU bound, so both directions run on the blocking pool.

use crate::AppResult;

pub(crate) async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Constant-time comparison against a stored bcrypt hash.
pub(crate) async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_is_not_plaintext_and_verifies() {
        let hash = hash_password("pw1", 4).await.unwrap();
        assert_ne!(hash, "pw1");
        assert!(hash.starts_with("$2"));

        assert!(verify_password("pw1", &hash).await.unwrap());
        assert!(!verify_password("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let a = hash_password("pw1", 4).await.unwrap();
        let b = hash_password("pw1", 4).await.unwrap();
        assert_ne!(a, b);
    }
}
