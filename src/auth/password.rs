use actix_web::web;

use crate::error::AppError;

/// Hashes `password` with bcrypt on the blocking thread pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = web::block(move || bcrypt::hash(password, cost)).await??;
    Ok(hashed)
}

/// Checks `password` against a stored bcrypt hash.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let matches = web::block(move || bcrypt::verify(password, &hash)).await??;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse", 4).await.unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }

    #[actix_web::test]
    async fn test_malformed_hash_is_an_error() {
        let result = verify_password("anything", "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }
}
