use anyhow::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;

pub use bcrypt::DEFAULT_COST;

/// Hashes a login password with bcrypt at the given cost (4..=31).
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    let hash = bcrypt::hash(password, cost)?;
    Ok(hash)
}

/// Checks a password against a stored bcrypt hash. A malformed hash counts as
/// a mismatch rather than an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a valid bcrypt hash");
            false
        }
    }
}

/// Random alphanumeric secret, used for the JWT signing key when none is
/// configured.
pub fn generate_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("s3cret", 4).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn invalid_cost_is_an_error() {
        assert!(hash_password("s3cret", 2).is_err());
    }

    #[test]
    fn plaintext_is_never_accepted_as_hash() {
        assert!(!verify_password("s3cret", "s3cret"));
    }

    #[test]
    fn generate_secret_is_random() {
        let a = generate_secret(48);
        let b = generate_secret(48);
        assert_eq!(a.len(), 48);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
