use anyhow::{bail, Result};
use vexec_storage::auth::hash_password;
use vexec_storage::{Store, UserSeed};

use crate::config::{AuthConfig, SeedUser};

fn seed_hash(user: &SeedUser, cost: u32) -> Result<String> {
    if let Some(hash) = user.password_hash.as_deref().filter(|h| !h.trim().is_empty()) {
        return Ok(hash.trim().to_string());
    }
    match user.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => hash_password(password, cost),
        None => bail!("user {} has neither password nor password_hash", user.email),
    }
}

/// Creates or refreshes every user listed under `[[auth.users]]`. Returns
/// how many were written; invalid entries are logged and skipped.
pub async fn seed_users(store: &Store, auth: &AuthConfig) -> Result<usize> {
    if auth.users.is_empty() {
        tracing::warn!("No [[auth.users]] configured; nobody will be able to log in");
        return Ok(0);
    }

    let mut seeded = 0;
    for user in &auth.users {
        if user.email.trim().is_empty() {
            tracing::warn!(name = %user.name, "Skipping configured user without email");
            continue;
        }
        let password_hash = match seed_hash(user, auth.bcrypt_cost) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(email = %user.email, error = %e, "Skipping configured user");
                continue;
            }
        };
        let saved = store
            .upsert_user(&UserSeed {
                email: user.email.clone(),
                name: user.name.clone(),
                role: user.role.clone(),
                company_id: user.company_id.clone(),
                password_hash,
            })
            .await?;
        tracing::info!(user_id = %saved.id, email = %saved.email, "Seeded user");
        seeded += 1;
    }
    Ok(seeded)
}
