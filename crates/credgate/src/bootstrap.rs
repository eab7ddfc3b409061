//! Startup seeding: built-in roles, the first administrator and the
//! permission table the server runs with

use anyhow::{Context, Result};
use credgate_auth::{CredentialHasher, PermissionTable, seed_roles};
use credgate_db::{Database, NewUser};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::BootstrapAdmin;

/// Create the built-in roles that are missing
pub async fn ensure_seed_roles(db: &Database) -> Result<()> {
    for (name, permissions) in seed_roles() {
        let role = db
            .ensure_role(name, permissions)
            .await
            .with_context(|| format!("Failed to ensure role '{}'", name))?;
        info!("Role '{}' ready (id {})", role.name, role.id);
    }
    Ok(())
}

/// Create the configured administrator when no user exists yet
///
/// Returns whether an account was created.
pub async fn ensure_bootstrap_admin(
    db: &Database,
    hasher: &CredentialHasher,
    admin: Option<&BootstrapAdmin>,
) -> Result<bool> {
    if db.has_users().await? {
        return Ok(false);
    }

    let Some(admin) = admin else {
        warn!("No users exist and no bootstrap admin is configured; only registration is possible");
        return Ok(false);
    };

    let role = db
        .get_role_by_name("admin")
        .await?
        .context("Built-in admin role is missing")?;
    let password_hash = hasher.hash_async(admin.password.clone()).await?;

    db.insert_user(NewUser {
        username: admin.username.clone(),
        email: admin.email.clone(),
        first: String::new(),
        last: String::new(),
        phone: String::new(),
        password_hash,
        role_id: role.id,
    })
    .await?;

    info!("Created bootstrap admin user: {}", admin.username);
    Ok(true)
}

/// Build the permission table from the stored roles merged over the seed
pub async fn load_permission_table(db: &Database) -> Result<PermissionTable> {
    let stored = db.list_roles().await?;

    let entries: Vec<(String, BTreeSet<String>)> = seed_roles()
        .into_iter()
        .map(|(name, permissions)| (name.to_string(), permissions))
        .chain(stored.into_iter().map(|role| (role.name, role.permissions)))
        .collect();

    let table = PermissionTable::new(entries);
    info!("Loaded permission table with {} roles", table.roles().count());
    Ok(table)
}
