//! Identities, roles, credentials, and sign-in sessions.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::AccessStore;
use crate::error::AppError;
use crate::models::{Credential, CredentialView, Identity, Role};

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Opaque sign-in tokens mapped to identity ids.
#[derive(Default)]
pub struct SessionRegistry {
    tokens: RwLock<HashMap<String, Uuid>>,
}

impl SessionRegistry {
    pub async fn issue(&self, identity_id: Uuid) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.write().await.insert(token.clone(), identity_id);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        self.tokens.read().await.get(token).copied()
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    pub async fn revoke_identity(&self, identity_id: Uuid) -> usize {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, id| *id != identity_id);
        before - tokens.len()
    }
}

pub struct AccessService {
    store: Arc<dyn AccessStore>,
    sessions: SessionRegistry,
    max_credentials: usize,
    // Serializes admin writes so capacity and self-deletion checks see current data.
    admin_lock: Mutex<()>,
}

impl AccessService {
    pub fn new(store: Arc<dyn AccessStore>, max_credentials: usize) -> Self {
        Self {
            store,
            sessions: SessionRegistry::default(),
            max_credentials,
            admin_lock: Mutex::new(()),
        }
    }

    /// Create the first MASTER identity when the store holds none.
    pub async fn bootstrap_master(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<Identity>, AppError> {
        let _guard = self.admin_lock.lock().await;
        if !self.store.list_identities().await?.is_empty() {
            return Ok(None);
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            login: login.to_string(),
            role: Role::Master,
        };
        self.store
            .insert_identity(&identity, &hash_password(password)?)
            .await?;
        info!(login = %identity.login, "Bootstrapped master identity");
        Ok(Some(identity))
    }

    pub async fn sign_in(
        &self,
        login: &str,
        password: &str,
    ) -> Result<(String, Identity), AppError> {
        let invalid = || AppError::validation("Invalid username or password.");
        let (identity, hash) = self
            .store
            .find_login(login.trim())
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(&hash, password) {
            return Err(invalid());
        }
        let token = self.sessions.issue(identity.id).await;
        info!(identity = %identity.id, "Signed in");
        Ok((token, identity))
    }

    pub async fn sign_out(&self, token: &str) {
        self.sessions.revoke(token).await;
    }

    /// The identity behind a token. Tokens of deleted identities are revoked.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AppError> {
        let id = self
            .sessions
            .resolve(token)
            .await
            .ok_or(AppError::Unauthorized)?;
        match self.store.get_identity(id).await? {
            Some(identity) => Ok(identity),
            None => {
                self.sessions.revoke(token).await;
                Err(AppError::Unauthorized)
            }
        }
    }

    fn require_master(actor: &Identity) -> Result<(), AppError> {
        if actor.is_master() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the master user can perform this action.".to_string(),
            ))
        }
    }

    pub async fn list_credentials(
        &self,
        actor: &Identity,
    ) -> Result<Vec<CredentialView>, AppError> {
        Self::require_master(actor)?;
        Ok(self
            .store
            .list_credentials()
            .await?
            .iter()
            .map(Credential::view)
            .collect())
    }

    /// Adds a batch named `{prefix}-{n}`; the whole batch is refused when it
    /// would exceed the credential limit.
    pub async fn add_credentials(
        &self,
        actor: &Identity,
        prefix: &str,
        secrets: &[String],
    ) -> Result<Vec<CredentialView>, AppError> {
        Self::require_master(actor)?;
        let prefix = prefix.trim();
        let secrets: Vec<&str> = secrets
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if prefix.is_empty() || secrets.is_empty() {
            return Err(AppError::validation(
                "Please provide a name prefix and at least one API key.",
            ));
        }

        let _guard = self.admin_lock.lock().await;
        let existing = self.store.list_credentials().await?.len();
        if existing + secrets.len() > self.max_credentials {
            return Err(AppError::Validation(format!(
                "You can only add {} more keys. Maximum is {}.",
                self.max_credentials.saturating_sub(existing),
                self.max_credentials
            )));
        }

        let credentials: Vec<Credential> = secrets
            .iter()
            .enumerate()
            .map(|(i, secret)| Credential::new(format!("{}-{}", prefix, existing + i + 1), *secret))
            .collect();
        self.store.insert_credentials(&credentials).await?;
        info!(actor = %actor.id, added = credentials.len(), "Added credentials");
        Ok(credentials.iter().map(Credential::view).collect())
    }

    pub async fn remove_credential(&self, actor: &Identity, id: Uuid) -> Result<(), AppError> {
        Self::require_master(actor)?;
        let _guard = self.admin_lock.lock().await;
        if !self.store.delete_credential(id).await? {
            return Err(AppError::NotFound(format!("API key not found: {}", id)));
        }
        info!(actor = %actor.id, credential = %id, "Removed credential");
        Ok(())
    }

    pub async fn list_identities(&self, actor: &Identity) -> Result<Vec<Identity>, AppError> {
        Self::require_master(actor)?;
        Ok(self.store.list_identities().await?)
    }

    pub async fn add_identity(
        &self,
        actor: &Identity,
        login: &str,
        password: &str,
        role: Role,
    ) -> Result<Identity, AppError> {
        Self::require_master(actor)?;
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::validation("Username and password are required."));
        }

        let _guard = self.admin_lock.lock().await;
        if self.store.find_login(login).await?.is_some() {
            return Err(AppError::validation("Username already exists."));
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            login: login.to_string(),
            role,
        };
        self.store
            .insert_identity(&identity, &hash_password(password)?)
            .await?;
        info!(actor = %actor.id, identity = %identity.id, role = role.as_str(), "Added identity");
        Ok(identity)
    }

    pub async fn remove_identity(&self, actor: &Identity, id: Uuid) -> Result<(), AppError> {
        Self::require_master(actor)?;
        if id == actor.id {
            return Err(AppError::validation("You cannot delete your own account."));
        }

        let _guard = self.admin_lock.lock().await;
        if !self.store.delete_identity(id).await? {
            return Err(AppError::NotFound(format!("User not found: {}", id)));
        }
        let revoked = self.sessions.revoke_identity(id).await;
        info!(actor = %actor.id, identity = %id, revoked, "Removed identity");
        Ok(())
    }
}
