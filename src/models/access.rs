use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::ReviewJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Master,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "MASTER",
            Role::User => "USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MASTER" => Some(Role::Master),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub login: String,
    pub role: Role,
}

impl Identity {
    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// MASTER sees every job; USER only the jobs it created.
    pub fn can_view(&self, job: &ReviewJob) -> bool {
        self.is_master() || job.owner_id == self.id
    }
}

/// A named AI service key. The secret never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            secret: secret.into(),
            created_at: Utc::now(),
        }
    }

    pub fn view(&self) -> CredentialView {
        let tail: String = {
            let chars: Vec<char> = self.secret.chars().collect();
            chars[chars.len().saturating_sub(4)..].iter().collect()
        };
        CredentialView {
            id: self.id,
            name: self.name.clone(),
            masked_secret: format!("...{}", tail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialView {
    pub id: Uuid,
    pub name: String,
    pub masked_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_view_masks_all_but_last_four() {
        let cred = Credential::new("Pro-1", "AIzaSyExampleKey1234");
        let view = cred.view();
        assert_eq!(view.masked_secret, "...1234");
        assert_eq!(view.name, "Pro-1");

        let short = Credential::new("Short", "ab");
        assert_eq!(short.view().masked_secret, "...ab");
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(Role::parse(Role::Master.as_str()), Some(Role::Master));
        assert_eq!(Role::parse("USER"), Some(Role::User));
        assert_eq!(Role::parse("admin"), None);
    }
}
