use super::{Collection, StoreError, UserStore};
use serde::{Deserialize, Serialize};

/// Compte du personnel tel que stocké. Le hash n'est jamais renvoyé par l'API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
    pub password_hash: String,
}

pub struct JsonUsers {
    docs: Collection<UserRecord>,
}

impl JsonUsers {
    pub fn new(docs: Collection<UserRecord>) -> Self {
        Self { docs }
    }
}

impl UserStore for JsonUsers {
    fn create(&self, user: UserRecord) -> Result<(), StoreError> {
        self.docs.write(|docs| {
            if docs.iter().any(|u| u.username == user.username) {
                return Err(StoreError::DuplicateUser(user.username.clone()));
            }
            docs.push(user);
            Ok(())
        })
    }

    fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.docs.read(|docs| docs.to_vec()))
    }

    fn remove(&self, username: &str) -> Result<(), StoreError> {
        self.docs.write(|docs| {
            let before = docs.len();
            docs.retain(|u| u.username != username);
            if docs.len() == before {
                return Err(StoreError::NotFound(format!("User {username}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            username: name.into(),
            role: Some("nurse".into()),
            password_hash: "x".into(),
        }
    }

    #[test]
    fn test_unique_usernames_and_remove() {
        let store = JsonUsers::new(Collection::in_memory("users"));
        store.create(user("alice")).unwrap();
        assert!(matches!(store.create(user("alice")), Err(StoreError::DuplicateUser(_))));

        assert!(matches!(store.remove("bob"), Err(StoreError::NotFound(_))));
        store.remove("alice").unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
