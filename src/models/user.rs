//! User records.

use serde::Deserialize;

use super::primitives::UserId;

/// A MangaDex user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// User attributes
    #[serde(default)]
    pub attributes: UserAttributes,
}

/// The attribute block of a user record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributes {
    /// Display name
    #[serde(default)]
    pub username: String,
    /// Site roles
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// The user's display name.
    pub fn username(&self) -> &str {
        &self.attributes.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_user() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u-1",
            "attributes": {"username": "reader", "roles": ["ROLE_MEMBER"]}
        }))
        .unwrap();
        assert_eq!(user.username(), "reader");
        assert_eq!(user.attributes.roles, vec!["ROLE_MEMBER"]);
    }
}
