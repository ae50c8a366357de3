use serde::{Deserialize, Serialize};

/// The signed-in account as the backend reports it from `GET /user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
    pub preferences: Option<Preferences>,
}

impl Identity {
    /// Name to show in prompts and status lines
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "favoriteTeam")]
    pub favorite_team: Option<String>,
    pub notifications: Option<bool>,
}

/// Profile for a new registration. The password travels separately so it
/// never sits in a struct that gets logged or cloned around.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
}

/// Partial profile update for `PUT /user/{email}`. Fields left `None` are
/// not serialized at all, so the server leaves them untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "avatarUrl", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_parses_wire_format() {
        let json = r#"{
            "id": 42,
            "username": "box-box",
            "email": "strategist@paddock.test",
            "avatarUrl": "https://cdn.paddock.test/a/42.png",
            "preferences": {"favoriteTeam": "Garage 56", "notifications": true}
        }"#;

        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.id, 42);
        assert_eq!(identity.display_name(), "box-box");
        assert_eq!(
            identity.preferences.unwrap().favorite_team.as_deref(),
            Some("Garage 56")
        );
    }

    #[test]
    fn identity_tolerates_missing_optionals() {
        let json = r#"{"id": 1, "username": "p", "email": "p@x.y"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert!(identity.avatar_url.is_none());
        assert!(identity.preferences.is_none());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let identity = Identity {
            id: 7,
            username: String::new(),
            email: "anon@paddock.test".to_string(),
            avatar_url: None,
            preferences: None,
        };
        assert_eq!(identity.display_name(), "anon@paddock.test");
    }

    #[test]
    fn profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            username: Some("new-name".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"username":"new-name"}"#);
    }
}
