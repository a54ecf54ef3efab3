use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Expert,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Expert => "expert",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Self::Client),
            "expert" => Some(Self::Expert),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Account record shared by all roles. Profile tables hang off this by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Client profile, read-only from the lifecycle's perspective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub institution: Option<String>,
    pub academic_level: Option<String>,
}

/// Expert profile, read-only from the lifecycle's perspective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpertProfile {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub specializations: Vec<String>,
    pub hourly_rate: Option<Decimal>,
}

impl ExpertProfile {
    /// Advisory match used by expert assignment: case-insensitive membership
    /// of the service category in the expert's specialization set.
    pub fn covers_category(&self, category: &str) -> bool {
        self.specializations.iter().any(|s| s.eq_ignore_ascii_case(category))
    }
}

#[cfg(test)]
mod tests {
    use super::{ExpertProfile, UserId, UserRole};

    #[test]
    fn role_round_trips_from_storage_encoding() {
        for role in [UserRole::Client, UserRole::Expert, UserRole::Admin] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("superuser"), None);
    }

    #[test]
    fn category_match_is_case_insensitive() {
        let expert = ExpertProfile {
            user_id: UserId("expert-1".to_string()),
            email: "expert@example.com".to_string(),
            display_name: "Dr. Chen".to_string(),
            specializations: vec!["Essay Writing".to_string(), "Statistics".to_string()],
            hourly_rate: None,
        };

        assert!(expert.covers_category("essay writing"));
        assert!(!expert.covers_category("chemistry"));
    }
}
