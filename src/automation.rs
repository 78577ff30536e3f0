//! User automation configuration — business categories, label mappings,
//! and team notification targets.
//!
//! A deployment stores a snapshot of this config; the live copy is only
//! mutated during onboarding steps.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A business category used to triage inbound mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Maps a category to a label that already exists in the user's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub category_name: String,
    pub external_label_id: String,
    pub external_label_name: String,
}

/// A team member who may be notified about categorized mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default)]
    pub notify: bool,
}

/// A user's automation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default)]
    pub business_categories: Vec<BusinessCategory>,
    #[serde(default)]
    pub label_mappings: Vec<LabelMapping>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
}

impl AutomationConfig {
    /// Emails of team members who opted into notifications, in input order.
    pub fn notification_emails(&self) -> Vec<String> {
        self.team_members
            .iter()
            .filter(|m| m.notify)
            .map(|m| m.email.clone())
            .collect()
    }

    /// Validate the config before any external call is made.
    ///
    /// A deployable config needs at least one named business category.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.business_categories.is_empty() {
            return Err(ConfigError::EmptyCategories);
        }
        for (index, category) in self.business_categories.iter().enumerate() {
            if category.name.trim().is_empty() {
                return Err(ConfigError::BlankCategoryName { index });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str) -> BusinessCategory {
        BusinessCategory {
            name: name.into(),
            description: String::new(),
        }
    }

    #[test]
    fn validate_rejects_empty_categories() {
        let config = AutomationConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyCategories)
        ));
    }

    #[test]
    fn validate_rejects_blank_category_name() {
        let config = AutomationConfig {
            business_categories: vec![category("New Leads"), category("   ")],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BlankCategoryName { index: 1 })
        ));
    }

    #[test]
    fn validate_accepts_named_categories() {
        let config = AutomationConfig {
            business_categories: vec![category("New Leads")],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn notification_emails_filters_on_notify_flag() {
        let config = AutomationConfig {
            team_members: vec![
                TeamMember {
                    name: "A".into(),
                    email: "a@x.com".into(),
                    category_name: None,
                    notify: true,
                },
                TeamMember {
                    name: "B".into(),
                    email: "b@x.com".into(),
                    category_name: Some("Support".into()),
                    notify: false,
                },
                TeamMember {
                    name: "C".into(),
                    email: "c@x.com".into(),
                    category_name: None,
                    notify: true,
                },
            ],
            ..Default::default()
        };
        assert_eq!(config.notification_emails(), vec!["a@x.com", "c@x.com"]);
    }

    #[test]
    fn serde_roundtrip_preserves_config() {
        let config = AutomationConfig {
            business_categories: vec![category("New Leads")],
            label_mappings: vec![LabelMapping {
                category_name: "New Leads".into(),
                external_label_id: "Label_17".into(),
                external_label_name: "Leads".into(),
            }],
            team_members: vec![TeamMember {
                name: "A".into(),
                email: "a@x.com".into(),
                category_name: None,
                notify: true,
            }],
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AutomationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
