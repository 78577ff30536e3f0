//! Template customizer — turns a master template and a user's automation
//! config into a concrete workflow definition.
//!
//! Pure function, no I/O. Identical inputs produce byte-identical output,
//! which the verification step relies on.

use std::collections::BTreeMap;

use serde_json::json;

use crate::automation::AutomationConfig;
use crate::template::definition::{Node, NodeKind, WorkflowDefinition};
use crate::template::keywords::derive_keywords;

/// Category assigned to mail that matches no configured category.
pub const DEFAULT_CATEGORY: &str = "General";

/// Node ids used by the master template.
pub mod node_ids {
    pub const TRIGGER: &str = "trigger";
    pub const CATEGORIZER: &str = "categorizer";
    pub const ASSIGN_LABEL: &str = "assign_label";
    pub const NOTIFY_TEAM: &str = "notify_team";
}

/// The baseline automation every deployment starts from: poll the mailbox,
/// categorize, label, notify.
pub fn master_template() -> WorkflowDefinition {
    let nodes = vec![
        Node {
            id: node_ids::TRIGGER.into(),
            name: "Mailbox Trigger".into(),
            kind: NodeKind::Trigger,
            parameters: json!({"intervalMinutes": 5}),
        },
        Node {
            id: node_ids::CATEGORIZER.into(),
            name: "Categorize Email".into(),
            kind: NodeKind::Categorizer,
            parameters: json!({
                "defaultCategory": DEFAULT_CATEGORY,
                "rules": [],
                "expression": render_category_chain(&[]),
            }),
        },
        Node {
            id: node_ids::ASSIGN_LABEL.into(),
            name: "Assign Label".into(),
            kind: NodeKind::AssignLabel,
            parameters: json!({"mode": "by_category"}),
        },
        Node {
            id: node_ids::NOTIFY_TEAM.into(),
            name: "Notify Team".into(),
            kind: NodeKind::Notify,
            parameters: json!({"recipients": ""}),
        },
    ];

    let mut connections = BTreeMap::new();
    connections.insert(
        node_ids::TRIGGER.to_string(),
        vec![node_ids::CATEGORIZER.to_string()],
    );
    connections.insert(
        node_ids::CATEGORIZER.to_string(),
        vec![node_ids::ASSIGN_LABEL.to_string()],
    );
    connections.insert(
        node_ids::ASSIGN_LABEL.to_string(),
        vec![node_ids::NOTIFY_TEAM.to_string()],
    );

    WorkflowDefinition {
        name: "Email Automation".into(),
        nodes,
        connections,
        settings: json!({"timezone": "UTC"}),
    }
}

/// Customize a master template for one user.
///
/// Deep-copies the master, embeds the user identity in the name, and — when
/// the config carries categories or team members — regenerates the
/// categorization chain and the notification target list. Label mappings
/// are carried in the deployment snapshot but not yet applied to the
/// generated graph.
pub fn customize(
    master: &WorkflowDefinition,
    user_id: &str,
    config: &AutomationConfig,
) -> WorkflowDefinition {
    let mut definition = master.clone();
    definition.name = format!("{} ({user_id})", master.name);

    if !config.business_categories.is_empty() {
        let rules: Vec<serde_json::Value> = config
            .business_categories
            .iter()
            .map(|category| {
                json!({
                    "category": category.name,
                    "keywords": derive_keywords(&category.name),
                })
            })
            .collect();

        let category_keywords: Vec<(String, Vec<String>)> = config
            .business_categories
            .iter()
            .map(|c| (c.name.clone(), derive_keywords(&c.name)))
            .collect();

        if let Some(node) = definition.node_mut(node_ids::CATEGORIZER) {
            node.parameters = json!({
                "defaultCategory": DEFAULT_CATEGORY,
                "rules": rules,
                "expression": render_category_chain(&category_keywords),
            });
        }
    }

    if !config.team_members.is_empty() {
        let recipients = config.notification_emails().join(",");
        if !recipients.is_empty() {
            if let Some(node) = definition.node_mut(node_ids::NOTIFY_TEAM) {
                node.parameters = json!({"recipients": recipients});
            }
        }
    }

    definition
}

/// Render the ordered if/else-if chain the categorizer node evaluates.
///
/// First matching category wins; chain order follows the input order, so
/// tie-breaks are caller-controlled. Subject and body are matched
/// case-insensitively; unmatched mail falls through to the default.
fn render_category_chain(category_keywords: &[(String, Vec<String>)]) -> String {
    let mut out = String::from(
        "const text = ((email.subject || \"\") + \" \" + (email.body || \"\")).toLowerCase();\n",
    );
    for (index, (category, keywords)) in category_keywords.iter().enumerate() {
        let condition = keywords
            .iter()
            .map(|k| format!("text.includes(\"{}\")", escape_js(k)))
            .collect::<Vec<_>>()
            .join(" || ");
        let branch = if index == 0 { "if" } else { "else if" };
        out.push_str(&format!(
            "{branch} ({condition}) return \"{}\";\n",
            escape_js(category)
        ));
    }
    out.push_str(&format!("return \"{DEFAULT_CATEGORY}\";\n"));
    out
}

fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
