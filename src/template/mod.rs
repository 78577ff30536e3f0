//! Workflow templates — master template and per-user customization.

pub mod customizer;
pub mod definition;
pub mod keywords;

pub use customizer::{customize, master_template};
pub use definition::{Node, NodeKind, WorkflowDefinition};
pub use keywords::derive_keywords;
