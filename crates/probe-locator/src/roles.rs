//! Logical roles and the versioned selector sets that map them to markup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::LocateError;

/// Logical UI roles the engine interacts with.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalRole {
    ChatInput,
    SendControl,
    ContentRoot,
}

impl LogicalRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatInput => "chat_input",
            Self::SendControl => "send_control",
            Self::ContentRoot => "content_root",
        }
    }

    pub fn all() -> [LogicalRole; 3] {
        [Self::ChatInput, Self::SendControl, Self::ContentRoot]
    }
}

impl fmt::Display for LogicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered candidate selectors per logical role, most to least specific.
/// Owned by configuration rather than any component: the target page's
/// markup is not under this system's control, so the set carries a
/// revision tag and can be swapped per deployment without code changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    #[serde(default)]
    pub revision: String,
    pub chat_input: Vec<String>,
    pub send_control: Vec<String>,
    pub content_root: Vec<String>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            revision: "2026-08".into(),
            chat_input: vec![
                "textarea[placeholder*='Ask']".into(),
                "textarea[placeholder*='question']".into(),
                "input[type='text']".into(),
            ],
            send_control: vec![
                "button[type='submit']".into(),
                "button[aria-label='Send']".into(),
            ],
            content_root: vec![
                "main".into(),
                "div[class*='chat']".into(),
                "div[class*='conversation']".into(),
                "body".into(),
            ],
        }
    }
}

impl SelectorSet {
    pub fn candidates(&self, role: LogicalRole) -> &[String] {
        match role {
            LogicalRole::ChatInput => &self.chat_input,
            LogicalRole::SendControl => &self.send_control,
            LogicalRole::ContentRoot => &self.content_root,
        }
    }

    /// Every role needs at least one candidate, or location is impossible
    /// before a session even opens.
    pub fn validate(&self) -> Result<(), LocateError> {
        for role in LogicalRole::all() {
            if self.candidates(role).is_empty() {
                return Err(LocateError::EmptyRole(role));
            }
        }
        Ok(())
    }
}
