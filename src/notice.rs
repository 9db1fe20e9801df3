//! Short user-facing notifications.
//!
//! A notice names the operation and gives a one-line reason. Error chains,
//! ids and hashes never reach it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, title: title.into(), message: one_line(&message.into()) }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, title: title.into(), message: one_line(&message.into()) }
    }

    /// `"<operation> failed"` with the error's top-level message.
    pub fn failure(operation: &str, error: &dyn std::error::Error) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: format!("{operation} failed"),
            message: one_line(&error.to_string()),
        }
    }
}

fn one_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("bad payload\nat composer.rs:42")]
    struct Multiline;

    #[test]
    fn test_failure_keeps_first_line() {
        let notice = Notice::failure("Label render", &Multiline);
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "Label render failed");
        assert_eq!(notice.message, "bad payload");
    }
}
