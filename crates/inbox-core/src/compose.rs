use crate::task::Task;

const FALLBACK_SUBJECT: &str = "Follow-up";

/// What gets handed to the mail client when a follow-up is approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Draft {
    /// `edited` is the reply as changed by the user; blank falls back to the
    /// suggested message.
    pub fn for_task(task: &Task, edited: Option<&str>) -> Self {
        let subject = if task.reason.trim().is_empty() {
            FALLBACK_SUBJECT.to_string()
        } else {
            format!("Re: {}", task.reason)
        };

        let body = edited
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(task.ai_suggested_message.as_str())
            .to_string();

        Self {
            to: task.lead_email.clone(),
            subject,
            body,
        }
    }
}
