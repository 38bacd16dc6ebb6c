//! Prompt assembly: renders a bounded view of a [`ContextBundle`].
//!
//! The user content is a fixed sequence of sections:
//!
//! 1. **Projects**: first `max_projects`, as `- name (Status: status)`
//! 2. **Tasks**: first `max_tasks`, as `- title (Status: s, Priority: p)`
//! 3. **Conversation**: the parent exchange verbatim, or else up to
//!    `max_history_sessions` recent root sessions with answers cut to
//!    `history_answer_chars`
//! 4. **Question**: the literal question after [`QUESTION_LABEL`]
//!
//! Oversized lists are cut, never dropped. A section is omitted only when
//! its list is empty. Assembly is deterministic.

use super::builder::ContextBundle;
use pmassist_config::PromptLimits;
use pmassist_core::generation::QUESTION_LABEL;
use pmassist_core::ids::UserId;
use pmassist_core::model::StyleProfile;
use pmassist_core::session::ConversationSession;
use std::fmt::Write;

const ELLIPSIS: &str = "...";

/// Which prior conversation, if any, to render when there is no parent.
#[derive(Debug, Clone, Copy)]
pub enum HistoryMode<'a> {
    Off,
    /// The user's recent root sessions, newest first.
    Ambient(&'a [ConversationSession]),
}

/// What gets sent to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub system_instructions: String,
    pub user_content: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    limits: PromptLimits,
}

impl PromptAssembler {
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    /// Build the prompt for `question`.
    ///
    /// `parent` is rendered only if it belongs to `requester`; a foreign
    /// parent falls through to `history`.
    pub fn assemble(
        &self,
        question: &str,
        bundle: &ContextBundle,
        profile: &StyleProfile,
        requester: UserId,
        history: HistoryMode<'_>,
        parent: Option<&ConversationSession>,
    ) -> PromptRequest {
        let mut sections: Vec<String> = Vec::with_capacity(4);

        if let Some(s) = self.projects_section(bundle) {
            sections.push(s);
        }
        if let Some(s) = self.tasks_section(bundle) {
            sections.push(s);
        }

        match parent.filter(|p| p.user_id == requester) {
            Some(parent) => sections.push(parent_section(parent)),
            None => {
                if let HistoryMode::Ambient(recent) = history
                    && let Some(s) = self.history_section(recent)
                {
                    sections.push(s);
                }
            }
        }

        sections.push(format!("{QUESTION_LABEL} {question}"));

        PromptRequest {
            system_instructions: system_instructions(profile),
            user_content: sections.join("\n\n"),
        }
    }

    fn projects_section(&self, bundle: &ContextBundle) -> Option<String> {
        if bundle.projects.is_empty() {
            return None;
        }
        let mut out = String::from("Projects:");
        for project in bundle.projects.iter().take(self.limits.max_projects) {
            let _ = write!(out, "\n- {} (Status: {})", project.name, project.status);
        }
        Some(out)
    }

    fn tasks_section(&self, bundle: &ContextBundle) -> Option<String> {
        if bundle.tasks.is_empty() {
            return None;
        }
        let mut out = String::from("Tasks:");
        for task in bundle.tasks.iter().take(self.limits.max_tasks) {
            let _ = write!(
                out,
                "\n- {} (Status: {}, Priority: {})",
                task.title, task.status, task.priority
            );
        }
        Some(out)
    }

    fn history_section(&self, recent: &[ConversationSession]) -> Option<String> {
        if recent.is_empty() {
            return None;
        }
        let mut out = String::from("Recent conversation history:");
        for session in recent.iter().take(self.limits.max_history_sessions) {
            let answer = session.response.as_deref().unwrap_or_default();
            let _ = write!(
                out,
                "\nQ: {}\nA: {}",
                session.question,
                truncate_chars(answer, self.limits.history_answer_chars)
            );
        }
        Some(out)
    }
}

fn parent_section(parent: &ConversationSession) -> String {
    format!(
        "Previous question: {}\nPrevious response: {}",
        parent.question,
        parent.response.as_deref().unwrap_or_default()
    )
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// The system message for a style profile.
pub fn system_instructions(profile: &StyleProfile) -> String {
    let mut out = format!(
        "You are an AI assistant helping project managers with their projects and tasks. \
         Your communication style should be {}. ",
        profile.tone.as_str().to_lowercase()
    );
    if profile.prefer_bullets {
        out.push_str("Prefer bullet points in your responses. ");
    }
    if profile.include_risks_by_default {
        out.push_str("Always include potential risks or concerns when relevant. ");
    }
    out.push_str(
        "Provide clear, concise, and actionable responses based on the project data provided.",
    );
    out
}
