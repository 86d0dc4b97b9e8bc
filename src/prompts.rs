//! Prompt templates for the draft and revise steps.
//!
//! Every model turn gets the same researcher template. Only the first
//! numbered instruction changes between the draft and the revisions.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::schema::AnswerKind;

/// First instruction of the draft step.
pub const DRAFT_INSTRUCTION: &str = "Provide a detailed ~250 word answer.";

/// First instruction of every revise step.
pub const REVISE_INSTRUCTIONS: &str = r#"Revise your previous answer using the new information.
    - You should use the previous critique to add important information to your answer.
        - You MUST include numerical citations in your revised answer to ensure it can be verified.
        - Add a "References" section to the bottom of your answer (which does not count towards the word limit). In the form of:
            - [1] https://example.com
            - [2] https://example.com
    - You should use the previous critique to remove superfluous information from your answer and make SURE it is not more than 250 words."#;

/// Sent after the history on every turn.
pub const CLOSING_INSTRUCTION: &str = "Answer the user's question above using the required format.";

/// System preamble for a model turn, stamped with `now` in ISO-8601.
pub fn actor_preamble(kind: AnswerKind, now: DateTime<Utc>) -> String {
    let first_instruction = match kind {
        AnswerKind::Draft => DRAFT_INSTRUCTION,
        AnswerKind::Revise => REVISE_INSTRUCTIONS,
    };

    format!(
        r#"You are an expert researcher.
Current time: {time}

1. {first_instruction}
2. Reflect and critique your answer. Be severe to maximize improvement.
3. Recommend search queries to research information and improve your answer."#,
        time = now.to_rfc3339_opts(SecondsFormat::Secs, true),
        first_instruction = first_instruction,
    )
}
