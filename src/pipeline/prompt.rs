//! Prompt assembly for the chat model.

use crate::conversation::ConversationTurn;

/// Render history one line per turn.
pub fn render_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("Client: {} | Therapist: {}", turn.user_input, turn.model_output))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the single `user` message sent to the model.
pub fn build_prompt(history: &[ConversationTurn], knowledge: &[String], user_input: &str) -> String {
    format!(
        "Previous conversation:\n\
         {history}\n\
         \n\
         Therapeutic knowledge:\n\
         {knowledge}\n\
         \n\
         Client: {user_input}\n\
         \n\
         Respond with:\n\
         1. Acknowledge previous discussion\n\
         2. 1-2 techniques\n\
         3. One question",
        history = render_history(history),
        knowledge = knowledge.join("\n"),
    )
}
