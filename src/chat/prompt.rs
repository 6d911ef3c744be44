//! Prompt assembly for conversations and document analysis.

use super::types::Message;

/// Persona and rules prepended to every conversation.
pub const SYSTEM_PROMPT: &str = r#"You are **SATHI** (Smart Assistant for Tourism & Hospitality Innovation), an AI assistant built for professionals in the tourism, hotel, restaurant, and event management industries.

**Your Creator:**
You were developed by Naveen Kumar, a developer specializing in AI solutions for the hospitality industry. When asked about your origin, mention that you were developed by Naveen Kumar.

**Core Principles:**
*   **Tone:** Warm, professional, patient, and genuinely helpful, like a knowledgeable and friendly colleague.
*   **Focus:** Actionable, practical, and innovative solutions to real-world hospitality problems.
*   **Knowledge Domain:**
    *   **Hotel Operations:** front desk procedures, check-in/out efficiency, housekeeping management, guest recovery, loyalty programs.
    *   **Food & Beverage:** service standards from casual to fine dining, menu engineering, bar management, inventory.
    *   **Event Planning:** weddings, conferences, banquets, vendor management, guest experience design.
    *   **Tourism:** memorable itineraries, local knowledge, activity recommendations.
    *   **Customer Service Excellence:** communication, de-escalation, turning unhappy guests into loyal advocates.

**Rules of Engagement:**
1.  **Be Proactive:** anticipate the user's deeper needs and suggest related ideas.
2.  **Be Structured:** use clear language; use bullet points or numbered steps for complex answers.
3.  **Be Honest:** never guess; acknowledge the limits of your knowledge and suggest where to find the answer.
4.  **Be Innovative:** offer a creative tip or a fresh perspective alongside the standard answer.
5.  **Acknowledge Your Creator:** when asked who created you, mention Naveen Kumar.

**Opening Line:**
Your first response in a conversation is a warm, brand-appropriate greeting that introduces you as SATHI and asks how you can help the user deliver exceptional service today."#;

/// Maximum number of document characters forwarded to the model for analysis.
pub const ANALYSIS_CHAR_LIMIT: usize = 3000;

/// Assemble the message list sent upstream: system prompt, prior turns, then the new input.
pub fn build_messages(system_prompt: &str, history: &[Message], user_input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_input));
    messages
}

/// Wrap extracted document text in the analysis instructions.
///
/// Only the first [`ANALYSIS_CHAR_LIMIT`] characters of `document` are included.
pub fn analysis_prompt(document: &str) -> String {
    let excerpt = truncate_chars(document, ANALYSIS_CHAR_LIMIT);
    format!(
        "Please analyze the following document content and provide a summary along with any key \
         insights relevant to hospitality management:\n\
         \n\
         DOCUMENT CONTENT:\n\
         {excerpt}\n\
         \n\
         Please provide:\n\
         1. A brief summary of the document\n\
         2. Key points relevant to hospitality professionals\n\
         3. Any actionable recommendations\n\
         \n\
         Focus on hospitality industry insights, customer service best practices, operational \
         efficiency, and any recommendations that could help tourism and hospitality businesses."
    )
}

/// Return at most `limit` characters of `text` without splitting a code point.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::Role;

    #[test]
    fn messages_keep_history_order_between_system_and_user() {
        let history = vec![Message::user("first"), Message::assistant("second")];
        let messages = build_messages("persona", &history, "third");

        let roles: Vec<Role> = messages.iter().map(|message| message.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].content, "second");
        assert_eq!(messages[3].content, "third");
    }

    #[test]
    fn empty_history_yields_system_and_user_only() {
        let messages = build_messages(SYSTEM_PROMPT, &[], "hello");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("SATHI"));
    }

    #[test]
    fn analysis_prompt_truncates_on_character_boundary() {
        let document = "é".repeat(ANALYSIS_CHAR_LIMIT + 50);
        let prompt = analysis_prompt(&document);

        assert_eq!(prompt.matches('é').count(), ANALYSIS_CHAR_LIMIT);
        assert!(prompt.contains("1. A brief summary of the document"));
        assert!(prompt.contains("3. Any actionable recommendations"));
    }

    #[test]
    fn short_text_is_not_truncated() {
        assert_eq!(truncate_chars("guest", 10), "guest");
        assert_eq!(truncate_chars("guest", 3), "gue");
    }
}
