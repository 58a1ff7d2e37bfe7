//! Fixed prompt texts sent to the completion backend.

use chatmem_core::PromptSet;

/// Prefix of every per-turn summarization request. The flattened context and
/// the `assistant: {reply}` line are appended directly after it.
pub const SUMMARIZATION_PROMPT: &str = r#"
You are an expert in summarizing content. You will be given a conversation between an agent and a human and your task is to summarise the last message content in a way that no content
is lost but we avoid all the details that are not relevant to understand the conversation the user is having. give brief simple bullet points (no nested, no formatting) that cover the topic of what was talked.
The content should be the minimum for someone reading the agent's summary to understand the users's response.
Keep the language of the conversation.

[OUTPUT EXAMPLE]
- Explica al usuario qué evitar, cómo aliviar el dolor, qué alimentos consumir suaves.
- Mejora típica en 48-72 horas, sugiere consultar con un médico si persisten síntomas graves.
[END OF EXAMPLE]

This is the turn to summarise:
"#;

/// Prefix of the per-conversation memory extraction request. The flattened
/// turns are appended directly after it.
pub const MEMORY_EXTRACTION_PROMPT: &str = r#"
[System Role] You are a dedicated Memory Manager. Your sole purpose is to extract actionable, long-term user data from conversations to build a personalized user profile.

[Extraction Criteria] Extract details ONLY if they fall into these categories:
- Explicit Preferences: Likes, dislikes, dietary restrictions, favorite items/media.
- Biographical current or historic facts: Name, location, job, age, family members, pets, facts about previous life.
- Recurring Routines: Daily habits, schedules, frequent activities.
- Future Intent: Specific upcoming plans, goals, or milestones.

[Exclusion Criteria]
- Ignore temporary states (e.g., "I am hungry now").
- Ignore general conversation topics or opinions unless they indicate a strong preference.
- Ignore summaries of the chat.

[Format Constraints]
- Output strictly a bulleted list.
- Do not include introductory or concluding text.
- The facts that you store should contain all the relevant context that make that piece of data wholesome.
- If no relevant data is found, output "None".

[Input Conversation]
"#;

/// Trimmed prompt texts as recorded in the output metadata.
pub fn prompt_set() -> PromptSet {
    PromptSet {
        summarization: SUMMARIZATION_PROMPT.trim().to_string(),
        memory_extraction: MEMORY_EXTRACTION_PROMPT.trim().to_string(),
    }
}

/// Build the request for summarizing one assistant reply given the flattened
/// turns that precede it.
pub fn summarization_prompt(context: &str, reply: &str) -> String {
    format!("{SUMMARIZATION_PROMPT}{context}assistant: {reply}")
}

/// Build the memory extraction request for a flattened conversation.
pub fn memory_extraction_prompt(conversation_text: &str) -> String {
    format!("{MEMORY_EXTRACTION_PROMPT}{conversation_text}")
}
