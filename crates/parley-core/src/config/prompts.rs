use std::collections::HashMap;

use super::shellexpand;

/// Instruction texts sent to the reasoning service.
///
/// Built-in defaults can be overridden section by section from
/// `{data_dir}/prompts/PROMPTS.md`.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Agent persona, prepended to every user-facing generation.
    pub persona: String,
    /// Intent classification instruction (JSON mode).
    pub triage: String,
    /// Onboarding field extraction instruction (JSON mode).
    pub extraction: String,
    /// Background memory enrichment instruction (JSON mode).
    pub enrichment: String,
    /// Onboarding next-question instruction.
    pub question: String,
    /// Sent when a message cannot be handled at all.
    pub apology: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            persona: "You are a friendly assistant that lives inside a chat app.\n\
                      Keep replies short and conversational. Use plain text, no markdown headings.\n\
                      In group chats, address the group, not a single person, unless asked."
                .into(),
            triage: "Decide what the assistant should do with the latest message in this conversation.\n\
                     Respond with a single JSON object and nothing else:\n\
                     {\"intent\": \"simple_response\" | \"onboarding_flow\" | \"no_reply\" | \"project_flow\",\n \
                     \"action\": \"create\" | \"update\" | \"complete\" | \"reference\",\n \
                     \"project_name\": string, \"description\": string,\n \
                     \"attribute_updates\": object, \"replace_attributes\": boolean}\n\
                     Only include the project keys for project_flow.\n\
                     Use no_reply for messages that need no answer (acknowledgements, banter between other people).\n\
                     Use onboarding_flow when the user asks to set up or redo their profile."
                .into(),
            extraction: "Extract the requested fields from the whole conversation below.\n\
                         Respond with a single JSON object mapping field id to value.\n\
                         Use an empty string for any field the user has not provided. Never guess."
                .into(),
            enrichment: "Extract durable facts worth remembering from the latest message.\n\
                         Respond with a single JSON object: {\"user\": {field_id: value}, \"chat\": {field_id: value}}.\n\
                         \"user\" holds facts about the sender, \"chat\" facts about the conversation as a whole.\n\
                         Leave both objects empty when nothing is worth remembering."
                .into(),
            question: "You are collecting a few details from the user. Ask for the missing details below \
                       in one short, natural message. Do not repeat questions already answered."
                .into(),
            apology: "Sorry, something went wrong on my side. Please try again in a moment.".into(),
        }
    }
}

impl Prompts {
    /// Load prompts from `{data_dir}/prompts/PROMPTS.md`.
    ///
    /// Missing file or sections fall back to defaults.
    pub fn load(data_dir: &str) -> Self {
        let mut prompts = Self::default();
        let dir = shellexpand(data_dir);

        let prompt_path = format!("{dir}/prompts/PROMPTS.md");
        if let Ok(content) = std::fs::read_to_string(&prompt_path) {
            let sections = parse_markdown_sections(&content);
            for (name, slot) in [
                ("Persona", &mut prompts.persona),
                ("Triage", &mut prompts.triage),
                ("Extraction", &mut prompts.extraction),
                ("Enrichment", &mut prompts.enrichment),
                ("Question", &mut prompts.question),
                ("Apology", &mut prompts.apology),
            ] {
                if let Some(v) = sections.get(name) {
                    *slot = v.clone();
                }
            }
            tracing::info!("loaded prompts from {prompt_path}");
        }

        prompts
    }
}

/// Parse a markdown file with `## Section` headers into a map of section name -> body.
pub(super) fn parse_markdown_sections(content: &str) -> HashMap<String, String> {
    let mut sections = HashMap::new();
    let mut current_key: Option<String> = None;
    let mut current_body = String::new();

    let mut flush = |key: Option<String>, body: &str| {
        if let Some(key) = key {
            let trimmed = body.trim();
            if !trimmed.is_empty() {
                sections.insert(key, trimmed.to_string());
            }
        }
    };

    for line in content.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            flush(current_key.take(), &current_body);
            current_key = Some(header.trim().to_string());
            current_body.clear();
        } else if current_key.is_some() {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    flush(current_key, &current_body);

    sections
}

