use super::*;
use crate::model::{MemoryScope, MergePolicy};

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/parley/config.toml").unwrap();
    assert_eq!(cfg.parley.name, "Parley");
    assert_eq!(cfg.memory.max_context_messages, 20);
    assert_eq!(cfg.delivery.chunk_delay_ms, 1500);
    assert_eq!(cfg.delivery.skip_services, vec!["test", "internal"]);
    assert_eq!(cfg.onboarding.individual.trigger_phrase, "start onboarding");
    assert!(cfg.onboarding.individual.is_active());
    assert_eq!(cfg.provider.default, "openai");
    assert_eq!(cfg.provider.timeout_secs, 60);
}

#[test]
fn test_load_full_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[parley]
name = "Ada"
agent_handles = ["+1 555 010 9999"]

[provider]
default = "anthropic"
timeout_secs = 15

[provider.anthropic]
api_key = "sk-ant"

[memory]
max_context_messages = 10

[[memory.fields]]
id = "role"
description = "job title"
policy = "replace"

[[memory.fields]]
id = "team_rituals"
scope = "chat"
policy = "accumulate"

[delivery]
chunk_messages = true
chunk_delay_ms = 0
skip_services = ["sandbox"]

[onboarding.individual]
trigger_phrase = "set me up"

[[onboarding.individual.fields]]
id = "name"
description = "name"

[[onboarding.individual.fields]]
id = "nickname"
description = "nickname"
required = false

[onboarding.group]
enabled = false
"#,
    )
    .unwrap();

    let cfg = load(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.parley.name, "Ada");
    assert_eq!(cfg.parley.data_dir, "~/.parley");
    assert_eq!(cfg.provider.default, "anthropic");
    assert_eq!(cfg.provider.timeout_secs, 15);
    let anthropic = cfg.provider.anthropic.unwrap();
    assert_eq!(anthropic.api_key, "sk-ant");
    assert_eq!(anthropic.max_tokens, 1024);
    assert!(cfg.provider.openai.is_none());

    assert_eq!(cfg.memory.max_context_messages, 10);
    assert_eq!(cfg.memory.policy_for("role"), Some(MergePolicy::Replace));
    assert_eq!(cfg.memory.policy_for("unknown"), None);
    assert_eq!(cfg.memory.fields_in(MemoryScope::Chat).count(), 1);
    assert_eq!(cfg.memory.fields_in(MemoryScope::User).count(), 1);

    assert!(cfg.delivery.chunk_messages);
    assert!(cfg.delivery.skips("SANDBOX"));
    assert!(!cfg.delivery.skips("test"));

    let individual = &cfg.onboarding.individual;
    assert_eq!(individual.trigger_phrase, "set me up");
    assert_eq!(individual.fields.len(), 2);
    assert!(individual.fields[0].required);
    assert!(!individual.fields[1].required);
    assert_eq!(individual.final_message, OnboardingFlowConfig::individual().final_message);
    assert!(!cfg.onboarding.group.enabled);
    assert!(!cfg.onboarding.group.is_active());
}

#[test]
fn test_partial_flow_section_keeps_flow_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[onboarding.group]\nfinal_message = \"All set, team.\"\n").unwrap();

    let cfg = load(path.to_str().unwrap()).unwrap();
    let group = &cfg.onboarding.group;
    assert_eq!(group.final_message, "All set, team.");
    assert_eq!(group.fields.len(), OnboardingFlowConfig::group().fields.len());
    assert!(group.is_active());
    assert!(cfg.onboarding.individual.is_active());
}

#[test]
fn test_load_invalid_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[parley\nname = ").unwrap();
    let err = load(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, crate::error::ParleyError::Config(_)));
}

#[test]
fn test_agent_handle_matching_is_normalized() {
    let cfg = ParleyConfig {
        agent_handles: vec!["+1 (555) 010-9999".into(), "Bot@Example.com".into()],
        ..Default::default()
    };
    assert!(cfg.is_agent_handle("+15550109999"));
    assert!(cfg.is_agent_handle("bot@example.com"));
    assert!(!cfg.is_agent_handle("+15550100000"));
    assert!(!cfg.is_agent_handle("  "));
}

#[test]
fn test_shellexpand_home() {
    if let Some(home) = std::env::var_os("HOME") {
        let expanded = shellexpand("~/x/y");
        assert_eq!(expanded, format!("{}/x/y", home.to_string_lossy()));
    }
    assert_eq!(shellexpand("/abs/path"), "/abs/path");
}

#[test]
fn test_parse_markdown_sections() {
    let md = "intro ignored\n## Persona\nBe nice.\n\n## Empty\n\n## Apology\nOops.\n";
    let sections = parse_markdown_sections(md);
    assert_eq!(sections.get("Persona").map(String::as_str), Some("Be nice."));
    assert_eq!(sections.get("Apology").map(String::as_str), Some("Oops."));
    assert!(!sections.contains_key("Empty"));
}

#[test]
fn test_prompts_load_overrides_sections() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
    std::fs::write(
        dir.path().join("prompts/PROMPTS.md"),
        "## Persona\nYou are Ada.\n\n## Apology\nMy bad.\n",
    )
    .unwrap();

    let prompts = Prompts::load(dir.path().to_str().unwrap());
    let defaults = Prompts::default();
    assert_eq!(prompts.persona, "You are Ada.");
    assert_eq!(prompts.apology, "My bad.");
    assert_eq!(prompts.triage, defaults.triage);
}

#[test]
fn test_prompts_load_missing_dir_uses_defaults() {
    let prompts = Prompts::load("/nonexistent/parley");
    assert!(prompts.triage.contains("project_flow"));
    assert!(!prompts.apology.is_empty());
}
