//! Raw archive on disk through linearization to a saved and reloaded dataset.

use chatmem_core::{
    create_metadata, filter_conversations, generate_output_filename, load_archive, load_processed,
    save_conversations, ProcessedConversation, PromptSet, Role, SamplingRecord, Turn,
};

const ARCHIVE: &str = r#"[
  {
    "id": "conv-1",
    "title": "Viaje a Lisboa",
    "create_time": 1700000000.0,
    "update_time": 1700000500.0,
    "current_node": "msg2",
    "mapping": {
      "root": {"message": null, "parent": null},
      "msg1": {"message": {"author": {"role": "user"}, "content": {"parts": ["¿Qué visitar en Lisboa?"]}, "create_time": 1700000010.0}, "parent": "root"},
      "msg2": {"message": {"author": {"role": "assistant"}, "content": {"parts": ["Alfama y Belém."]}, "create_time": 1700000020.0, "metadata": {"model_slug": "gpt-4o"}}, "parent": "msg1"}
    }
  },
  {
    "id": "conv-2",
    "title": null,
    "current_node": "a",
    "mapping": {
      "a": {"message": {"author": {"role": "user"}, "content": {"parts": ["hello"]}}, "parent": null}
    }
  }
]"#;

fn prompts() -> PromptSet {
    PromptSet {
        summarization: "S".into(),
        memory_extraction: "M".into(),
    }
}

#[test]
fn test_archive_round_trip_through_storage() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("conversations.json");
    std::fs::write(&archive_path, ARCHIVE).unwrap();

    let raw = load_archive(&archive_path);
    assert_eq!(raw.len(), 2);

    let linear = filter_conversations(&raw, Some("lisboa"), 2);
    assert_eq!(linear.len(), 1);
    assert_eq!(linear[0].messages[0].role, Role::User);
    assert_eq!(linear[0].messages[1].model_slug.as_deref(), Some("gpt-4o"));

    let mut processed = ProcessedConversation::from_raw(&raw[0]);
    processed.turns = vec![
        Turn::user(linear[0].messages[0].text.clone()),
        Turn::assistant(linear[0].messages[1].text.clone(), "- Recomienda barrios"),
    ];
    processed.memories = Some("- Planea viajar a Lisboa".into());

    let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    let out = generate_output_filename("gpt-4o-mini", Some(1), true, date, dir.path()).unwrap();
    assert!(out.ends_with("prod/convs_with_memories_0307_gpt4omini_nsamples1.json"));

    let metadata = create_metadata(
        "gpt-4o-mini",
        "openai",
        prompts(),
        Some(SamplingRecord {
            random_seed: 42,
            n_samples: 1,
        }),
    );
    save_conversations(&out, &[processed.clone()], Some(&metadata)).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("¿Qué visitar en Lisboa?"));
    assert!(text.contains("\n    \"conversations\""));

    let loaded = load_processed(&out);
    assert_eq!(loaded.conversations, vec![processed]);
    assert_eq!(loaded.metadata, Some(metadata));
}

#[test]
fn test_unknown_metadata_keys_survive_resave() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tagged.json");
    std::fs::write(
        &path,
        r#"{"conversations": [], "metadata": {"model": "m", "llm_mode": "local", "reviewer": "ana"}}"#,
    )
    .unwrap();

    let first = load_processed(&path);
    save_conversations(&path, &first.conversations, first.metadata.as_ref()).unwrap();
    let second = load_processed(&path);

    let meta = second.metadata.unwrap();
    assert_eq!(meta.extra.get("reviewer").and_then(|v| v.as_str()), Some("ana"));
    assert!(meta.sampling.is_none());
}
