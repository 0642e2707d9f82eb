use proptest::prelude::*;
use sdk::errors::{CopydeskErrorExt, EngineError};

// Property: Error User Hint Completeness
// Every error carries a non-empty, user-safe hint that never leaks the raw
// internal message.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC{1,40}", entry_id in 0..1_000i64) {
        let errs = vec![
            EngineError::Generation(error_str.clone()),
            EngineError::Configuration(error_str.clone()),
            EngineError::Storage(error_str.clone()),
            EngineError::Conflict { entry_id },
            EngineError::ImmutableEntry { entry_id },
            EngineError::EntryNotFound(entry_id),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());

            // Hints are static strings; the raw internal message never
            // reaches them.
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

// Property: Ruleset Parsing Round-Trip
// A valid ruleset survives TOML serialization and re-parsing with all rule
// attributes intact.
proptest! {
    #[test]
    fn test_ruleset_roundtrip(
        rule_id in "[a-z][a-z0-9-]{1,20}",
        phrase in "[a-z ]{1,30}",
        max_chars in 10..200usize,
        marker in "[a-z]{3,12}",
    ) {
        use sdk::ruleset::{Rule, RuleSeverity, Ruleset};
        use sdk::types::FieldType;

        let ruleset = Ruleset {
            rules: vec![
                Rule::RequiredPhrase {
                    id: format!("{}-phrase", rule_id),
                    phrase: phrase.trim().to_string() + "x",
                    severity: RuleSeverity::Block,
                    message: "required".to_string(),
                    fields: vec![FieldType::Body],
                },
                Rule::Length {
                    id: format!("{}-length", rule_id),
                    min_chars: None,
                    max_chars: Some(max_chars),
                    severity: RuleSeverity::Warn,
                    message: "too long".to_string(),
                    fields: vec![],
                },
                Rule::ToneMarkers {
                    id: format!("{}-tone", rule_id),
                    markers: vec![marker],
                    severity: RuleSeverity::Warn,
                    message: "off-brand tone".to_string(),
                    fields: vec![FieldType::Subject, FieldType::Preheader],
                },
            ],
        };
        prop_assert!(ruleset.validate().is_ok());

        let toml_string = toml::to_string(&ruleset).expect("Failed to serialize ruleset");
        let parsed = Ruleset::from_toml_str(&toml_string).expect("Failed to re-parse ruleset");

        prop_assert_eq!(parsed.rules.len(), 3);
        for (original, parsed_rule) in ruleset.rules.iter().zip(parsed.rules.iter()) {
            prop_assert_eq!(original.id(), parsed_rule.id());
            prop_assert_eq!(original.severity(), parsed_rule.severity());
            prop_assert_eq!(original.message(), parsed_rule.message());
        }
    }
}
