//! Scenario 2: double negation over disjoint tag sets resolves to the
//! empty set, which is a SelectorError, not a silently empty result.

use project_config::Identifier;

const YAML: &str = r#"
tasks:
  - name: red
    tags: [primary, warm]
  - name: orange
    tags: [secondary, warm]
  - name: yellow
    tags: [primary, warm]
  - name: green
    tags: [secondary, cool]
  - name: blue
    tags: [primary, cool]
  - name: checker
    requires: "!.primary !.secondary"
"#;

#[test]
fn double_negation_over_exhaustive_tags_is_a_selector_error() {
    let (_project, errors) = project_config::compile(YAML.as_bytes(), Identifier::default()).unwrap();
    assert!(errors
        .iter()
        .any(|e| e.category() == project_config::ErrorCategory::SelectorError));
}
