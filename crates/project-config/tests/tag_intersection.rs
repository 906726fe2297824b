//! Scenario 1: tag intersection over a cohort of colored tasks.

use project_config::Identifier;

const COHORT: &str = r"
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
";

#[test]
fn cool_and_primary_narrows_to_a_single_task() {
    let yaml = format!(
        "{COHORT}  - name: checker\n    requires: \".cool .primary\"\n"
    );
    let (project, errors) = project_config::compile(yaml.as_bytes(), Identifier::default()).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    let checker = project.tasks.iter().find(|t| t.name == "checker").unwrap();
    assert_eq!(checker.requires.len(), 1);
    assert_eq!(checker.requires[0].name, "blue");
}

#[test]
fn disjoint_tags_yield_selector_error() {
    let yaml = format!(
        "{COHORT}  - name: checker\n    requires: \".warm .cool\"\n"
    );
    let (_project, errors) = project_config::compile(yaml.as_bytes(), Identifier::default()).unwrap();
    assert!(errors
        .iter()
        .any(|e| e.category() == project_config::ErrorCategory::SelectorError));
}
