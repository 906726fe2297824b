//! Scenario 6: axis-value merge semantics, where `run_on` overwrites
//! but tags and expansions accumulate.

use project_config::Identifier;

const YAML: &str = r"
axes:
  - id: os
    values:
      - id: ubuntu
        tags: [linux]
        run_on: [ubuntu_small]
        variables:
          user: root
  - id: bits
    values:
      - id: '64'
        run_on: [big]
buildvariants:
  - matrix_name: matrix
    matrix_spec:
      os: ['ubuntu']
      bits: ['64']
";

#[test]
fn later_axis_run_on_overwrites_earlier_while_tags_and_expansions_accumulate() {
    let (project, errors) = project_config::compile(YAML.as_bytes(), Identifier::default()).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(project.build_variants.len(), 1);
    let variant = &project.build_variants[0];
    assert_eq!(variant.run_on, vec!["big".to_string()]);
    assert!(variant.tags.contains(&"linux".to_string()));
    assert_eq!(variant.expansions.get("user"), Some(&"root".to_string()));
    assert_eq!(variant.expansions.get("os"), Some(&"ubuntu".to_string()));
    assert_eq!(variant.expansions.get("bits"), Some(&"64".to_string()));
}
