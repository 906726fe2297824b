//! Scenario 5: matrix expansion with a tag-selector axis and an
//! exclude spec dropping exactly one cell.

use project_config::Identifier;

const YAML: &str = r"
axes:
  - id: os
    values:
      - id: ubuntu
        tags: [linux]
      - id: rhel
        tags: [linux]
  - id: bits
    values:
      - id: '32'
      - id: '64'
buildvariants:
  - matrix_name: matrix
    matrix_spec:
      os: ['.linux']
      bits: ['32', '64']
    exclude_spec:
      - os: ['ubuntu']
        bits: ['32']
";

#[test]
fn exclude_drops_exactly_the_named_cell() {
    let (project, errors) = project_config::compile(YAML.as_bytes(), Identifier::default()).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    let mut names: Vec<&str> = project
        .build_variants
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "matrix__os~rhel_bits~32",
            "matrix__os~rhel_bits~64",
            "matrix__os~ubuntu_bits~64",
        ]
    );
}
