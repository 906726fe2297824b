//! Scenario 4: a scalar `depends_on` value normalizes to exactly one
//! dependency, matching its object-form equivalent.

use project_config::Identifier;

#[test]
fn scalar_depends_on_yields_one_dependency_with_default_status() {
    let yaml = r"
tasks:
  - name: t1
  - name: t2
    depends_on: t1
";
    let (project, errors) = project_config::compile(yaml.as_bytes(), Identifier::default()).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    let t2 = project.tasks.iter().find(|t| t.name == "t2").unwrap();
    assert_eq!(t2.depends_on.len(), 1);
    assert_eq!(t2.depends_on[0].name, "t1");
    assert_eq!(t2.depends_on[0].variant, "");
    assert!(!t2.depends_on[0].patch_optional);
}
