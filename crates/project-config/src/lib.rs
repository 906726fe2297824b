//! Two-phase compiler that expands declarative CI project configuration
//! into a static project model.
//!
//! The pipeline runs entirely in memory: decode the YAML surface syntax
//! (C1), evaluate the selector language wherever it appears (C2), expand
//! matrices into synthesized build variants (C3), then translate every
//! remaining selector into concrete dependencies/requirements (C4). Stages
//! accumulate non-fatal errors into a shared list rather than aborting; the
//! single fatal case is a YAML syntax error, surfaced as [`YamlError`].
//!
//! This crate performs no I/O of its own; [`compile`] takes already-read
//! bytes and returns data, leaving file access and process exit codes to
//! its caller.

#![warn(missing_docs)]

mod decode;
mod error;
mod expand;
mod ir;
mod matrix;
mod project;
mod selector;
mod translate;

pub use error::{CompileError, ErrorCategory, ErrorSink, YamlError};
pub use ir::{Identifier, TriState};
pub use project::{BuildVariant, Dependency, Project, ProjectTask, Requirement, VariantTask};
pub use selector::{Cohort, Criterion, Evaluator, Selector};

/// Compile a YAML project configuration document into a [`Project`].
///
/// `identifier` is copied onto the returned project, taking precedence over
/// any `owner`/`repo`/`branch`/`display_name` fields present in the
/// document itself.
///
/// Non-fatal shape, selector, matrix, conflict, and validation errors
/// accumulate in the returned list; the project returned alongside them is
/// always the best effort the pipeline could build, even when errors are
/// present. The only error that prevents a project from being returned at
/// all is a YAML syntax error.
///
/// # Errors
///
/// Returns [`YamlError`] only when `bytes` is not well-formed YAML.
#[tracing::instrument(skip_all)]
pub fn compile(
    bytes: &[u8],
    identifier: Identifier,
) -> Result<(Project, Vec<CompileError>), YamlError> {
    let (mut ip, decode_errors) = decode::decode(bytes)?;

    let mut errors = ErrorSink::new();
    errors.extend(decode_errors.into_vec());
    errors.extend(matrix::expand_matrices(&mut ip).into_vec());

    let (mut project, translate_errors) = translate::translate(&ip);
    errors.extend(translate_errors.into_vec());

    project.identifier = identifier;

    Ok((project, errors.into_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_overrides_document_identifier_with_caller_supplied_one() {
        let yaml = "owner: doc-owner\nrepo: doc-repo\n";
        let identifier = Identifier {
            owner: "caller-owner".to_string(),
            repo: "caller-repo".to_string(),
            branch: "main".to_string(),
            display_name: "Caller Project".to_string(),
        };
        let (project, errors) = compile(yaml.as_bytes(), identifier.clone()).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(project.identifier, identifier);
    }

    #[test]
    fn compile_surfaces_yaml_syntax_errors_as_fatal() {
        let result = compile(b"tasks: [\n", Identifier::default());
        assert!(result.is_err());
    }

    #[test]
    fn compile_accumulates_errors_and_still_returns_a_project() {
        let yaml = r"
tasks:
  - name: t1
    depends_on: nonexistent
";
        let (project, errors) = compile(yaml.as_bytes(), Identifier::default()).unwrap();
        assert!(!errors.is_empty());
        assert_eq!(project.tasks.len(), 1);
    }

    #[test]
    fn compile_expands_matrices_before_translation() {
        let yaml = r"
axes:
  - id: os
    values:
      - id: ubuntu
      - id: rhel
buildvariants:
  - matrix_name: os_matrix
    matrix_spec:
      os: ['*']
";
        let (project, errors) = compile(yaml.as_bytes(), Identifier::default()).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(project.build_variants.len(), 2);
    }
}
