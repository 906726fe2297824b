//! Translator (C4): expands selectors inside dependencies/requirements/
//! variant-task lists, deduplicates with conflict detection, and emits the
//! final project.

use std::collections::HashMap;

use crate::error::{CompileError, ErrorCategory, ErrorSink};
use crate::ir::{
    IntermediateBuildVariant, IntermediateDependency, IntermediateProject, IntermediateTask,
    IntermediateVariantTask, MatrixAxis, TaskSelector, VariantSelector,
};
use crate::matrix::{cell_contained_by, evaluate_spec};
use crate::project::{BuildVariant, Dependency, Project, ProjectTask, Requirement, VariantTask};
use crate::selector::Evaluator;

const OWNER_VARIANT: &str = "";

fn conflict_error(message: impl Into<String>, context: impl Into<String>) -> CompileError {
    CompileError::new(ErrorCategory::ConflictError, message.into()).with_context(context.into())
}

/// Resolve a variant selector (string expression, or matrix sub-definition)
/// to the list of concrete variant names it denotes.
fn resolve_variant_selector(
    selector: &VariantSelector,
    evaluator: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
) -> Result<Vec<String>, CompileError> {
    match selector {
        VariantSelector::String(s) => evaluator
            .eval_str(s)
            .map(|items| items.iter().map(|v| v.name.clone()).collect()),
        VariantSelector::Matrix(spec) => {
            let resolved = evaluate_spec(spec, axes, "variant selector")?;
            let matches: Vec<String> = evaluator
                .items()
                .iter()
                .filter(|v| cell_contained_by(&v.expansions, &resolved))
                .map(|v| v.name.clone())
                .collect();
            if matches.is_empty() {
                return Err(CompileError::new(
                    ErrorCategory::SelectorError,
                    "matrix variant selector matched no variants",
                ));
            }
            Ok(matches)
        }
    }
}

/// The (variant, name) pairs a dependency/requirement resolves to, built
/// from a task selector and an optional variant selector.
fn resolve_pairs(
    selector: &TaskSelector,
    task_eval: &Evaluator<IntermediateTask>,
    variant_eval: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
) -> Result<Vec<(String, String)>, CompileError> {
    let names: Vec<String> = if selector.name == "*" {
        // The literal `*` name is preserved as a schedule-time sentinel
        // rather than resolved against the task cohort, but variant
        // expansion still runs.
        vec!["*".to_string()]
    } else {
        task_eval
            .eval_str(&selector.name)
            .map(|items| items.iter().map(|t| t.name.clone()).collect())?
    };

    let variants = match &selector.variant {
        Some(v) => resolve_variant_selector(v, variant_eval, axes)?,
        None => vec![OWNER_VARIANT.to_string()],
    };

    let mut pairs = Vec::with_capacity(names.len() * variants.len());
    for name in &names {
        for variant in &variants {
            pairs.push((variant.clone(), name.clone()));
        }
    }
    Ok(pairs)
}

/// Translate a task's dependency list into concrete dependencies, detecting
/// conflicting duplicate `(variant, name)` emissions.
fn translate_dependencies(
    deps: &[IntermediateDependency],
    task_eval: &Evaluator<IntermediateTask>,
    variant_eval: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
    owner: &str,
    errors: &mut Vec<CompileError>,
) -> Vec<Dependency> {
    let mut seen: HashMap<(String, String), Dependency> = HashMap::new();
    let mut ordered = Vec::new();

    for dep in deps {
        let pairs = match resolve_pairs(&dep.selector, task_eval, variant_eval, axes) {
            Ok(p) => p,
            Err(e) => {
                errors.push(e.with_context(owner.to_string()));
                continue;
            }
        };
        for (variant, name) in pairs {
            let candidate = Dependency {
                name: name.clone(),
                variant: variant.clone(),
                status: dep.status.clone(),
                patch_optional: dep.patch_optional,
            };
            let key = (variant, name);
            match seen.get(&key) {
                Some(existing) if *existing == candidate => {}
                Some(_) => errors.push(conflict_error(
                    "conflicting definitions of dependency",
                    owner.to_string(),
                )),
                None => {
                    seen.insert(key, candidate.clone());
                    ordered.push(candidate);
                }
            }
        }
    }
    ordered
}

/// Translate a requirement-selector list into concrete requirements.
/// Duplicates are deduplicated, not conflict-checked.
fn translate_requirements(
    reqs: &[TaskSelector],
    task_eval: &Evaluator<IntermediateTask>,
    variant_eval: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
    owner: &str,
    errors: &mut Vec<CompileError>,
) -> Vec<Requirement> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    for req in reqs {
        let pairs = match resolve_pairs(req, task_eval, variant_eval, axes) {
            Ok(p) => p,
            Err(e) => {
                errors.push(e.with_context(owner.to_string()));
                continue;
            }
        };
        for (variant, name) in pairs {
            if seen.insert((variant.clone(), name.clone())) {
                ordered.push(Requirement { name, variant });
            }
        }
    }
    ordered
}

fn translate_task(
    task: &IntermediateTask,
    task_eval: &Evaluator<IntermediateTask>,
    variant_eval: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
    errors: &mut Vec<CompileError>,
) -> ProjectTask {
    ProjectTask {
        name: task.name.clone(),
        priority: task.priority,
        exec_timeout_secs: task.exec_timeout_secs,
        cleanup: task.cleanup,
        commands: task.commands.clone(),
        tags: task.tags.clone(),
        stepback: task.stepback,
        depends_on: translate_dependencies(
            &task.depends_on,
            task_eval,
            variant_eval,
            axes,
            &task.name,
            errors,
        ),
        requires: translate_requirements(
            &task.requires,
            task_eval,
            variant_eval,
            axes,
            &task.name,
            errors,
        ),
    }
}

fn translate_variant_task(
    vt: &IntermediateVariantTask,
    name: String,
    task_eval: &Evaluator<IntermediateTask>,
    variant_eval: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
    owner: &str,
    errors: &mut Vec<CompileError>,
) -> VariantTask {
    VariantTask {
        name,
        patchable: vt.patchable,
        priority: vt.priority,
        exec_timeout_secs: vt.exec_timeout_secs,
        stepback: vt.stepback,
        run_on: vt.distros.values.clone(),
        depends_on: translate_dependencies(&vt.depends_on, task_eval, variant_eval, axes, owner, errors),
        requires: translate_requirements(&vt.requires, task_eval, variant_eval, axes, owner, errors),
    }
}

fn translate_variant(
    variant: &IntermediateBuildVariant,
    task_eval: &Evaluator<IntermediateTask>,
    variant_eval: &Evaluator<IntermediateBuildVariant>,
    axes: &[MatrixAxis],
    errors: &mut Vec<CompileError>,
) -> BuildVariant {
    let mut emitted: HashMap<String, VariantTask> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    let mut emit = |vt: &IntermediateVariantTask, errors: &mut Vec<CompileError>| {
        let names = match task_eval.eval_str(&vt.name) {
            Ok(items) => items.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
            Err(e) => {
                errors.push(e.with_context(variant.name.clone()));
                return;
            }
        };
        for name in names {
            let candidate = translate_variant_task(
                vt,
                name.clone(),
                task_eval,
                variant_eval,
                axes,
                &variant.name,
                errors,
            );
            match emitted.get(&name) {
                Some(existing) if *existing == candidate => {}
                Some(_) => errors.push(conflict_error(
                    format!("conflicting definitions of task '{name}'"),
                    variant.name.clone(),
                )),
                None => {
                    emitted.insert(name.clone(), candidate);
                    order.push(name);
                }
            }
        }
    };

    for vt in &variant.tasks {
        emit(vt, errors);
    }

    for rule in &variant.deferred_rules {
        for vt in &rule.add_tasks {
            emit(vt, errors);
        }
        for remove in &rule.remove_tasks {
            if emitted.remove(remove).is_some() {
                order.retain(|n| n != remove);
            }
        }
    }

    BuildVariant {
        display_name: variant.display_name.clone(),
        name: variant.name.clone(),
        expansions: variant.expansions.clone(),
        modules: variant.modules.clone(),
        disabled: variant.disabled,
        push: variant.push,
        batchtime: variant.batchtime,
        stepback: variant.stepback,
        run_on: variant.run_on.clone(),
        tags: variant.tags.clone(),
        tasks: order.into_iter().filter_map(|n| emitted.remove(&n)).collect(),
    }
}

/// Build the final project from the post-matrix-expansion intermediate
/// project. All errors accumulate; the caller always receives a (possibly
/// partial) project alongside the full error list.
#[tracing::instrument(skip_all)]
pub fn translate(ip: &IntermediateProject) -> (Project, ErrorSink) {
    let mut errors = Vec::new();
    let task_eval = Evaluator::new(&ip.tasks);
    let variant_eval = Evaluator::new(&ip.build_variants);

    let tasks: Vec<ProjectTask> = ip
        .tasks
        .iter()
        .map(|t| translate_task(t, &task_eval, &variant_eval, &ip.axes, &mut errors))
        .collect();

    let build_variants: Vec<BuildVariant> = ip
        .build_variants
        .iter()
        .map(|v| translate_variant(v, &task_eval, &variant_eval, &ip.axes, &mut errors))
        .collect();

    let project = Project {
        identifier: ip.identifier.clone(),
        enabled: ip.enabled,
        stepback: ip.stepback,
        disable_cleanup: ip.disable_cleanup,
        batchtime: ip.batchtime,
        remote_path: ip.remote_path.clone(),
        repokind: ip.repokind.clone(),
        exec_timeout_secs: ip.exec_timeout_secs,
        callback_timeout_secs: ip.callback_timeout_secs,
        modules: ip.modules.clone(),
        tasks,
        build_variants,
    };

    let mut sink = ErrorSink::new();
    sink.extend(errors);
    (project, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Identifier;

    fn task(name: &str, tags: &[&str], deps: Vec<IntermediateDependency>) -> IntermediateTask {
        IntermediateTask {
            name: name.to_string(),
            priority: 0,
            exec_timeout_secs: None,
            cleanup: true,
            depends_on: deps,
            requires: Vec::new(),
            commands: Vec::new(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            stepback: crate::ir::TriState::Unset,
        }
    }

    fn dep(name: &str, variant: Option<VariantSelector>, status: &str) -> IntermediateDependency {
        IntermediateDependency {
            selector: TaskSelector {
                name: name.to_string(),
                variant,
            },
            status: status.to_string(),
            patch_optional: false,
        }
    }

    #[test]
    fn dependency_conflict_matches_scenario_3() {
        let tasks = vec![
            task("t1", &["a", "b"], Vec::new()),
            task("t2", &["a", "c"], Vec::new()),
            task(
                "t3",
                &[],
                vec![dep("t1", None, "*"), dep(".b", None, "")],
            ),
        ];
        let ip = IntermediateProject {
            identifier: Identifier::default(),
            tasks,
            ..IntermediateProject::default()
        };
        let (_project, errors) = translate(&ip);
        assert!(errors.iter().any(|e| e.category() == ErrorCategory::ConflictError));
    }

    #[test]
    fn single_string_dependency_matches_scenario_4() {
        let tasks = vec![
            task("t1", &[], Vec::new()),
            task("t2", &[], vec![dep("t1", None, "")]),
        ];
        let ip = IntermediateProject {
            identifier: Identifier::default(),
            tasks,
            ..IntermediateProject::default()
        };
        let (project, errors) = translate(&ip);
        assert!(errors.is_empty(), "{errors:?}");
        let t2 = project.tasks.iter().find(|t| t.name == "t2").unwrap();
        assert_eq!(t2.depends_on.len(), 1);
        assert_eq!(t2.depends_on[0].name, "t1");
        assert!(!t2.depends_on[0].patch_optional);
    }

    #[test]
    fn star_dependency_name_is_preserved_literally() {
        let tasks = vec![task("t1", &[], vec![dep("*", None, "")])];
        let ip = IntermediateProject {
            identifier: Identifier::default(),
            tasks,
            ..IntermediateProject::default()
        };
        let (project, errors) = translate(&ip);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(project.tasks[0].depends_on[0].name, "*");
    }
}
