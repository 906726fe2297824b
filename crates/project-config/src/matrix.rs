//! Matrix engine (C3): enumerates Cartesian cells of an axis-set matrix,
//! applies exclusion filters, merges axis values into per-cell variants,
//! and applies conditional rules.

use std::collections::{HashMap, HashSet};

use crate::error::{CompileError, ErrorCategory, ErrorSink};
use crate::expand;
use crate::ir::{
    AxisValue, DeferredTaskRule, IntermediateBuildVariant, IntermediateDependency,
    IntermediateProject, IntermediateVariantTask, Matrix, MatrixAxis, MatrixRule, MatrixSpec,
    TriState, VariantSelector,
};
use crate::selector::Evaluator;

fn matrix_error(message: impl Into<String>, context: impl Into<String>) -> CompileError {
    CompileError::new(ErrorCategory::MatrixError, message.into()).with_context(context.into())
}

/// Evaluate a spec's per-axis selector lists into concrete axis-value ids,
/// deduplicated while preserving first-seen order.
///
/// Exposed to the translator (C4), which resolves variant-selector matrix
/// sub-definitions by delegating to this same spec-evaluation and
/// containment logic.
pub(crate) fn evaluate_spec(
    spec: &MatrixSpec,
    axes: &[MatrixAxis],
    matrix_id: &str,
) -> Result<HashMap<String, Vec<String>>, CompileError> {
    let mut resolved = HashMap::with_capacity(spec.len());
    for (axis_id, selectors) in spec {
        let axis = axes.iter().find(|a| &a.id == axis_id).ok_or_else(|| {
            matrix_error(format!("unknown axis '{axis_id}'"), matrix_id.to_string())
        })?;
        let evaluator = Evaluator::new(&axis.values);

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for selector_src in selectors {
            let matches = evaluator
                .eval_str(selector_src)
                .map_err(|e| matrix_error(e.to_string(), format!("{matrix_id}.{axis_id}")))?;
            for value in matches {
                if seen.insert(value.id.clone()) {
                    ids.push(value.id.clone());
                }
            }
        }

        if ids.is_empty() {
            return Err(matrix_error(
                format!("axis '{axis_id}' has no values"),
                matrix_id.to_string(),
            ));
        }
        resolved.insert(axis_id.clone(), ids);
    }
    Ok(resolved)
}

/// Odometer-order enumeration: `axis_order[0]` varies fastest.
fn enumerate_cells(
    axis_order: &[String],
    resolved: &HashMap<String, Vec<String>>,
) -> Vec<HashMap<String, String>> {
    let lens: Vec<usize> = axis_order
        .iter()
        .map(|a| resolved.get(a).map_or(0, Vec::len))
        .collect();
    let total: usize = lens.iter().product();
    if total == 0 {
        return Vec::new();
    }

    let mut strides = vec![1usize; axis_order.len()];
    for i in 1..axis_order.len() {
        strides[i] = strides[i - 1] * lens[i - 1];
    }

    (0..total)
        .map(|i| {
            axis_order
                .iter()
                .enumerate()
                .map(|(idx, axis_id)| {
                    let values = &resolved[axis_id];
                    let value_idx = (i / strides[idx]) % lens[idx];
                    (axis_id.clone(), values[value_idx].clone())
                })
                .collect()
        })
        .collect()
}

/// Containment: for each axis present in `spec`, the cell's value for that
/// axis must appear in the spec's resolved list; axes omitted from `spec`
/// match all.
pub(crate) fn cell_contained_by(
    cell: &HashMap<String, String>,
    resolved_spec: &HashMap<String, Vec<String>>,
) -> bool {
    resolved_spec.iter().all(|(axis_id, ids)| {
        cell.get(axis_id)
            .is_some_and(|value| ids.contains(value))
    })
}

fn update_map(target: &mut HashMap<String, String>, source: &HashMap<String, String>) {
    for (k, v) in source {
        target.insert(k.clone(), v.clone());
    }
}

fn dedup_push(target: &mut Vec<String>, values: &[String]) {
    for v in values {
        if !target.contains(v) {
            target.push(v.clone());
        }
    }
}

/// Merge one axis-value's contribution into the accumulating cell state,
/// expanding its fields against the expansion map built so far. Variables
/// and tags accumulate; run-on, modules, batchtime, and stepback overwrite
/// when the axis value sets them. Shared by the per-axis-value merge (in
/// axis-declaration order) and a matrix rule's `then.set` action, which
/// merges an inline axis-value the same way.
fn merge_axis_value(
    value: &AxisValue,
    expansions: &mut HashMap<String, String>,
    tags: &mut Vec<String>,
    run_on: &mut Vec<String>,
    modules: &mut Vec<String>,
    batchtime: &mut Option<u32>,
    stepback: &mut TriState,
    context: impl Fn() -> String,
) -> Result<(), CompileError> {
    let mut expanded_variables = HashMap::with_capacity(value.variables.len());
    for (k, v) in &value.variables {
        let expanded = expand::expand(v, expansions)
            .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), context()))?;
        expanded_variables.insert(k.clone(), expanded);
    }
    let expanded_tags = expand::expand_all(&value.tags, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), context()))?;
    let expanded_run_on = expand::expand_all(&value.run_on, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), context()))?;
    let expanded_modules = expand::expand_all(&value.modules, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), context()))?;

    update_map(expansions, &expanded_variables);
    dedup_push(tags, &expanded_tags);
    if !expanded_run_on.is_empty() {
        *run_on = expanded_run_on;
    }
    if !expanded_modules.is_empty() {
        *modules = expanded_modules;
    }
    if value.batchtime.is_some() {
        *batchtime = value.batchtime;
    }
    if value.stepback.is_set() {
        *stepback = value.stepback;
    }
    Ok(())
}

fn expand_variant_task(
    task: &IntermediateVariantTask,
    expansions: &HashMap<String, String>,
) -> Result<IntermediateVariantTask, CompileError> {
    let name = expand::expand(&task.name, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), task.name.clone()))?;
    let distro_values = expand::expand_all(&task.distros.values, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), task.name.clone()))?;

    let mut depends_on = Vec::with_capacity(task.depends_on.len());
    for dep in &task.depends_on {
        depends_on.push(expand_dependency(dep, expansions, &task.name)?);
    }

    let mut requires = Vec::with_capacity(task.requires.len());
    for req in &task.requires {
        requires.push(crate::ir::TaskSelector {
            name: expand::expand(&req.name, expansions).map_err(|key| {
                matrix_error(format!("unresolved expansion '${{{key}}}'"), task.name.clone())
            })?,
            variant: req.variant.clone(),
        });
    }

    Ok(IntermediateVariantTask {
        name,
        patchable: task.patchable,
        priority: task.priority,
        depends_on,
        requires,
        exec_timeout_secs: task.exec_timeout_secs,
        stepback: task.stepback,
        distros: crate::ir::DistroList {
            values: distro_values,
        },
    })
}

fn expand_dependency(
    dep: &IntermediateDependency,
    expansions: &HashMap<String, String>,
    owner: &str,
) -> Result<IntermediateDependency, CompileError> {
    let name = expand::expand(&dep.selector.name, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), owner.to_string()))?;
    let status = expand::expand(&dep.status, expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), owner.to_string()))?;
    let variant = match &dep.selector.variant {
        Some(VariantSelector::String(s)) => Some(VariantSelector::String(
            expand::expand(s, expansions).map_err(|key| {
                matrix_error(format!("unresolved expansion '${{{key}}}'"), owner.to_string())
            })?,
        )),
        other => other.clone(),
    };
    Ok(IntermediateDependency {
        selector: crate::ir::TaskSelector {
            name,
            variant,
        },
        status,
        patch_optional: dep.patch_optional,
    })
}

/// Evaluate whether any of a rule's `if` specs matches the given cell.
fn rule_matches(
    rule: &MatrixRule,
    cell: &HashMap<String, String>,
    axes: &[MatrixAxis],
    matrix_id: &str,
) -> Result<bool, CompileError> {
    for spec in &rule.if_specs {
        let resolved = evaluate_spec(spec, axes, matrix_id)?;
        if cell_contained_by(cell, &resolved) {
            return Ok(true);
        }
    }
    Ok(false)
}

struct ExpandedCell {
    variant: IntermediateBuildVariant,
}

fn build_cell_variant(
    matrix: &Matrix,
    axis_order: &[String],
    cell: &HashMap<String, String>,
    axes: &[MatrixAxis],
) -> Result<ExpandedCell, CompileError> {
    let name_suffix = axis_order
        .iter()
        .map(|axis_id| format!("{axis_id}~{}", cell[axis_id]))
        .collect::<Vec<_>>()
        .join("_");
    let name = format!("{}__{name_suffix}", matrix.id);

    let mut expansions: HashMap<String, String> = cell.clone();
    let mut display_expansions: HashMap<String, String> = HashMap::new();
    let mut tags = Vec::new();
    let mut run_on = matrix.run_on.clone();
    let mut modules = matrix.modules.clone();
    let mut batchtime = matrix.batchtime;
    let mut stepback = matrix.stepback;

    for axis_id in axis_order {
        let axis = axes
            .iter()
            .find(|a| &a.id == axis_id)
            .ok_or_else(|| matrix_error(format!("unknown axis '{axis_id}'"), name.clone()))?;
        let value_id = &cell[axis_id];
        let value = axis
            .values
            .iter()
            .find(|v| &v.id == value_id)
            .ok_or_else(|| {
                matrix_error(
                    format!("unknown axis value '{value_id}' for axis '{axis_id}'"),
                    name.clone(),
                )
            })?;

        display_expansions.insert(
            axis_id.clone(),
            value
                .display_name
                .clone()
                .unwrap_or_else(|| value_id.clone()),
        );

        let context = || format!("{name} (axis {axis_id}, value {value_id})");
        merge_axis_value(
            value,
            &mut expansions,
            &mut tags,
            &mut run_on,
            &mut modules,
            &mut batchtime,
            &mut stepback,
            context,
        )?;
    }

    let display_name = expand::expand(&matrix.display_name, &display_expansions)
        .map_err(|key| matrix_error(format!("unresolved display expansion '${{{key}}}'"), name.clone()))?;

    let expanded_matrix_tags = expand::expand_all(&matrix.tags, &expansions)
        .map_err(|key| matrix_error(format!("unresolved expansion '${{{key}}}'"), name.clone()))?;
    let mut final_tags = expanded_matrix_tags;
    dedup_push(&mut final_tags, &tags);

    let mut tasks = Vec::with_capacity(matrix.tasks.len());
    for task in &matrix.tasks {
        tasks.push(expand_variant_task(task, &expansions)?);
    }

    let mut deferred_rules = Vec::new();
    for rule in &matrix.rules {
        if rule_matches(rule, cell, axes, &matrix.id)? {
            let context = || format!("{name} (matrix rule set)");
            merge_axis_value(
                &rule.then_set,
                &mut expansions,
                &mut final_tags,
                &mut run_on,
                &mut modules,
                &mut batchtime,
                &mut stepback,
                context,
            )?;
            if !rule.then_add_tasks.is_empty() || !rule.then_remove_tasks.is_empty() {
                let mut add_tasks = Vec::with_capacity(rule.then_add_tasks.len());
                for task in &rule.then_add_tasks {
                    add_tasks.push(expand_variant_task(task, &expansions)?);
                }
                deferred_rules.push(DeferredTaskRule {
                    add_tasks,
                    remove_tasks: rule.then_remove_tasks.clone(),
                });
            }
        }
    }

    Ok(ExpandedCell {
        variant: IntermediateBuildVariant {
            name,
            display_name,
            expansions,
            tags: final_tags,
            modules,
            disabled: false,
            push: false,
            batchtime,
            stepback,
            run_on,
            tasks,
            deferred_rules,
        },
    })
}

/// Expand every matrix stub in `ip` into synthesized build variants,
/// appended to `ip.build_variants` in matrix declaration order then
/// cell-enumeration order. Returns accumulated non-fatal errors; a matrix
/// that cannot be enumerated at all is skipped entirely, a single bad cell
/// is dropped while the rest of the matrix proceeds.
#[tracing::instrument(skip_all)]
pub fn expand_matrices(ip: &mut IntermediateProject) -> ErrorSink {
    let mut errors = Vec::new();
    let axes = ip.axes.clone();
    let matrices = ip.matrices.clone();

    for matrix in &matrices {
        let axis_order: Vec<String> = axes
            .iter()
            .map(|a| a.id.clone())
            .filter(|id| matrix.spec.contains_key(id))
            .collect();

        if axis_order.len() != matrix.spec.len() {
            errors.push(matrix_error(
                "matrix spec references an axis that is not declared",
                matrix.id.clone(),
            ));
            continue;
        }

        let resolved = match evaluate_spec(&matrix.spec, &axes, &matrix.id) {
            Ok(r) => r,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let cells = enumerate_cells(&axis_order, &resolved);

        let mut resolved_excludes = Vec::with_capacity(matrix.exclude_spec.len());
        let mut exclude_eval_failed = false;
        for exclude in &matrix.exclude_spec {
            match evaluate_spec(exclude, &axes, &matrix.id) {
                Ok(r) => resolved_excludes.push(r),
                Err(e) => {
                    errors.push(e);
                    exclude_eval_failed = true;
                }
            }
        }
        if exclude_eval_failed {
            continue;
        }

        let mut any_excluded = false;
        let mut surviving_cells = Vec::with_capacity(cells.len());
        for cell in cells {
            let excluded = resolved_excludes
                .iter()
                .any(|spec| cell_contained_by(&cell, spec));
            if excluded {
                any_excluded = true;
            } else {
                surviving_cells.push(cell);
            }
        }

        if !matrix.exclude_spec.is_empty() && !any_excluded {
            errors.push(matrix_error(
                "exclude did not exclude anything",
                matrix.id.clone(),
            ));
        }

        if !matrix.exclude_spec.is_empty() && surviving_cells.is_empty() {
            errors.push(matrix_error(
                "exclude matched every cell; no variants produced",
                matrix.id.clone(),
            ));
        }

        for cell in &surviving_cells {
            match build_cell_variant(matrix, &axis_order, cell, &axes) {
                Ok(expanded) => ip.build_variants.push(expanded.variant),
                Err(e) => errors.push(e),
            }
        }
    }

    let mut sink = ErrorSink::new();
    sink.extend(errors);
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AxisValue, Identifier};

    fn axis(id: &str, values: &[(&str, &[&str])]) -> MatrixAxis {
        MatrixAxis {
            id: id.to_string(),
            display_name: id.to_string(),
            values: values
                .iter()
                .map(|(vid, tags)| AxisValue {
                    id: (*vid).to_string(),
                    tags: tags.iter().map(|t| (*t).to_string()).collect(),
                    ..AxisValue::default()
                })
                .collect(),
        }
    }

    fn spec(entries: &[(&str, &[&str])]) -> MatrixSpec {
        entries
            .iter()
            .map(|(k, v)| {
                (
                    (*k).to_string(),
                    v.iter().map(|s| (*s).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn matrix_expansion_matches_scenario_5() {
        let mut ip = IntermediateProject {
            identifier: Identifier::default(),
            axes: vec![
                axis("os", &[("ubuntu", &["linux"]), ("rhel", &["linux"])]),
                axis("bits", &[("32", &[]), ("64", &[])]),
            ],
            matrices: vec![Matrix {
                id: "matrix".to_string(),
                spec: spec(&[("os", &[".linux"]), ("bits", &["32", "64"])]),
                exclude_spec: vec![spec(&[("os", &["ubuntu"]), ("bits", &["32"])])],
                ..Matrix::default()
            }],
            ..IntermediateProject::default()
        };

        let errors = expand_matrices(&mut ip);
        assert!(errors.is_empty(), "{errors:?}");

        let mut names: Vec<&str> = ip.build_variants.iter().map(|v| v.name.as_str()).collect();
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

    #[test]
    fn axis_value_merge_matches_scenario_6() {
        let mut ubuntu = AxisValue {
            id: "ubuntu".to_string(),
            tags: vec!["linux".to_string()],
            run_on: vec!["ubuntu_small".to_string()],
            ..AxisValue::default()
        };
        ubuntu
            .variables
            .insert("user".to_string(), "root".to_string());
        let bits64 = AxisValue {
            id: "64".to_string(),
            run_on: vec!["big".to_string()],
            ..AxisValue::default()
        };

        let mut ip = IntermediateProject {
            axes: vec![
                MatrixAxis {
                    id: "os".to_string(),
                    display_name: "os".to_string(),
                    values: vec![ubuntu],
                },
                MatrixAxis {
                    id: "bits".to_string(),
                    display_name: "bits".to_string(),
                    values: vec![bits64],
                },
            ],
            matrices: vec![Matrix {
                id: "matrix".to_string(),
                spec: spec(&[("os", &["ubuntu"]), ("bits", &["64"])]),
                ..Matrix::default()
            }],
            ..IntermediateProject::default()
        };

        let errors = expand_matrices(&mut ip);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(ip.build_variants.len(), 1);
        let variant = &ip.build_variants[0];
        assert_eq!(variant.run_on, vec!["big".to_string()]);
        assert!(variant.tags.contains(&"linux".to_string()));
        assert_eq!(variant.expansions.get("user"), Some(&"root".to_string()));
        assert_eq!(variant.expansions.get("os"), Some(&"ubuntu".to_string()));
        assert_eq!(variant.expansions.get("bits"), Some(&"64".to_string()));
    }

    #[test]
    fn empty_axis_value_list_is_an_error() {
        let mut ip = IntermediateProject {
            axes: vec![axis("a", &[])],
            matrices: vec![Matrix {
                id: "m".to_string(),
                spec: spec(&[("a", &["*"])]),
                ..Matrix::default()
            }],
            ..IntermediateProject::default()
        };
        let errors = expand_matrices(&mut ip);
        assert!(!errors.is_empty());
        assert!(ip.build_variants.is_empty());
    }

    #[test]
    fn exclude_matching_every_cell_drops_all_variants_and_errors() {
        let mut ip = IntermediateProject {
            axes: vec![axis("os", &[("ubuntu", &[])])],
            matrices: vec![Matrix {
                id: "m".to_string(),
                spec: spec(&[("os", &["*"])]),
                exclude_spec: vec![spec(&[("os", &["ubuntu"])])],
                ..Matrix::default()
            }],
            ..IntermediateProject::default()
        };
        let errors = expand_matrices(&mut ip);
        assert!(ip.build_variants.is_empty());
        assert!(!errors.is_empty());
    }
}
