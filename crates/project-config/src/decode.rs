//! Surface decoder (C1): reads YAML bytes into the intermediate project,
//! honoring polymorphic shapes (scalar / object / list) on every field that
//! permits them.
//!
//! The only fatal failure is a YAML syntax error; every shape-mismatch and
//! well-formedness problem after that accumulates into the returned error
//! list, so the whole document is first parsed into a generic
//! [`serde_yaml::Value`] tree and individual fields are extracted by
//! inspecting the node kind directly (the "custom YAML reader" approach).

use std::collections::HashMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{CompileError, ErrorCategory, ErrorSink, YamlError};
use crate::ir::{
    AxisValue, DistroList, IntermediateBuildVariant, IntermediateDependency, IntermediateProject,
    IntermediateTask, IntermediateVariantTask, Matrix, MatrixAxis, MatrixRule, TaskSelector,
    TriState, VariantSelector,
};

fn shape_error(field: &str) -> CompileError {
    CompileError::new(
        ErrorCategory::ShapeError,
        format!("field '{field}' did not match any accepted shape"),
    )
}

fn validation_error(message: impl Into<String>, context: impl Into<String>) -> CompileError {
    CompileError::new(ErrorCategory::ValidationError, message.into()).with_context(context.into())
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(Value::String(key.to_string()))
}

fn typed<T: for<'de> Deserialize<'de>>(value: &Value, field: &str) -> Result<T, CompileError> {
    serde_yaml::from_value(value.clone()).map_err(|_| shape_error(field))
}

fn typed_opt<T: for<'de> Deserialize<'de>>(
    map: &Mapping,
    field: &str,
) -> Result<Option<T>, CompileError> {
    match get(map, field) {
        Some(v) if !v.is_null() => typed::<T>(v, field).map(Some),
        _ => Ok(None),
    }
}

/// *string slice* shape: bare string -> one-element list; list of strings.
fn as_string_slice(value: &Value, field: &str) -> Result<Vec<String>, CompileError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| shape_error(field))
            })
            .collect(),
        _ => Err(shape_error(field)),
    }
}

fn string_slice_field(map: &Mapping, field: &str) -> Result<Vec<String>, CompileError> {
    match get(map, field) {
        Some(v) if !v.is_null() => as_string_slice(v, field),
        _ => Ok(Vec::new()),
    }
}

/// *variant selector* shape: bare non-empty string; non-empty matrix
/// sub-definition (mapping axis -> list of axis-value selector strings).
fn as_variant_selector(value: &Value) -> Result<VariantSelector, CompileError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(VariantSelector::String(s.clone())),
        Value::Mapping(m) if !m.is_empty() => {
            let mut spec = HashMap::with_capacity(m.len());
            for (k, v) in m {
                let axis = k
                    .as_str()
                    .ok_or_else(|| shape_error("variant selector"))?
                    .to_string();
                let values = as_string_slice(v, "variant selector")?;
                spec.insert(axis, values);
            }
            Ok(VariantSelector::Matrix(spec))
        }
        _ => Err(shape_error("variant selector")),
    }
}

#[derive(Deserialize)]
struct TaskSelectorObj {
    name: String,
    #[serde(default)]
    variant: Option<Value>,
}

/// *task selector* shape: bare name string (non-empty); object
/// `{name, variant?}` where name is required.
fn as_task_selector(value: &Value) -> Result<TaskSelector, CompileError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(TaskSelector {
            name: s.clone(),
            variant: None,
        }),
        Value::Mapping(_) => {
            let obj: TaskSelectorObj = typed(value, "task selector")?;
            if obj.name.is_empty() {
                return Err(shape_error("task selector"));
            }
            let variant = obj.variant.as_ref().map(as_variant_selector).transpose()?;
            Ok(TaskSelector {
                name: obj.name,
                variant,
            })
        }
        _ => Err(shape_error("task selector")),
    }
}

/// *task-selector list* shape: single selector; list of selectors.
fn as_task_selector_list(value: &Value) -> Result<Vec<TaskSelector>, CompileError> {
    match value {
        Value::Sequence(seq) => seq.iter().map(as_task_selector).collect(),
        _ => Ok(vec![as_task_selector(value)?]),
    }
}

fn task_selector_list_field(map: &Mapping, field: &str) -> Result<Vec<TaskSelector>, CompileError> {
    match get(map, field) {
        Some(v) if !v.is_null() => as_task_selector_list(v),
        _ => Ok(Vec::new()),
    }
}

#[derive(Deserialize)]
struct DependencyObj {
    name: String,
    #[serde(default)]
    variant: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    patch_optional: Option<bool>,
}

/// *dependency* shape: bare name string; object
/// `{name, variant?, status?, patch_optional?}`.
fn as_dependency(value: &Value) -> Result<IntermediateDependency, CompileError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(IntermediateDependency {
            selector: TaskSelector {
                name: s.clone(),
                variant: None,
            },
            status: String::new(),
            patch_optional: false,
        }),
        Value::Mapping(_) => {
            let obj: DependencyObj = typed(value, "dependency")?;
            let variant = obj.variant.as_ref().map(as_variant_selector).transpose()?;
            Ok(IntermediateDependency {
                selector: TaskSelector {
                    name: obj.name,
                    variant,
                },
                status: obj.status.unwrap_or_default(),
                patch_optional: obj.patch_optional.unwrap_or(false),
            })
        }
        _ => Err(shape_error("dependency")),
    }
}

/// *dependency list* shape: single dependency object; list of dependency
/// objects.
fn as_dependency_list(value: &Value) -> Result<Vec<IntermediateDependency>, CompileError> {
    match value {
        Value::Sequence(seq) => seq.iter().map(as_dependency).collect(),
        _ => Ok(vec![as_dependency(value)?]),
    }
}

fn dependency_list_field(
    map: &Mapping,
    field: &str,
) -> Result<Vec<IntermediateDependency>, CompileError> {
    match get(map, field) {
        Some(v) if !v.is_null() => as_dependency_list(v),
        _ => Ok(Vec::new()),
    }
}

#[derive(Deserialize)]
struct VariantTaskObj {
    name: String,
    #[serde(default)]
    patchable: Option<bool>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    depends_on: Option<Value>,
    #[serde(default)]
    requires: Option<Value>,
    #[serde(default)]
    exec_timeout_secs: Option<u64>,
    #[serde(default)]
    stepback: Option<bool>,
    #[serde(default)]
    run_on: Option<Value>,
    #[serde(default)]
    distros: Option<Value>,
}

/// *variant-task* shape: bare name string; object (name required). A
/// variant-task specifying both `run_on` and `distros` is a hard error.
fn as_variant_task(value: &Value) -> Result<IntermediateVariantTask, CompileError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(IntermediateVariantTask {
            name: s.clone(),
            ..IntermediateVariantTask::default()
        }),
        Value::Mapping(_) => {
            let obj: VariantTaskObj = typed(value, "variant task")?;
            if obj.run_on.is_some() && obj.distros.is_some() {
                return Err(validation_error(
                    "run_on and distros are mutually exclusive",
                    obj.name,
                ));
            }
            let distro_values = match obj.run_on.or(obj.distros) {
                Some(v) => as_string_slice(&v, "variant task distros")?,
                None => Vec::new(),
            };
            Ok(IntermediateVariantTask {
                name: obj.name,
                patchable: TriState::from_option(obj.patchable),
                priority: obj.priority,
                depends_on: obj
                    .depends_on
                    .map(|v| as_dependency_list(&v))
                    .transpose()?
                    .unwrap_or_default(),
                requires: obj
                    .requires
                    .map(|v| as_task_selector_list(&v))
                    .transpose()?
                    .unwrap_or_default(),
                exec_timeout_secs: obj.exec_timeout_secs,
                stepback: TriState::from_option(obj.stepback),
                distros: DistroList {
                    values: distro_values,
                },
            })
        }
        _ => Err(shape_error("variant task")),
    }
}

/// *variant-task list* shape: single variant-task; list thereof.
fn as_variant_task_list(value: &Value) -> Result<Vec<IntermediateVariantTask>, CompileError> {
    match value {
        Value::Sequence(seq) => seq.iter().map(as_variant_task).collect(),
        _ => Ok(vec![as_variant_task(value)?]),
    }
}

fn variant_task_list_field(
    map: &Mapping,
    field: &str,
) -> Result<Vec<IntermediateVariantTask>, CompileError> {
    match get(map, field) {
        Some(v) if !v.is_null() => as_variant_task_list(v),
        _ => Ok(Vec::new()),
    }
}

fn matrix_spec_field(
    map: &Mapping,
    field: &str,
) -> Result<HashMap<String, Vec<String>>, CompileError> {
    let Some(v) = get(map, field) else {
        return Ok(HashMap::new());
    };
    let Value::Mapping(m) = v else {
        return Err(shape_error(field));
    };
    let mut spec = HashMap::with_capacity(m.len());
    for (k, val) in m {
        let axis = k.as_str().ok_or_else(|| shape_error(field))?.to_string();
        spec.insert(axis, as_string_slice(val, field)?);
    }
    Ok(spec)
}

fn matrix_spec_list_field(
    map: &Mapping,
    field: &str,
) -> Result<Vec<HashMap<String, Vec<String>>>, CompileError> {
    let Some(v) = get(map, field) else {
        return Ok(Vec::new());
    };
    let Value::Sequence(seq) = v else {
        return Err(shape_error(field));
    };
    seq.iter()
        .map(|entry| {
            let Value::Mapping(m) = entry else {
                return Err(shape_error(field));
            };
            let mut spec = HashMap::with_capacity(m.len());
            for (k, val) in m {
                let axis = k.as_str().ok_or_else(|| shape_error(field))?.to_string();
                spec.insert(axis, as_string_slice(val, field)?);
            }
            Ok(spec)
        })
        .collect()
}

#[derive(Deserialize)]
struct RawAxisValue {
    id: String,
    display_name: Option<String>,
    #[serde(default)]
    variables: Option<HashMap<String, String>>,
}

fn as_axis_value(value: &Value) -> Result<AxisValue, CompileError> {
    let Value::Mapping(map) = value else {
        return Err(shape_error("axis value"));
    };
    let obj: RawAxisValue = typed(value, "axis value")?;
    Ok(AxisValue {
        id: obj.id,
        display_name: obj.display_name,
        variables: obj.variables.unwrap_or_default(),
        run_on: string_slice_field(map, "run_on")?,
        tags: string_slice_field(map, "tags")?,
        modules: string_slice_field(map, "modules")?,
        batchtime: typed_opt(map, "batchtime")?,
        stepback: TriState::from_option(typed_opt(map, "stepback")?),
    })
}

#[derive(Deserialize, Default)]
struct RawRuleSet {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    variables: Option<HashMap<String, String>>,
}

/// A matrix rule's `then.set` carries the same shape as a declared axis
/// value (variables, tags, run_on, modules, batchtime, stepback), minus the
/// required `id` an axis value normally has.
fn as_rule_set(value: &Value) -> Result<AxisValue, CompileError> {
    let Value::Mapping(map) = value else {
        return Err(shape_error("rule.then.set"));
    };
    let obj: RawRuleSet = typed(value, "rule.then.set")?;
    Ok(AxisValue {
        id: obj.id.unwrap_or_default(),
        display_name: obj.display_name,
        variables: obj.variables.unwrap_or_default(),
        run_on: string_slice_field(map, "run_on")?,
        tags: string_slice_field(map, "tags")?,
        modules: string_slice_field(map, "modules")?,
        batchtime: typed_opt(map, "batchtime")?,
        stepback: TriState::from_option(typed_opt(map, "stepback")?),
    })
}

fn as_axis(value: &Value) -> Result<MatrixAxis, CompileError> {
    let Value::Mapping(map) = value else {
        return Err(shape_error("axis"));
    };
    let id: String = typed_opt(map, "id")?.ok_or_else(|| shape_error("axis"))?;
    let display_name = typed_opt::<String>(map, "display_name")?.unwrap_or_else(|| id.clone());
    let Some(Value::Sequence(raw_values)) = get(map, "values") else {
        return Err(shape_error("axis.values"));
    };
    let values = raw_values
        .iter()
        .map(as_axis_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MatrixAxis {
        id,
        display_name,
        values,
    })
}

fn as_matrix_rule(value: &Value) -> Result<MatrixRule, CompileError> {
    let Value::Mapping(map) = value else {
        return Err(shape_error("rule"));
    };
    let if_specs = matrix_spec_list_field(map, "if")?;

    let Some(Value::Mapping(then_map)) = get(map, "then") else {
        return Err(shape_error("rule.then"));
    };
    let then_set = match get(then_map, "set") {
        Some(v) if !v.is_null() => as_rule_set(v)?,
        _ => AxisValue::default(),
    };
    let then_add_tasks = variant_task_list_field(then_map, "add_tasks")?;
    let then_remove_tasks = string_slice_field(then_map, "remove_tasks")?;

    Ok(MatrixRule {
        if_specs,
        then_set,
        then_add_tasks,
        then_remove_tasks,
    })
}

fn as_task(value: &Value) -> Result<IntermediateTask, CompileError> {
    let Value::Mapping(map) = value else {
        return Err(shape_error("task"));
    };
    let name: String = typed_opt(map, "name")?.ok_or_else(|| shape_error("task"))?;
    let commands: Vec<Value> = typed_opt(map, "commands")?.unwrap_or_default();
    Ok(IntermediateTask {
        priority: typed_opt(map, "priority")?.unwrap_or(0),
        exec_timeout_secs: typed_opt(map, "exec_timeout_secs")?,
        cleanup: typed_opt(map, "cleanup")?.unwrap_or(true),
        depends_on: dependency_list_field(map, "depends_on")?,
        requires: task_selector_list_field(map, "requires")?,
        commands,
        tags: string_slice_field(map, "tags")?,
        stepback: TriState::from_option(typed_opt(map, "stepback")?),
        name,
    })
}

fn as_regular_variant(map: &Mapping) -> Result<IntermediateBuildVariant, CompileError> {
    let name: String = typed_opt(map, "name")?.ok_or_else(|| shape_error("build variant"))?;
    Ok(IntermediateBuildVariant {
        display_name: typed_opt::<String>(map, "display_name")?.unwrap_or_else(|| name.clone()),
        expansions: typed_opt(map, "expansions")?.unwrap_or_default(),
        tags: string_slice_field(map, "tags")?,
        modules: string_slice_field(map, "modules")?,
        disabled: typed_opt(map, "disabled")?.unwrap_or(false),
        push: typed_opt(map, "push")?.unwrap_or(false),
        batchtime: typed_opt(map, "batchtime")?,
        stepback: TriState::from_option(typed_opt(map, "stepback")?),
        run_on: string_slice_field(map, "run_on")?,
        tasks: variant_task_list_field(map, "tasks")?,
        deferred_rules: Vec::new(),
        name,
    })
}

fn as_matrix_stub(map: &Mapping) -> Result<Matrix, CompileError> {
    let id: String = typed_opt(map, "matrix_name")?.ok_or_else(|| shape_error("matrix"))?;
    let spec = matrix_spec_field(map, "matrix_spec")?;
    if spec.is_empty() {
        return Err(shape_error("matrix_spec"));
    }
    let rules: Vec<Value> = typed_opt(map, "rules")?.unwrap_or_default();
    let rules = rules
        .iter()
        .map(as_matrix_rule)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Matrix {
        spec,
        exclude_spec: matrix_spec_list_field(map, "exclude_spec")?,
        display_name: typed_opt(map, "display_name")?.unwrap_or_default(),
        tags: string_slice_field(map, "tags")?,
        modules: string_slice_field(map, "modules")?,
        batchtime: typed_opt(map, "batchtime")?,
        stepback: TriState::from_option(typed_opt(map, "stepback")?),
        run_on: string_slice_field(map, "run_on")?,
        tasks: variant_task_list_field(map, "tasks")?,
        rules,
        id,
    })
}

/// Decode a YAML document into an [`IntermediateProject`] plus accumulated
/// non-fatal errors. A YAML syntax error aborts early with the parser's
/// diagnostic.
///
/// # Errors
///
/// Returns [`YamlError`] only when `bytes` is not well-formed YAML.
#[tracing::instrument(skip_all)]
pub fn decode(bytes: &[u8]) -> Result<(IntermediateProject, ErrorSink), YamlError> {
    let doc: Value = serde_yaml::from_slice(bytes).map_err(YamlError)?;
    let mut errors = Vec::new();

    let Value::Mapping(map) = &doc else {
        errors.push(CompileError::new(
            ErrorCategory::ShapeError,
            "top-level document must be a mapping",
        ));
        let mut sink = ErrorSink::new();
        sink.extend(errors);
        return Ok((IntermediateProject::default(), sink));
    };

    let mut ip = IntermediateProject {
        enabled: opt_field(map, "enabled", &mut errors).unwrap_or(true),
        stepback: TriState::from_option(opt_field(map, "stepback", &mut errors)),
        disable_cleanup: opt_field(map, "disable_cleanup", &mut errors).unwrap_or(false),
        batchtime: opt_field(map, "batchtime", &mut errors),
        remote_path: opt_field(map, "remote_path", &mut errors).unwrap_or_default(),
        repokind: opt_field(map, "repokind", &mut errors).unwrap_or_default(),
        exec_timeout_secs: opt_field(map, "exec_timeout_secs", &mut errors),
        callback_timeout_secs: opt_field(map, "callback_timeout_secs", &mut errors),
        pre: get(map, "pre").cloned(),
        post: get(map, "post").cloned(),
        timeout: get(map, "timeout").cloned(),
        command_type: opt_field(map, "command_type", &mut errors),
        ..IntermediateProject::default()
    };

    // owner/repo/branch/display_name are decoded here for completeness, but
    // `compile`'s caller-supplied `Identifier` parameter is authoritative on
    // the final project.
    ip.identifier.owner = opt_field(map, "owner", &mut errors).unwrap_or_default();
    ip.identifier.repo = opt_field(map, "repo", &mut errors).unwrap_or_default();
    ip.identifier.branch = opt_field(map, "branch", &mut errors).unwrap_or_default();
    ip.identifier.display_name = opt_field(map, "display_name", &mut errors).unwrap_or_default();

    match string_slice_field(map, "modules") {
        Ok(v) => ip.modules = v,
        Err(e) => errors.push(e),
    }
    match string_slice_field(map, "ignore") {
        Ok(v) => ip.ignore = v,
        Err(e) => errors.push(e),
    }

    if let Some(Value::Mapping(functions)) = get(map, "functions") {
        for (k, v) in functions {
            if let Some(name) = k.as_str() {
                ip.functions.insert(name.to_string(), v.clone());
            } else {
                errors.push(shape_error("functions"));
            }
        }
    } else if get(map, "functions").is_some_and(|v| !v.is_null()) {
        errors.push(shape_error("functions"));
    }

    if let Some(Value::Sequence(tasks)) = get(map, "tasks") {
        for raw in tasks {
            match as_task(raw) {
                Ok(t) => ip.tasks.push(t),
                Err(e) => errors.push(e),
            }
        }
    } else if get(map, "tasks").is_some_and(|v| !v.is_null()) {
        errors.push(shape_error("tasks"));
    }

    if let Some(Value::Sequence(axes)) = get(map, "axes") {
        for raw in axes {
            match as_axis(raw) {
                Ok(a) => ip.axes.push(a),
                Err(e) => errors.push(e),
            }
        }
    } else if get(map, "axes").is_some_and(|v| !v.is_null()) {
        errors.push(shape_error("axes"));
    }

    // Sieve step: each buildvariants entry is either a matrix stub
    // (`matrix_name` present) or a regular variant (`name` present).
    if let Some(Value::Sequence(entries)) = get(map, "buildvariants") {
        for raw in entries {
            let Value::Mapping(entry_map) = raw else {
                errors.push(shape_error("buildvariants"));
                continue;
            };
            let has_matrix_name = get(entry_map, "matrix_name").is_some();
            let has_name = get(entry_map, "name").is_some();
            if has_matrix_name {
                match as_matrix_stub(entry_map) {
                    Ok(m) => ip.matrices.push(m),
                    Err(e) => errors.push(e),
                }
            } else if has_name {
                match as_regular_variant(entry_map) {
                    Ok(v) => ip.build_variants.push(v),
                    Err(e) => errors.push(e),
                }
            } else {
                errors.push(shape_error("buildvariants"));
            }
        }
    } else if get(map, "buildvariants").is_some_and(|v| !v.is_null()) {
        errors.push(shape_error("buildvariants"));
    }

    let mut sink = ErrorSink::new();
    sink.extend(errors);
    Ok((ip, sink))
}

fn opt_field<T: for<'de> Deserialize<'de>>(
    map: &Mapping,
    field: &str,
    errors: &mut Vec<CompileError>,
) -> Option<T> {
    match typed_opt::<T>(map, field) {
        Ok(v) => v,
        Err(e) => {
            errors.push(e);
            None
        }
    }
}
