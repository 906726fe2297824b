//! Intermediate project (IP) data model: the decoded-but-not-yet-expanded
//! form produced by the surface decoder (C1) and mutated only by the matrix
//! engine (C3) before the translator (C4) reads it.

use std::collections::HashMap;

/// Caller-supplied identifier, copied verbatim into the final project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch name.
    pub branch: String,
    /// Human-facing display name.
    pub display_name: String,
}

/// A tri-state override: not specified, explicitly enabled, or explicitly
/// disabled. Distinguishes "inherit the parent's value" from "set to false".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// No explicit value; the owner inherits a default from its parent.
    #[default]
    Unset,
    /// Explicitly set to true.
    True,
    /// Explicitly set to false.
    False,
}

impl TriState {
    /// Convert from an optional bool, where `None` means `Unset`.
    #[must_use]
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            None => Self::Unset,
            Some(true) => Self::True,
            Some(false) => Self::False,
        }
    }

    /// True if an explicit value was set.
    #[must_use]
    pub fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// The explicit value, or `default` if unset.
    #[must_use]
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Self::Unset => default,
            Self::True => true,
            Self::False => false,
        }
    }
}

/// A task selector: a name (itself possibly a selector expression)
/// plus an optional variant selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelector {
    /// The task-name selector expression.
    pub name: String,
    /// The optional variant selector restricting which variant(s) this
    /// selector applies within.
    pub variant: Option<VariantSelector>,
}

/// A variant selector is a tagged union: either a selector-expression
/// string, or an inline matrix sub-definition (axis id -> value selectors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantSelector {
    /// A selector expression string.
    String(String),
    /// A matrix sub-definition: axis id -> list of axis-value selector
    /// strings, resolved by delegating to the matrix engine's cell-matching
    /// logic.
    Matrix(HashMap<String, Vec<String>>),
}

/// An embedded dependency: task selector, status, and patch-optional flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateDependency {
    /// The selector naming the depended-upon task(s)/variant(s).
    pub selector: TaskSelector,
    /// The required status string (e.g. `"success"`, `"*"`).
    pub status: String,
    /// Whether this dependency is optional during patch builds.
    pub patch_optional: bool,
}

/// A single intermediate task.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateTask {
    /// Task name.
    pub name: String,
    /// Scheduling priority.
    pub priority: i64,
    /// Execution timeout override, in seconds.
    pub exec_timeout_secs: Option<u64>,
    /// Whether this task wants its working directory cleaned up after run.
    pub cleanup: bool,
    /// Dependencies on other tasks.
    pub depends_on: Vec<IntermediateDependency>,
    /// Requirement selectors (`requires`).
    pub requires: Vec<TaskSelector>,
    /// Opaque command list (commands are not interpreted by the compiler).
    pub commands: Vec<serde_yaml::Value>,
    /// Tags used by tag selectors.
    pub tags: Vec<String>,
    /// Tri-state stepback override.
    pub stepback: TriState,
}

/// A distro-list field accepting either `run_on` or `distros` as a
/// synonym; specifying both is a validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistroList {
    /// Values from whichever of `run_on`/`distros` was supplied.
    pub values: Vec<String>,
}

/// One entry in a build variant's task list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntermediateVariantTask {
    /// The task-selector expression (name, possibly with modifiers).
    pub name: String,
    /// Tri-state patchable override.
    pub patchable: TriState,
    /// Scheduling priority override.
    pub priority: Option<i64>,
    /// Dependency overrides for this variant-task.
    pub depends_on: Vec<IntermediateDependency>,
    /// Requirement selectors for this variant-task.
    pub requires: Vec<TaskSelector>,
    /// Execution timeout override, in seconds.
    pub exec_timeout_secs: Option<u64>,
    /// Tri-state stepback override.
    pub stepback: TriState,
    /// Distro list (from `run_on` or `distros`).
    pub distros: DistroList,
}

/// A deferred rule action to apply during translation: a
/// matrix rule whose `then` named `add_tasks`/`remove_tasks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTaskRule {
    /// Task names to append (already selector-resolved at apply time).
    pub add_tasks: Vec<IntermediateVariantTask>,
    /// Task names to drop from the emitted list.
    pub remove_tasks: Vec<String>,
}

/// A regular (non-matrix-stub) intermediate build variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntermediateBuildVariant {
    /// Variant name (unique key).
    pub name: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Expansion map (string -> string) available to this variant's tasks.
    pub expansions: HashMap<String, String>,
    /// Tags used by variant selectors.
    pub tags: Vec<String>,
    /// Enabled modules.
    pub modules: Vec<String>,
    /// Whether this variant is disabled.
    pub disabled: bool,
    /// Whether this variant participates in push triggers.
    pub push: bool,
    /// Batch-time override, in minutes.
    pub batchtime: Option<u32>,
    /// Tri-state stepback override.
    pub stepback: TriState,
    /// Hosts/distros this variant runs on.
    pub run_on: Vec<String>,
    /// The variant's task list.
    pub tasks: Vec<IntermediateVariantTask>,
    /// Deferred matrix rule actions to apply during translation, if this
    /// variant was synthesized by the matrix engine.
    pub deferred_rules: Vec<DeferredTaskRule>,
}

/// One value of a matrix axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisValue {
    /// Value id, unique within its axis.
    pub id: String,
    /// Human-facing display name (falls back to `id`).
    pub display_name: Option<String>,
    /// Variables/expansions contributed by this value.
    pub variables: HashMap<String, String>,
    /// Hosts/distros contributed by this value (overwrites on merge).
    pub run_on: Vec<String>,
    /// Tags contributed by this value (accumulates on merge).
    pub tags: Vec<String>,
    /// Modules contributed by this value (overwrites on merge).
    pub modules: Vec<String>,
    /// Batch-time override contributed by this value.
    pub batchtime: Option<u32>,
    /// Stepback override contributed by this value.
    pub stepback: TriState,
}

/// A named matrix dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatrixAxis {
    /// Axis id, unique within the project.
    pub id: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Ordered list of values; order determines cell-name construction and
    /// odometer enumeration order.
    pub values: Vec<AxisValue>,
}

/// A spec is a mapping from axis id to a list of axis-value selector
/// strings (`*`, a tag, a negation, or a literal id).
pub type MatrixSpec = HashMap<String, Vec<String>>;

/// A conditional rule inside a matrix: `if` (a list of specs, any of which
/// matching triggers `then`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatrixRule {
    /// Specs; if any matches the current cell, `then` applies.
    pub if_specs: Vec<MatrixSpec>,
    /// Inline axis-value to merge into the cell via `set`. Carries the same
    /// fields a declared axis value does (variables, tags, run-on, modules,
    /// batch-time, stepback) and is merged with the same overwrite/accumulate
    /// rules.
    pub then_set: AxisValue,
    /// Task names to add (as variant-task stubs) when the rule matches.
    pub then_add_tasks: Vec<IntermediateVariantTask>,
    /// Task names to remove when the rule matches.
    pub then_remove_tasks: Vec<String>,
}

/// A matrix stub: sieved out of the build-variant list during decoding,
/// consumed by the matrix engine (C3), never appears in the final project
/// directly; it only contributes synthesized variants.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    /// Matrix id (used as the synthesized-variant name prefix).
    pub id: String,
    /// Axis id -> list of axis-value selectors.
    pub spec: MatrixSpec,
    /// Exclude specs; a cell contained by any of these is dropped.
    pub exclude_spec: Vec<MatrixSpec>,
    /// Display-name template, expanded per cell using display expansions.
    pub display_name: String,
    /// Matrix-level tags (subject to expansion, then appended per cell).
    pub tags: Vec<String>,
    /// Matrix-level modules.
    pub modules: Vec<String>,
    /// Matrix-level batch-time.
    pub batchtime: Option<u32>,
    /// Matrix-level stepback.
    pub stepback: TriState,
    /// Matrix-level run-on.
    pub run_on: Vec<String>,
    /// Matrix-level task list (expanded per cell via the accumulated
    /// expansion map).
    pub tasks: Vec<IntermediateVariantTask>,
    /// Conditional per-cell rules.
    pub rules: Vec<MatrixRule>,
}

/// The decoded-but-unexpanded project.
#[derive(Debug, Clone, Default)]
pub struct IntermediateProject {
    /// Caller-supplied identifier.
    pub identifier: Identifier,
    /// Whether the project is enabled.
    pub enabled: bool,
    /// Project-level tri-state stepback default.
    pub stepback: TriState,
    /// Whether cleanup is disabled by default.
    pub disable_cleanup: bool,
    /// Default batch time, in minutes.
    pub batchtime: Option<u32>,
    /// Remote checkout path.
    pub remote_path: String,
    /// Repository kind (e.g. `"github"`).
    pub repokind: String,
    /// Default execution timeout, in seconds.
    pub exec_timeout_secs: Option<u64>,
    /// Default callback timeout, in seconds.
    pub callback_timeout_secs: Option<u64>,
    /// Lifecycle pre-command block (opaque).
    pub pre: Option<serde_yaml::Value>,
    /// Lifecycle post-command block (opaque).
    pub post: Option<serde_yaml::Value>,
    /// Lifecycle timeout-command block (opaque).
    pub timeout: Option<serde_yaml::Value>,
    /// Enabled modules.
    pub modules: Vec<String>,
    /// Function name -> command block mapping (opaque).
    pub functions: HashMap<String, serde_yaml::Value>,
    /// Command-type default.
    pub command_type: Option<String>,
    /// Glob ignore patterns.
    pub ignore: Vec<String>,
    /// Decoded tasks.
    pub tasks: Vec<IntermediateTask>,
    /// Decoded regular build variants (matrix-synthesized variants are
    /// appended here by C3 before C4 runs).
    pub build_variants: Vec<IntermediateBuildVariant>,
    /// Matrix stubs sieved out of `buildvariants` during decoding.
    pub matrices: Vec<Matrix>,
    /// Matrix axis declarations.
    pub axes: Vec<MatrixAxis>,
}

impl IntermediateProject {
    /// Look up an axis by id.
    #[must_use]
    pub fn axis(&self, id: &str) -> Option<&MatrixAxis> {
        self.axes.iter().find(|a| a.id == id)
    }
}

impl crate::selector::Cohort for IntermediateTask {
    fn selector_name(&self) -> &str {
        &self.name
    }
    fn selector_tags(&self) -> &[String] {
        &self.tags
    }
}

impl crate::selector::Cohort for IntermediateBuildVariant {
    fn selector_name(&self) -> &str {
        &self.name
    }
    fn selector_tags(&self) -> &[String] {
        &self.tags
    }
}

impl crate::selector::Cohort for AxisValue {
    fn selector_name(&self) -> &str {
        &self.id
    }
    fn selector_tags(&self) -> &[String] {
        &self.tags
    }
}
