//! Final project data model: produced once by the translator (C4) and
//! never mutated afterward.

use crate::ir::{Identifier, TriState};
use std::collections::HashMap;

/// A concrete dependency: every selector has been resolved to a literal
/// name and variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Literal task name, or `"*"`, a schedule-time sentinel preserved
    /// literally rather than resolved against the task cohort.
    pub name: String,
    /// Literal variant name, or empty meaning "same variant as owner".
    pub variant: String,
    /// Required status string.
    pub status: String,
    /// Whether this dependency is optional during patch builds.
    pub patch_optional: bool,
}

/// A concrete requirement: name + variant, no status/patch-optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Literal task name.
    pub name: String,
    /// Literal variant name, or empty.
    pub variant: String,
}

/// A fully expanded task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTask {
    /// Task name.
    pub name: String,
    /// Scheduling priority.
    pub priority: i64,
    /// Execution timeout, in seconds.
    pub exec_timeout_secs: Option<u64>,
    /// Whether the working directory is cleaned up after run.
    pub cleanup: bool,
    /// Opaque command list.
    pub commands: Vec<serde_yaml::Value>,
    /// Tags.
    pub tags: Vec<String>,
    /// Tri-state stepback.
    pub stepback: TriState,
    /// Concrete dependencies.
    pub depends_on: Vec<Dependency>,
    /// Concrete requirements.
    pub requires: Vec<Requirement>,
}

/// A single task entry within a build variant's expanded task list.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTask {
    /// Task name.
    pub name: String,
    /// Tri-state patchable override.
    pub patchable: TriState,
    /// Priority override.
    pub priority: Option<i64>,
    /// Execution timeout override, in seconds.
    pub exec_timeout_secs: Option<u64>,
    /// Tri-state stepback override.
    pub stepback: TriState,
    /// Distro list.
    pub run_on: Vec<String>,
    /// Concrete dependencies for this variant-task.
    pub depends_on: Vec<Dependency>,
    /// Concrete requirements for this variant-task.
    pub requires: Vec<Requirement>,
}

/// A fully expanded build variant.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildVariant {
    /// Display name.
    pub display_name: String,
    /// Variant name.
    pub name: String,
    /// Expansion map.
    pub expansions: HashMap<String, String>,
    /// Enabled modules.
    pub modules: Vec<String>,
    /// Whether disabled.
    pub disabled: bool,
    /// Whether push-triggered.
    pub push: bool,
    /// Batch-time override, in minutes.
    pub batchtime: Option<u32>,
    /// Tri-state stepback.
    pub stepback: TriState,
    /// Hosts/distros this variant runs on.
    pub run_on: Vec<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Expanded task list.
    pub tasks: Vec<VariantTask>,
}

/// The fully expanded, statically validated project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Caller-supplied identifier, copied verbatim.
    pub identifier: Identifier,
    /// Whether the project is enabled.
    pub enabled: bool,
    /// Default stepback.
    pub stepback: TriState,
    /// Whether cleanup is disabled by default.
    pub disable_cleanup: bool,
    /// Default batch time, in minutes.
    pub batchtime: Option<u32>,
    /// Remote checkout path.
    pub remote_path: String,
    /// Repository kind.
    pub repokind: String,
    /// Default execution timeout, in seconds.
    pub exec_timeout_secs: Option<u64>,
    /// Default callback timeout, in seconds.
    pub callback_timeout_secs: Option<u64>,
    /// Enabled modules.
    pub modules: Vec<String>,
    /// Fully expanded tasks.
    pub tasks: Vec<ProjectTask>,
    /// Fully expanded build variants, regular variants first in declaration
    /// order followed by matrix-synthesized variants in matrix declaration
    /// order then cell-enumeration order.
    pub build_variants: Vec<BuildVariant>,
}
