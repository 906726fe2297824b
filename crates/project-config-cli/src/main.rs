//! CLI front-end for the project-configuration compiler.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use miette::Diagnostic;
use project_config::{CompileError, Identifier};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Compile a project configuration document into a static project model.
#[derive(Parser)]
#[command(name = "project-config", version, about)]
struct Cli {
    /// Path to the YAML document to compile. Reads from stdin when omitted.
    path: Option<PathBuf>,

    /// Repository owner recorded on the compiled project.
    #[arg(long, env = "PROJECT_CONFIG_OWNER", default_value = "")]
    owner: String,

    /// Repository name recorded on the compiled project.
    #[arg(long, env = "PROJECT_CONFIG_REPO", default_value = "")]
    repo: String,

    /// Branch name recorded on the compiled project.
    #[arg(long, env = "PROJECT_CONFIG_BRANCH", default_value = "")]
    branch: String,

    /// Display name recorded on the compiled project.
    #[arg(long, env = "PROJECT_CONFIG_DISPLAY_NAME", default_value = "")]
    display_name: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    output: OutputFormat,

    /// Treat a non-empty accumulated error list as a failure (non-zero exit).
    #[arg(long)]
    strict: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("failed to read {path}")]
    #[diagnostic(code(project_config::cli::read))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read stdin")]
    #[diagnostic(code(project_config::cli::read_stdin))]
    ReadStdin(#[source] io::Error),

    #[error(transparent)]
    #[diagnostic(code(project_config::cli::yaml))]
    Yaml(#[from] project_config::YamlError),

    #[error("compiled with {0} error(s)")]
    #[diagnostic(code(project_config::cli::compile_errors))]
    CompileErrors(usize),

    #[error("failed to serialize output")]
    #[diagnostic(code(project_config::cli::serialize))]
    Serialize(#[source] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let bytes = read_input(cli.path.as_deref())?;

    let identifier = Identifier {
        owner: cli.owner,
        repo: cli.repo,
        branch: cli.branch,
        display_name: cli.display_name,
    };

    let (project, errors) = project_config::compile(&bytes, identifier)?;

    for error in &errors {
        report_error(error);
    }

    render(&project, cli.output)?;

    if cli.strict && !errors.is_empty() {
        return Err(CliError::CompileErrors(errors.len()));
    }

    Ok(())
}

fn read_input(path: Option<&std::path::Path>) -> Result<Vec<u8>, CliError> {
    match path {
        Some(path) => fs::read(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(CliError::ReadStdin)?;
            Ok(buf)
        }
    }
}

fn report_error(error: &CompileError) {
    eprintln!("warning: {error}");
}

fn render(project: &project_config::Project, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Pretty => {
            println!("project: {}", project.identifier.display_name);
            println!("  enabled: {}", project.enabled);
            println!("  tasks: {}", project.tasks.len());
            println!("  build variants: {}", project.build_variants.len());
            for variant in &project.build_variants {
                println!(
                    "    {} ({}): {} task(s)",
                    variant.name,
                    variant.display_name,
                    variant.tasks.len()
                );
            }
        }
        OutputFormat::Json => {
            let json = project_to_json(project);
            let rendered = serde_json::to_string_pretty(&json).map_err(CliError::Serialize)?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn project_to_json(project: &project_config::Project) -> serde_json::Value {
    serde_json::json!({
        "identifier": {
            "owner": project.identifier.owner,
            "repo": project.identifier.repo,
            "branch": project.identifier.branch,
            "display_name": project.identifier.display_name,
        },
        "enabled": project.enabled,
        "tasks": project.tasks.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
        "build_variants": project.build_variants.iter().map(|v| serde_json::json!({
            "name": v.name,
            "display_name": v.display_name,
            "tasks": v.tasks.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn compiles_a_minimal_document_from_a_path() {
        let file = write_temp("tasks:\n  - name: t1\n");
        let cli = Cli {
            path: Some(file.path().to_path_buf()),
            owner: "o".to_string(),
            repo: "r".to_string(),
            branch: "main".to_string(),
            display_name: "d".to_string(),
            output: OutputFormat::Json,
            strict: false,
        };
        assert!(run(cli).is_ok());
    }

    #[test]
    fn strict_mode_fails_when_errors_accumulate() {
        let file = write_temp("tasks:\n  - name: t1\n    depends_on: missing\n");
        let cli = Cli {
            path: Some(file.path().to_path_buf()),
            owner: String::new(),
            repo: String::new(),
            branch: String::new(),
            display_name: String::new(),
            output: OutputFormat::Pretty,
            strict: true,
        };
        assert!(run(cli).is_err());
    }

    #[test]
    fn non_strict_mode_succeeds_despite_accumulated_errors() {
        let file = write_temp("tasks:\n  - name: t1\n    depends_on: missing\n");
        let cli = Cli {
            path: Some(file.path().to_path_buf()),
            owner: String::new(),
            repo: String::new(),
            branch: String::new(),
            display_name: String::new(),
            output: OutputFormat::Pretty,
            strict: false,
        };
        assert!(run(cli).is_ok());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let cli = Cli {
            path: Some(PathBuf::from("/nonexistent/path.yaml")),
            owner: String::new(),
            repo: String::new(),
            branch: String::new(),
            display_name: String::new(),
            output: OutputFormat::Pretty,
            strict: false,
        };
        assert!(matches!(run(cli), Err(CliError::Read { .. })));
    }
}
