//! Wrapper around the external asset compiler. Every subcommand runs the
//! configured binary synchronously with captured output and returns a
//! [`CompilerOutcome`] instead of raising: the pipeline's policy is
//! best-effort (a failed step is reported, later steps still run), and
//! callers that want fail-fast inspect the outcome themselves.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Context as _;

use crate::error::{IsocapError, IsocapResult};

/// Captured result of one compiler invocation. The compiler signals problems
/// on standard error; the exit code is kept for diagnostics but a non-empty
/// stderr is what marks a step as failed.
#[derive(Clone, Debug)]
pub struct CompilerOutcome {
    pub exit_code: Option<i32>,
    pub stderr: String,
    /// Standard-output lines, surfaced as informational messages.
    pub info: Vec<String>,
}

impl CompilerOutcome {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            info: String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.stderr.trim().is_empty()
    }

    /// The reported error text, when the step failed.
    pub fn error(&self) -> Option<&str> {
        let trimmed = self.stderr.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

pub struct AssetCompiler {
    path: PathBuf,
}

impl AssetCompiler {
    /// The configured compiler path must point at an existing file.
    pub fn new(path: impl Into<PathBuf>) -> IsocapResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(IsocapError::precondition(format!(
                "asset compiler path '{}' is not a file",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[&str]) -> IsocapResult<CompilerOutcome> {
        tracing::debug!(compiler = %self.path.display(), ?args, "invoking asset compiler");
        let output = Command::new(&self.path)
            .args(args)
            .output()
            .with_context(|| {
                format!("run asset compiler '{}'", self.path.display())
            })?;
        Ok(CompilerOutcome::from_output(output))
    }

    /// Splits the rendered sprite sheets of one object (or variant) into
    /// individual sprites.
    pub fn split(
        &self,
        source_dir: &Path,
        object_name: &str,
        variant: Option<&str>,
    ) -> IsocapResult<CompilerOutcome> {
        let dir = source_dir.to_string_lossy();
        let mut args = vec!["split", dir.as_ref(), object_name];
        if let Some(variant) = variant {
            args.extend(["-v", variant]);
        }
        self.run(&args)
    }

    /// Updates the object XML with the split sprites.
    pub fn update_xml(
        &self,
        source_dir: &Path,
        object_name: &str,
        variant: Option<&str>,
    ) -> IsocapResult<CompilerOutcome> {
        let dir = source_dir.to_string_lossy();
        let mut args = vec!["update-xml", dir.as_ref(), object_name];
        if let Some(variant) = variant {
            args.extend(["-v", variant]);
        }
        self.run(&args)
    }

    /// Compiles the object XML into the final game archive.
    pub fn compile(&self, xml_path: &Path) -> IsocapResult<CompilerOutcome> {
        let xml = xml_path.to_string_lossy();
        self.run(&["compile", xml.as_ref()])
    }

    /// Advanced compile with a file-name format string and creator credit;
    /// `variants` carries (first variant, compiled variant) when the scene
    /// defines material variants.
    pub fn compile_advanced(
        &self,
        source_dir: &Path,
        format_string: &str,
        creator_name: &str,
        object_name: &str,
        variants: Option<(&str, &str)>,
    ) -> IsocapResult<CompilerOutcome> {
        if creator_name.is_empty() {
            return Err(IsocapError::precondition(
                "advanced compile requires a creator name",
            ));
        }
        if format_string.is_empty() {
            return Err(IsocapError::precondition(
                "advanced compile requires a format string",
            ));
        }

        let dir = source_dir.to_string_lossy();
        let mut args = vec![
            "compile-advanced",
            dir.as_ref(),
            format_string,
            creator_name,
            object_name,
        ];
        if let Some((first, current)) = variants {
            args.extend([first, current]);
        }
        self.run(&args)
    }

    /// Adds all four rotations to the draw groups in the object XML. Stdout
    /// lines are progress notes worth surfacing.
    pub fn add_rotations(&self, xml_path: &Path) -> IsocapResult<CompilerOutcome> {
        let xml = xml_path.to_string_lossy();
        self.run(&["add-rotations", xml.as_ref()])
    }
}
