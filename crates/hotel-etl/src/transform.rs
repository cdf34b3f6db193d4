//! Transformation trigger
//!
//! Runs `dbt run` in the dbt project directory. The pipeline calls it twice,
//! once for the `load` stage and once for `transform`. Each stage can be
//! narrowed with its own `--select`; without one both stages run the same
//! full rebuild. Output is logged, never parsed; only the exit status decides
//! success.

use hotel_common::config::TransformConfig;
use hotel_common::{EtlError, Result};
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

/// Which half of the dbt project a run builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Transform,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::Load => "load",
            Stage::Transform => "transform",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful transformation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformOutcome {
    pub stage: Stage,
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
}

/// Launches the external transformation command
#[derive(Debug, Clone)]
pub struct TransformTrigger {
    config: TransformConfig,
}

impl TransformTrigger {
    pub fn new(config: TransformConfig) -> Self {
        if config.load_select.is_none() && config.transform_select.is_none() {
            warn!(
                "No dbt selectors configured: the load and transform stages run the same \
                 `dbt run` and both rebuild every model"
            );
        }
        Self { config }
    }

    pub fn selector(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Load => self.config.load_select.as_deref(),
            Stage::Transform => self.config.transform_select.as_deref(),
        }
    }

    /// Program and arguments for `stage`
    ///
    /// `DBT_BIN` may carry a prefix such as `uv run dbt`; it is split on
    /// whitespace.
    pub fn command(&self, stage: Stage) -> (String, Vec<String>) {
        let mut parts = self.config.program.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .unwrap_or_else(|| hotel_common::config::DEFAULT_DBT_BIN.to_string());

        let mut args: Vec<String> = parts.collect();
        args.push("run".to_string());
        if let Some(selector) = self.selector(stage) {
            args.push("--select".to_string());
            args.push(selector.to_string());
        }

        (program, args)
    }

    pub fn command_line(&self, stage: Stage) -> String {
        let (program, args) = self.command(stage);
        std::iter::once(program)
            .chain(args)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[instrument(skip(self), fields(project_dir = %self.config.project_dir.display()))]
    pub async fn run(&self, stage: Stage) -> Result<TransformOutcome> {
        let (program, args) = self.command(stage);
        let command_line = self.command_line(stage);
        info!(command = %command_line, "Running transformation");

        let output = Command::new(&program)
            .args(&args)
            .current_dir(&self.config.project_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                EtlError::io(
                    format!(
                        "spawning `{}` in {}",
                        command_line,
                        self.config.project_dir.display()
                    ),
                    e,
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            for line in stdout.lines() {
                info!(target: "dbt", "{}", line);
            }
            info!(command = %command_line, "Transformation completed");
            return Ok(TransformOutcome {
                stage,
                command: command_line,
                exit_code: output.status.code().unwrap_or(0),
                stdout,
            });
        }

        // dbt reports most failures on stdout, so both streams are kept.
        for line in stdout.lines() {
            warn!(target: "dbt", "{}", line);
        }
        for line in stderr.lines() {
            warn!(target: "dbt", "{}", line);
        }
        error!(
            command = %command_line,
            exit_code = ?output.status.code(),
            project_dir = %self.config.project_dir.display(),
            "Transformation failed"
        );

        Err(EtlError::Transform {
            command: command_line,
            exit_code: output.status.code(),
            stderr,
        })
    }
}
