//! Pipeline coordinator
//!
//! Runs steps strictly in order: extract, then load, then transform. A step
//! only starts once its predecessor has succeeded. Each step gets
//! `1 + retries` attempts; a step that exhausts them fails the run and every
//! later step stays pending. Nothing is persisted; the [`RunReport`] is the
//! only record of a run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotel_common::config::{AppConfig, DatabaseConfig, RetryConfig};
use hotel_common::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::extract::{self, DEFAULT_TARGET_TABLE};
use crate::transform::{Stage, TransformTrigger};

/// Identifier the pipeline is published under
pub const DAG_ID: &str = "extract_load_transform";

/// Owner reported to schedulers
pub const DEFAULT_OWNER: &str = "hotel-dwh";

/// Task names of the full chain, in run order
pub const ETL_TASKS: [&str; 3] = ["extract_task", "load_task", "transform_task"];

/// One unit of work in the chain
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the step once, returning a short summary on success
    async fn run(&self) -> Result<String>;
}

/// Step lifecycle within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn as_str(&self) -> &str {
        match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub state: StepState,
    pub attempts: u32,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl StepReport {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: StepState::Pending,
            attempts: 0,
            summary: None,
            error: None,
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dag_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.state == StepState::Succeeded)
    }

    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.state == StepState::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Static description of the pipeline, for schedulers that discover workflows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDefinition {
    pub dag_id: String,
    pub owner: String,
    pub tags: Vec<String>,
    /// `None`: runs only when triggered manually
    pub schedule: Option<String>,
    pub catchup: bool,
    pub depends_on_past: bool,
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub tasks: Vec<String>,
}

pub struct Pipeline {
    dag_id: String,
    owner: String,
    tags: Vec<String>,
    retry: RetryConfig,
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new(dag_id: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            dag_id: dag_id.into(),
            owner: DEFAULT_OWNER.to_string(),
            tags: vec!["etl".to_string()],
            retry,
            steps: Vec::new(),
        }
    }

    /// Appends a step that runs after every step added so far
    pub fn then(mut self, step: impl PipelineStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn definition(&self) -> PipelineDefinition {
        PipelineDefinition {
            dag_id: self.dag_id.clone(),
            owner: self.owner.clone(),
            tags: self.tags.clone(),
            schedule: None,
            catchup: false,
            depends_on_past: false,
            retries: self.retry.retries,
            retry_delay_secs: self.retry.delay.as_secs(),
            tasks: self.steps.iter().map(|s| s.name().to_string()).collect(),
        }
    }

    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut reports: Vec<StepReport> =
            self.steps.iter().map(|s| StepReport::pending(s.name())).collect();

        info!(%run_id, dag_id = %self.dag_id, steps = self.steps.len(), "Pipeline run started");

        for (step, report) in self.steps.iter().zip(reports.iter_mut()) {
            self.run_step(&**step, report).await;
            if report.state == StepState::Failed {
                error!(
                    %run_id,
                    step = %report.name,
                    attempts = report.attempts,
                    "Step failed, halting pipeline"
                );
                break;
            }
        }

        let report = RunReport {
            run_id,
            dag_id: self.dag_id.clone(),
            started_at,
            finished_at: Utc::now(),
            steps: reports,
        };

        if report.succeeded() {
            info!(%run_id, "Pipeline run succeeded");
        } else {
            warn!(%run_id, "Pipeline run did not complete");
        }

        report
    }

    async fn run_step(&self, step: &dyn PipelineStep, report: &mut StepReport) {
        let max_attempts = self.retry.max_attempts();

        loop {
            report.attempts += 1;
            report.state = StepState::Running;
            info!(step = %report.name, attempt = report.attempts, max_attempts, "Step running");

            match step.run().await {
                Ok(summary) => {
                    info!(step = %report.name, %summary, "Step succeeded");
                    report.state = StepState::Succeeded;
                    report.summary = Some(summary);
                    report.error = None;
                    return;
                },
                Err(e) => {
                    report.error = Some(e.to_string());
                    let retryable = e.is_retryable();
                    if !retryable || report.attempts >= max_attempts {
                        error!(
                            step = %report.name,
                            attempt = report.attempts,
                            kind = ?e.kind(),
                            error = %e,
                            "Step attempt failed"
                        );
                        report.state = StepState::Failed;
                        return;
                    }

                    warn!(
                        step = %report.name,
                        attempt = report.attempts,
                        error = %e,
                        delay_secs = self.retry.delay.as_secs(),
                        "Step attempt failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                },
            }
        }
    }
}

/// Appends the bookings CSV to the warehouse
pub struct ExtractStep {
    database: DatabaseConfig,
    csv_path: PathBuf,
    table: String,
}

impl ExtractStep {
    pub fn new(database: DatabaseConfig, csv_path: PathBuf) -> Self {
        Self {
            database,
            csv_path,
            table: DEFAULT_TARGET_TABLE.to_string(),
        }
    }
}

#[async_trait]
impl PipelineStep for ExtractStep {
    fn name(&self) -> &str {
        ETL_TASKS[0]
    }

    async fn run(&self) -> Result<String> {
        let summary = extract::load_bookings(&self.database, &self.csv_path, &self.table).await?;
        Ok(summary.to_string())
    }
}

/// Runs one dbt stage
pub struct DbtStep {
    trigger: Arc<TransformTrigger>,
    stage: Stage,
    name: String,
}

impl DbtStep {
    pub fn new(trigger: Arc<TransformTrigger>, stage: Stage) -> Self {
        Self {
            trigger,
            stage,
            name: format!("{}_task", stage),
        }
    }
}

#[async_trait]
impl PipelineStep for DbtStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<String> {
        let outcome = self.trigger.run(self.stage).await?;
        Ok(format!("`{}` succeeded", outcome.command))
    }
}

/// Definition of the full chain, available without any credentials
pub fn etl_definition(retry: RetryConfig) -> PipelineDefinition {
    PipelineDefinition {
        dag_id: DAG_ID.to_string(),
        owner: DEFAULT_OWNER.to_string(),
        tags: vec!["etl".to_string()],
        schedule: None,
        catchup: false,
        depends_on_past: false,
        retries: retry.retries,
        retry_delay_secs: retry.delay.as_secs(),
        tasks: ETL_TASKS.iter().map(|t| t.to_string()).collect(),
    }
}

/// The full extract -> load -> transform chain
pub fn etl_pipeline(config: &AppConfig) -> Pipeline {
    let trigger = Arc::new(TransformTrigger::new(config.transform.clone()));

    Pipeline::new(DAG_ID, config.retry)
        .then(ExtractStep::new(config.database.clone(), config.csv_path.clone()))
        .then(DbtStep::new(trigger.clone(), Stage::Load))
        .then(DbtStep::new(trigger, Stage::Transform))
}
