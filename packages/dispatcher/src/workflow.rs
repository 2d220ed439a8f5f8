//! Ordered multi-phase workflows, executed as repeated calls back into
//! the Dispatcher. Not parallel: phases run strictly in order, and a
//! DENY halts the remaining phases.

use crate::dispatcher::Dispatcher;
use crate::types::{Command, DispatchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub name: String,
    pub phases: Vec<Command>,
    pub current_phase: usize,
    pub status: WorkflowStatus,
    pub results: Vec<DispatchResult>,
}

impl Workflow {
    fn new(name: impl Into<String>, phases: Vec<Command>) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            name: name.into(),
            phases,
            current_phase: 0,
            status: WorkflowStatus::Pending,
            results: Vec::new(),
        }
    }
}

/// Holds defined workflows and drives them to completion one phase at a
/// time through the Dispatcher.
#[derive(Default)]
pub struct WorkflowRunner {
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl WorkflowRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn define(&self, name: impl Into<String>, phases: Vec<Command>) -> String {
        let workflow = Workflow::new(name, phases);
        let id = workflow.workflow_id.clone();
        self.workflows.write().await.insert(id.clone(), workflow);
        id
    }

    pub async fn get(&self, workflow_id: &str) -> Option<Workflow> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    pub async fn list(&self) -> Vec<Workflow> {
        self.workflows.read().await.values().cloned().collect()
    }

    /// Run every remaining phase in order. Short-circuits with
    /// `WorkflowStatus::Error` on the first phase that returns
    /// `decision == "DENY" && success == false`.
    pub async fn run(&self, workflow_id: &str, dispatcher: &Dispatcher) -> Option<Workflow> {
        let mut phases = {
            let mut workflows = self.workflows.write().await;
            let workflow = workflows.get_mut(workflow_id)?;
            workflow.status = WorkflowStatus::Running;
            workflow.phases.clone()
        };

        let start = {
            let workflows = self.workflows.read().await;
            workflows.get(workflow_id)?.current_phase
        };

        for (index, phase) in phases.drain(start..).enumerate() {
            let result = dispatcher.execute(phase).await;
            let halt = result.decision == "DENY" && !result.success;

            let mut workflows = self.workflows.write().await;
            let workflow = workflows.get_mut(workflow_id)?;
            workflow.results.push(result);
            workflow.current_phase = start + index + 1;

            if halt {
                workflow.status = WorkflowStatus::Error;
                return Some(workflow.clone());
            }
        }

        let mut workflows = self.workflows.write().await;
        let workflow = workflows.get_mut(workflow_id)?;
        workflow.status = WorkflowStatus::Complete;
        Some(workflow.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn define_then_get_round_trips() {
        let runner = WorkflowRunner::new();
        let id = runner
            .define("smoke-test", vec![Command::new("navigate", "https://example.com")])
            .await;
        let workflow = runner.get(&id).await.unwrap();
        assert_eq!(workflow.name, "smoke-test");
        assert_eq!(workflow.status, WorkflowStatus::Pending);
    }
}
