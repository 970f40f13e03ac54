//! Task registry: every task ever launched, keyed by task id.
//!
//! Entries are never removed. State changes go through
//! [`TaskRegistry::transition`], which enforces the task lifecycle.

use std::collections::HashMap;

use bootgrid_core::{AgentId, ExecutorDescriptor, Offer, Resources, TaskId, TaskInfo, TaskState};

use crate::error::{SchedulerError, SchedulerResult};

/// A launched task and where it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEntry {
    pub task: TaskInfo,
    pub hostname: String,
    pub state: TaskState,
}

impl TaskEntry {
    pub fn agent_id(&self) -> &AgentId {
        &self.task.agent_id
    }
}

/// Outcome of applying a status update to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied { from: TaskState, to: TaskState },
    /// The task is already in this terminal state; nothing changed.
    Duplicate(TaskState),
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, TaskEntry>,
    next_id: u64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the task the next launch would create, without recording it.
    pub fn prepare(
        &self,
        offer: &Offer,
        executor: &ExecutorDescriptor,
        resources: Resources,
    ) -> TaskInfo {
        let task_id = TaskId(self.next_id);
        TaskInfo {
            task_id,
            name: format!("task {task_id}"),
            agent_id: offer.agent_id.clone(),
            executor: executor.clone(),
            resources,
        }
    }

    /// Record a launched task. Ids are handed out in launch order.
    pub fn insert(&mut self, task: TaskInfo, hostname: &str) -> TaskId {
        let task_id = task.task_id;
        self.next_id = self.next_id.max(task_id.0 + 1);
        self.tasks.insert(
            task_id,
            TaskEntry {
                task,
                hostname: hostname.to_string(),
                state: TaskState::Launched,
            },
        );
        task_id
    }

    pub fn get(&self, task_id: TaskId) -> Option<&TaskEntry> {
        self.tasks.get(&task_id)
    }

    /// What [`transition`](Self::transition) would do, without doing it.
    pub fn check(&self, task_id: TaskId, to: TaskState) -> SchedulerResult<Transition> {
        let from = self
            .tasks
            .get(&task_id)
            .ok_or(SchedulerError::UnknownTask(task_id))?
            .state;

        if from == to && from.is_terminal() {
            return Ok(Transition::Duplicate(from));
        }
        if !from.can_transition_to(to) {
            return Err(SchedulerError::InvalidTransition { task_id, from, to });
        }
        Ok(Transition::Applied { from, to })
    }

    /// Move a task to `to`, following the lifecycle.
    pub fn transition(&mut self, task_id: TaskId, to: TaskState) -> SchedulerResult<Transition> {
        let transition = self.check(task_id, to)?;
        if let Transition::Applied { to, .. } = transition {
            if let Some(entry) = self.tasks.get_mut(&task_id) {
                entry.state = to;
            }
        }
        Ok(transition)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn count_in(&self, state: TaskState) -> usize {
        self.tasks.values().filter(|e| e.state == state).count()
    }
}
