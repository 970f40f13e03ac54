//! Domain types shared by the scheduler, the executor agents, and the
//! cluster-manager adapters.
//!
//! Identifiers are thin newtypes over strings (or a counter, for task ids)
//! so that an agent id can never be passed where an executor id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier the cluster manager assigns to this framework on registration.
    FrameworkId
);
string_id!(
    /// Identifier of a single resource offer.
    OfferId
);
string_id!(
    /// Identifier of the machine agent (slave) that made an offer.
    AgentId
);
string_id!(
    /// Identifier of the executor descriptor registered by the scheduler.
    ExecutorId
);

/// Scheduler-assigned task identifier, a monotonically increasing counter.
///
/// On the wire the id is carried as its decimal string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Offers ─────────────────────────────────────────────────────────

/// Scalar resource quantities, either offered by a host or requested by a task.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Resources {
    /// CPU shares.
    pub cpus: f64,
    /// Memory in megabytes.
    pub mem: f64,
}

impl Resources {
    pub fn new(cpus: f64, mem: f64) -> Self {
        Self { cpus, mem }
    }
}

/// A cluster manager's proposal of available capacity on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub agent_id: AgentId,
    pub hostname: String,
    pub resources: Resources,
}

// ── Descriptors ────────────────────────────────────────────────────

/// Describes the executor binary the cluster manager starts on each host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorDescriptor {
    pub executor_id: ExecutorId,
    /// Absolute path of the executable to run.
    pub command: String,
    pub name: String,
    pub source: String,
}

/// Describes this framework to the cluster manager.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameworkDescriptor {
    pub name: String,
    /// Empty means "let the cluster manager fill in the invoking user".
    pub user: String,
    pub checkpoint: bool,
}

/// Principal/secret pair handed to the driver when authentication is on.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub principal: String,
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ── Tasks ──────────────────────────────────────────────────────────

/// A unit of work dispatched to one host's executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub name: String,
    pub agent_id: AgentId,
    pub executor: ExecutorDescriptor,
    pub resources: Resources,
}

/// Lifecycle state of a task as reported by the cluster manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Implicit initial state at launch decision time.
    Launched,
    Running,
    Finished,
    Lost,
    Failed,
    Killed,
}

impl TaskState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Lost | TaskState::Failed | TaskState::Killed
        )
    }

    /// Whether a task in `self` may move to `next`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        match self {
            TaskState::Launched => next != TaskState::Launched,
            TaskState::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Launched => "TASK_LAUNCHED",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Lost => "TASK_LOST",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Killed => "TASK_KILLED",
        };
        f.write_str(s)
    }
}

/// A status update for one task, carrying an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl TaskStatus {
    pub fn new(task_id: TaskId, state: TaskState, data: impl Into<Vec<u8>>) -> Self {
        Self {
            task_id,
            state,
            data: data.into(),
        }
    }
}

/// Final status reported by a driver's `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    NotStarted,
    Running,
    /// Stopped by an explicit `stop` request.
    Stopped,
    /// Terminated because of a fatal condition.
    Aborted,
}

impl DriverStatus {
    /// Process exit code for this final status: 0 only for a clean stop.
    pub fn exit_code(self) -> i32 {
        if self == DriverStatus::Stopped { 0 } else { 1 }
    }
}
