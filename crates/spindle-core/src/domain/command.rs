//! Names of the state-changing commands accepted by the task store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One command per store operation.
///
/// The name doubles as the link relation / content-type suffix on the wire,
/// so `Display` renders the variant name unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    CreateTask,
    /// Create with a trigger date; the task starts out `waiting`.
    CreateFutureTask,
    StartTask,
    RequeueTask,
    RescheduleTask,
    CancelTask,
    CloseTask,
}

impl CommandType {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::CreateTask => "CreateTask",
            CommandType::CreateFutureTask => "CreateFutureTask",
            CommandType::StartTask => "StartTask",
            CommandType::RequeueTask => "RequeueTask",
            CommandType::RescheduleTask => "RescheduleTask",
            CommandType::CancelTask => "CancelTask",
            CommandType::CloseTask => "CloseTask",
        }
    }

    /// Does this command change the state of an existing task?
    pub fn is_update(self) -> bool {
        !matches!(self, CommandType::CreateTask | CommandType::CreateFutureTask)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
