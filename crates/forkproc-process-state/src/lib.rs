use chrono::{DateTime, Utc};
use forkproc_common::errors::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of transitions kept in the history.
const MAX_HISTORY: usize = 100;

/// Lifecycle state of a forked child as last observed by the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// No child has been created yet
    NotStarted,
    /// Child exists and is schedulable
    Running,
    /// Child is suspended by a stop signal; it still holds its pid
    Stopped,
    /// Child was terminated by an uncaught signal (terminal)
    Signaled,
    /// Child exited through its own exit call (terminal)
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotStarted => write!(f, "not_started"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Signaled => write!(f, "signaled"),
            ProcessState::Terminated => write!(f, "terminated"),
        }
    }
}

impl ProcessState {
    /// Terminal states are sinks: the child has been reaped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Signaled | ProcessState::Terminated)
    }

    /// A child is alive while it is running or stopped.
    pub fn is_alive(&self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Stopped)
    }
}

/// Represents a state transition with timestamp and optional reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ProcessState,
    pub to_state: ProcessState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// State machine that validates lifecycle transitions of one child.
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    process_id: String,
    current_state: ProcessState,
    previous_state: Option<ProcessState>,
    state_history: Vec<StateTransition>,
}

impl ProcessStateMachine {
    /// Create a new state machine for a process
    pub fn new(process_id: &str) -> Self {
        Self {
            process_id: process_id.to_string(),
            current_state: ProcessState::NotStarted,
            previous_state: None,
            state_history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> ProcessState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<ProcessState> {
        self.previous_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    /// Check if a transition from current state to target state is valid
    pub fn is_valid_transition(&self, target_state: ProcessState) -> bool {
        match (self.current_state, target_state) {
            // Terminal states are sinks, including self-transitions.
            (ProcessState::Signaled | ProcessState::Terminated, _) => false,

            (ProcessState::NotStarted, ProcessState::Running) => true,

            (ProcessState::Running, ProcessState::Stopped) => true,
            (ProcessState::Running, ProcessState::Terminated) => true,
            (ProcessState::Running, ProcessState::Signaled) => true,

            (ProcessState::Stopped, ProcessState::Running) => true,
            (ProcessState::Stopped, ProcessState::Signaled) => true,
            // An external SIGCONT can resume the child unobserved.
            (ProcessState::Stopped, ProcessState::Terminated) => true,

            (ProcessState::Running, ProcessState::Running) => true,
            (ProcessState::Stopped, ProcessState::Stopped) => true,

            _ => false,
        }
    }

    /// Transition to a new state with optional reason
    pub fn transition_to(
        &mut self,
        target_state: ProcessState,
        reason: Option<String>,
    ) -> ProcessResult<()> {
        if !self.is_valid_transition(target_state) {
            return Err(ProcessError::invalid_state(
                &self.process_id,
                format!("{:?}", target_state),
                format!("{:?}", self.current_state),
            ));
        }

        if target_state == self.current_state {
            return Ok(());
        }

        let from_state = self.current_state;
        self.state_history.push(StateTransition {
            from_state,
            to_state: target_state,
            timestamp: Utc::now(),
            reason,
        });

        self.previous_state = Some(from_state);
        self.current_state = target_state;

        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        tracing::debug!(
            "Process {} transitioned from {:?} to {:?}",
            self.process_id,
            from_state,
            target_state
        );

        Ok(())
    }

    pub fn transition_to_running(&mut self, reason: &str) -> ProcessResult<()> {
        self.transition_to(ProcessState::Running, Some(reason.to_string()))
    }

    pub fn transition_to_stopped(&mut self, reason: &str) -> ProcessResult<()> {
        self.transition_to(ProcessState::Stopped, Some(reason.to_string()))
    }

    pub fn transition_to_signaled(&mut self, reason: String) -> ProcessResult<()> {
        self.transition_to(ProcessState::Signaled, Some(reason))
    }

    pub fn transition_to_terminated(&mut self, reason: String) -> ProcessResult<()> {
        self.transition_to(ProcessState::Terminated, Some(reason))
    }

    /// Status queries against the kernel are only valid while alive.
    pub fn can_query(&self) -> bool {
        self.current_state.is_alive()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    /// Count transitions to a specific state
    pub fn count_transitions_to(&self, state: ProcessState) -> usize {
        self.state_history
            .iter()
            .filter(|t| t.to_state == state)
            .count()
    }
}
