use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::domain::errors::{DomainError, Result};
use crate::domain::value_objects::ControllerState;

/// Number of transitions kept per tile
const HISTORY_LIMIT: usize = 64;

/// State transition record
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: ControllerState,
    pub to: ControllerState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Domain entity tracking one tile's state machine
#[derive(Debug)]
pub struct ControllerLifecycle {
    current_state: ControllerState,
    history: VecDeque<StateTransition>,
    total_transitions: usize,
    live_since: Option<Instant>,
}

impl ControllerLifecycle {
    pub fn new() -> Self {
        Self {
            current_state: ControllerState::Idle,
            history: VecDeque::new(),
            total_transitions: 0,
            live_since: None,
        }
    }

    pub fn current_state(&self) -> ControllerState {
        self.current_state
    }

    /// Time spent in the current Live period
    pub fn live_duration(&self) -> Option<Duration> {
        self.live_since.map(|start| start.elapsed())
    }

    pub fn transition_count(&self) -> usize {
        self.total_transitions
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &StateTransition> {
        self.history.iter()
    }

    /// Apply one edge of the state machine, rejecting edges it does not have
    pub fn transition(&mut self, to: ControllerState, reason: Option<String>) -> Result<()> {
        let from = self.current_state;
        if !from.can_transition_to(to) {
            return Err(DomainError::InvalidTransition { from, to });
        }

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            reason,
        });
        self.total_transitions += 1;
        self.current_state = to;

        match to {
            ControllerState::Live => self.live_since = Some(Instant::now()),
            _ => self.live_since = None,
        }
        Ok(())
    }
}

impl Default for ControllerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
