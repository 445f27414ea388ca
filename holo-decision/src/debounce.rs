//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{Duration, Instant};

use holo_utils::UnboundedSender;
use holo_utils::task::TimeoutTask;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::error::Error;
use crate::tasks;
use crate::tasks::messages::ProtocolInputMsg;

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum State {
    #[default]
    Idle,
    Pending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Event {
    // A change requiring a route rebuild was received.
    Trigger,
    // The debounce timer expired.
    Expire,
}

// Coalesces bursts of route rebuild triggers with exponential backoff.
//
// The first trigger arms the timer with the minimum delay. Every trigger
// received while the timer is pending doubles the delay, up to the maximum,
// and re-arms the timer. Once the maximum is reached, further triggers are
// absorbed without postponing the rebuild.
#[derive(Debug)]
pub struct Debouncer {
    state: State,
    min_delay: Duration,
    max_delay: Duration,
    delay: Duration,
    deadline: Option<Instant>,
    timer: Option<TimeoutTask>,
}

// ===== impl Debouncer =====

impl Debouncer {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Debouncer {
        Debouncer {
            state: State::Idle,
            min_delay,
            max_delay: max_delay.max(min_delay),
            delay: min_delay,
            deadline: None,
            timer: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    // Delay used by the currently armed timer.
    pub fn current_delay(&self) -> Option<Duration> {
        (self.state == State::Pending).then_some(self.delay)
    }

    // Time remaining until the pending rebuild.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    // Processes an event.
    //
    // Returns true when the debounced action should run.
    pub(crate) fn process_event(
        &mut self,
        event: Event,
        protocol_inputp: &UnboundedSender<ProtocolInputMsg>,
    ) -> Result<bool, Error> {
        match (self.state, event) {
            (State::Idle, Event::Trigger) => {
                self.delay = self.min_delay;
                self.arm(protocol_inputp);
                self.state = State::Pending;
                Ok(false)
            }
            (State::Pending, Event::Trigger) => {
                if self.delay < self.max_delay {
                    self.delay = (self.delay * 2).min(self.max_delay);
                    self.arm(protocol_inputp);
                }
                Ok(false)
            }
            (State::Pending, Event::Expire) => {
                self.state = State::Idle;
                self.delay = self.min_delay;
                self.deadline = None;
                self.timer = None;
                Ok(true)
            }
            (State::Idle, Event::Expire) => {
                Err(Error::DebounceUnexpectedEvent(self.state, event))
            }
        }
    }

    fn arm(&mut self, protocol_inputp: &UnboundedSender<ProtocolInputMsg>) {
        Debug::DebounceSchedule(self.delay).log();
        self.deadline = Some(Instant::now() + self.delay);
        match &mut self.timer {
            Some(timer) => timer.reset(Some(self.delay)),
            None => {
                let timer = tasks::debounce_timer(self.delay, protocol_inputp);
                self.timer = Some(timer);
            }
        }
    }
}

// ===== unit tests =====
