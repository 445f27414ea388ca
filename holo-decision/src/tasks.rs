//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use holo_utils::UnboundedSender;
use holo_utils::task::TimeoutTask;

//
// Route computation tasks diagram:
//
//                                  +--------------+
//         topology updates (1x) -> |              |
//        prefix db updates (1x) -> |              |
//      static route deltas (1x) -> |              |
//                                  |              |
//           debounce_timer (1x) -> |   decision   | -> (1x) route_update_tx
//         cold_start_timer (1x) -> |              |
//           fib_hold_timer (1x) -> |              |
//         rib_policy_timer (1x) -> |              |
//                                  +--------------+
//

// Route computation inter-task message types.
pub mod messages {
    use serde::{Deserialize, Serialize};

    use crate::route::RouteUpdate;

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;
    pub type ProtocolOutputMsg = output::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use super::*;

        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        #[derive(Deserialize, Serialize)]
        pub enum ProtocolMsg {
            DebounceTimer,
            ColdStartTimer,
            FibHoldTimer,
            RibPolicyTimer,
        }
    }

    // Output messages (main task -> consumers).
    pub mod output {
        use super::*;

        #[derive(Clone, Debug)]
        #[derive(Deserialize, Serialize)]
        pub enum ProtocolMsg {
            RouteUpdate(RouteUpdate),
        }
    }
}

// ===== Route computation tasks =====

// Route rebuild debounce timer.
pub(crate) fn debounce_timer(
    timeout: Duration,
    protocol_inputp: &UnboundedSender<messages::ProtocolInputMsg>,
) -> TimeoutTask {
    timeout_task(
        timeout,
        messages::input::ProtocolMsg::DebounceTimer,
        protocol_inputp,
    )
}

// Initial route programming delay.
pub(crate) fn cold_start_timer(
    timeout: Duration,
    protocol_inputp: &UnboundedSender<messages::ProtocolInputMsg>,
) -> TimeoutTask {
    timeout_task(
        timeout,
        messages::input::ProtocolMsg::ColdStartTimer,
        protocol_inputp,
    )
}

// Ordered FIB hold decrement timer.
pub(crate) fn fib_hold_timer(
    timeout: Duration,
    protocol_inputp: &UnboundedSender<messages::ProtocolInputMsg>,
) -> TimeoutTask {
    timeout_task(
        timeout,
        messages::input::ProtocolMsg::FibHoldTimer,
        protocol_inputp,
    )
}

// RIB policy expiration timer.
pub(crate) fn rib_policy_timer(
    timeout: Duration,
    protocol_inputp: &UnboundedSender<messages::ProtocolInputMsg>,
) -> TimeoutTask {
    timeout_task(
        timeout,
        messages::input::ProtocolMsg::RibPolicyTimer,
        protocol_inputp,
    )
}

// ===== helper functions =====

fn timeout_task(
    timeout: Duration,
    msg: messages::ProtocolInputMsg,
    protocol_inputp: &UnboundedSender<messages::ProtocolInputMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let protocol_inputp = protocol_inputp.clone();

        TimeoutTask::new(timeout, move || async move {
            let _ = protocol_inputp.send(msg);
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}
