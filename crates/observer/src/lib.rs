// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! machina-observer: the observer bridge.
//!
//! Reads the broadcast socket every engine writes to and re-emits each
//! record to push subscribers. The one hard requirement here is that a
//! slow subscriber can never stall the fan-out: every send carries a
//! timeout, and a subscriber that exceeds it is evicted.

mod bridge;
mod subscriber;

pub use bridge::{Bridge, BridgeError, DEFAULT_SEND_TIMEOUT};
pub use subscriber::{accept_loop, Subscriber, SubscriberSet, TcpSubscriber};
