// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Lifecycle event channel with explicit subscription state.
// Author: Lukas Bower

//! Firmware lifecycle events are delivered to subscribers by the host, in
//! priority order. The channel only tracks who is subscribed and which events
//! have fired; the host owns the subscribers and dispatches each delivery to
//! the matching handler itself.

use std::fmt;

use log::debug;

/// One-way transitions announced by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Boot services end; boot-time buffers may be reclaimed afterwards.
    ExitBootServices,
    /// The OS loader switched runtime services to virtual addressing.
    VirtualAddressChange,
    /// A boot option is about to be launched.
    ReadyToBoot,
}

impl LifecycleEvent {
    /// Whether the event can only ever happen once per boot.
    #[must_use]
    pub fn is_irreversible(self) -> bool {
        matches!(self, Self::ExitBootServices | Self::VirtualAddressChange)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExitBootServices => "exit-boot-services",
            Self::VirtualAddressChange => "virtual-address-change",
            Self::ReadyToBoot => "ready-to-boot",
        };
        f.write_str(name)
    }
}

/// Priority at which a subscriber runs. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Application = 4,
    Callback = 8,
    Notify = 16,
}

/// Handle returned by [`LifecycleChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The event is one-shot and has already fired.
    #[error("{0} has already been signalled")]
    AlreadySignalled(LifecycleEvent),
}

#[derive(Debug, Clone, Copy)]
struct Subscription {
    id: SubscriptionId,
    event: LifecycleEvent,
    priority: TaskPriority,
}

#[derive(Debug, Default)]
pub struct LifecycleChannel {
    subscriptions: Vec<Subscription>,
    signalled: Vec<LifecycleEvent>,
    next_id: u32,
}

impl LifecycleChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `event`.
    ///
    /// Subscribing to a one-shot event after it fired is an error: the
    /// subscriber would never run.
    pub fn subscribe(
        &mut self,
        event: LifecycleEvent,
        priority: TaskPriority,
    ) -> Result<SubscriptionId, LifecycleError> {
        if event.is_irreversible() && self.has_signalled(event) {
            return Err(LifecycleError::AlreadySignalled(event));
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            event,
            priority,
        });
        debug!("subscription {:?} armed for {event} at {priority:?}", id);
        Ok(id)
    }

    /// Removes a subscription. Returns `false` if it was already closed.
    pub fn close(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        before != self.subscriptions.len()
    }

    #[must_use]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|subscription| subscription.id == id)
    }

    #[must_use]
    pub fn has_signalled(&self, event: LifecycleEvent) -> bool {
        self.signalled.contains(&event)
    }

    /// Marks `event` as fired and returns its subscribers, highest priority
    /// first and in subscription order within a priority.
    pub fn signal(&mut self, event: LifecycleEvent) -> Vec<SubscriptionId> {
        if !self.has_signalled(event) {
            self.signalled.push(event);
        }
        let mut targets: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|subscription| subscription.event == event)
            .copied()
            .collect();
        targets.sort_by(|a, b| b.priority.cmp(&a.priority));
        debug!("{event} delivered to {} subscribers", targets.len());
        targets.into_iter().map(|subscription| subscription.id).collect()
    }
}
