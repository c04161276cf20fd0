//! Inbound message routing.
//!
//! `cmd` messages are validated against the command table and dispatched to
//! the action runner; `get` messages are answered from a fresh probe.

use std::sync::Arc;

use jukebridge_core::command::{
    self, ActionRunner, Rejection, Resolved, RouteOutcome, commands_listing,
    commands_with_params_listing,
};
use jukebridge_core::status::{Attribute, StatusSource};
use jukebridge_core::topic::{Namespace, Topics};
use tracing::{debug, info, warn};

use crate::publisher::Publisher;
use crate::scheduler::Scheduler;

const GET_ALL: &str = "all";
const GET_HELP: &str = "help";

/// Work left for a message after [`Router::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followup {
    /// Nothing left; the message was rejected or unknown.
    Done(RouteOutcome),
    /// An action was started; publish a fresh map.
    Refresh,
    CommandHelp,
    /// Answer `get/<leaf>`.
    Get(String),
}

pub struct Router<S, P, R> {
    scheduler: Arc<Scheduler<S, P>>,
    publisher: Arc<P>,
    runner: R,
    topics: Topics,
}

impl<S, P, R> Router<S, P, R>
where
    S: StatusSource,
    P: Publisher,
    R: ActionRunner,
{
    pub fn new(
        scheduler: Arc<Scheduler<S, P>>,
        publisher: Arc<P>,
        runner: R,
        topics: Topics,
    ) -> Self {
        Self {
            scheduler,
            publisher,
            runner,
            topics,
        }
    }

    /// Parse and start a raw inbound message. Topics outside the two inbound
    /// namespaces yield `None`.
    ///
    /// Commands are resolved and handed to the runner before this returns, so
    /// calling it in arrival order runs actions in arrival order.
    pub fn accept(&self, topic: &str, payload: &[u8]) -> Option<Followup> {
        let Some((namespace, leaf)) = self.topics.parse(topic) else {
            debug!("Ignoring message on {}", topic);
            return None;
        };
        let payload = String::from_utf8_lossy(payload);
        debug!("{}/{} <- {:?}", namespace.as_str(), leaf, payload);

        Some(self.begin(namespace, &leaf, &payload))
    }

    /// The synchronous half of routing: validate, and run the action if any.
    /// `leaf` must already be lower-cased.
    pub fn begin(&self, namespace: Namespace, leaf: &str, payload: &str) -> Followup {
        let followup = match namespace {
            Namespace::Cmd => self.begin_cmd(leaf, payload),
            Namespace::Get => Followup::Get(leaf.to_string()),
        };

        if let Followup::Done(outcome) = &followup {
            match outcome {
                RouteOutcome::Dispatched => {}
                RouteOutcome::Rejected(reason) => {
                    warn!(
                        "Rejected {}/{} ({:?}): {:?}",
                        namespace.as_str(),
                        leaf,
                        payload,
                        reason
                    );
                }
                RouteOutcome::Unknown => warn!("Unknown command {:?}", leaf),
            }
        }
        followup
    }

    /// The asynchronous half of routing: probe and publish.
    pub async fn finish(&self, followup: Followup) -> RouteOutcome {
        match followup {
            Followup::Done(outcome) => outcome,
            Followup::Refresh => {
                self.scheduler.refresh_now().await;
                RouteOutcome::Dispatched
            }
            Followup::CommandHelp => {
                self.publish(self.topics.available_commands(), commands_listing())
                    .await;
                self.publish(
                    self.topics.available_commands_with_params(),
                    commands_with_params_listing(),
                )
                .await;
                RouteOutcome::Dispatched
            }
            Followup::Get(leaf) => {
                let outcome = self.route_get(&leaf).await;
                if let RouteOutcome::Rejected(reason) = &outcome {
                    warn!("Rejected get/{}: {:?}", leaf, reason);
                }
                outcome
            }
        }
    }

    fn begin_cmd(&self, leaf: &str, payload: &str) -> Followup {
        match command::resolve(leaf, payload) {
            Resolved::Help => Followup::CommandHelp,
            Resolved::Run(action) => {
                info!("Dispatching {}", leaf);
                self.runner.run(action);
                Followup::Refresh
            }
            Resolved::Rejected(reason) => Followup::Done(RouteOutcome::Rejected(reason)),
            Resolved::Unknown => Followup::Done(RouteOutcome::Unknown),
        }
    }

    async fn route_get(&self, leaf: &str) -> RouteOutcome {
        if leaf == GET_HELP {
            self.publish(self.topics.available_attributes(), Attribute::help_listing())
                .await;
            return RouteOutcome::Dispatched;
        }

        let requested = if leaf == GET_ALL {
            None
        } else {
            match Attribute::from_name(leaf) {
                Some(attribute) => Some(attribute),
                None => return RouteOutcome::Rejected(Rejection::UnknownAttribute),
            }
        };

        let map = match self.scheduler.snapshot().await {
            Ok(map) => map,
            Err(e) => {
                debug!("Probe for get/{} failed: {}", leaf, e);
                return RouteOutcome::Rejected(Rejection::PlayerUnreachable);
            }
        };

        match requested {
            None => {
                if let Err(e) = self.scheduler.publish_map(&map).await {
                    warn!("Failed to publish status: {}", e);
                }
                RouteOutcome::Dispatched
            }
            Some(attribute) => match map.get(attribute) {
                Some(value) => {
                    self.publish(self.topics.attribute(attribute), value.to_string())
                        .await;
                    RouteOutcome::Dispatched
                }
                None => RouteOutcome::Rejected(Rejection::AttributeUnavailable),
            },
        }
    }

    async fn publish(&self, topic: String, payload: String) {
        if let Err(e) = self.publisher.publish(topic, payload, false).await {
            warn!("Failed to publish response: {}", e);
        }
    }
}
