//! Backward walk over reply chains to find the `/run` event a `/rerun` refers to.
//!
//! Relay data is untrusted: any participant can publish crafted reply chains.
//! The walk is bounded by a hop budget and a visited set local to each call,
//! and hops are strictly sequential since each depends on the previous one.

use std::collections::HashSet;

use runbot_commands::is_run_command;
use runbot_events::{Event, Filter};

use crate::{RelayError, RelaySource, Subscription, SubscriptionMessage};

/// Fetches the event that `event` replies to, using its last `e` tag.
///
/// Returns `Ok(None)` when `event` has no reference or the relay has no matching
/// stored event. The per-hop subscription is closed on every path.
pub async fn get_source_event<R>(relay: &R, event: &Event) -> Result<Option<Event>, RelayError>
where
    R: RelaySource + ?Sized,
{
    let Some(parent_id) = event.last_event_reference() else {
        return Ok(None);
    };
    let mut subscription = relay.subscribe(vec![Filter::new().id(parent_id)]).await?;
    let outcome = first_matching_event(&mut subscription, parent_id).await;
    subscription.close();
    outcome
}

async fn first_matching_event(
    subscription: &mut Subscription,
    wanted_id: &str,
) -> Result<Option<Event>, RelayError> {
    loop {
        match subscription.recv().await {
            Some(SubscriptionMessage::Event(candidate)) if candidate.id == wanted_id => {
                return Ok(Some(candidate));
            }
            Some(SubscriptionMessage::Event(candidate)) => {
                tracing::debug!(
                    wanted = wanted_id,
                    received = %candidate.id,
                    "ignoring event that does not match the requested id"
                );
            }
            Some(SubscriptionMessage::EndOfStoredEvents) => return Ok(None),
            Some(SubscriptionMessage::Closed(message)) => {
                return Err(RelayError::SubscriptionClosed(message));
            }
            None => return Err(RelayError::ConnectionClosed),
        }
    }
}

/// Walks back from `start_event` until an ancestor whose content is a `/run` command.
///
/// Gives up with `Ok(None)` when the chain ends, loops back on itself, or
/// `max_hops` lookups find nothing. `on_hop` sees each newly visited ancestor
/// with its 1-based hop number and does not influence the walk.
pub async fn resolve_source_run_event<R>(
    relay: &R,
    start_event: &Event,
    max_hops: usize,
    mut on_hop: Option<&mut (dyn FnMut(usize, &Event) + Send)>,
) -> Result<Option<Event>, RelayError>
where
    R: RelaySource + ?Sized,
{
    let mut visited = HashSet::from([start_event.id.clone()]);
    let mut current = start_event.clone();

    for hop in 1..=max_hops {
        let Some(ancestor) = get_source_event(relay, &current).await? else {
            tracing::debug!(start = %start_event.id, hop, "reply chain has no further ancestor");
            return Ok(None);
        };
        if !visited.insert(ancestor.id.clone()) {
            tracing::debug!(start = %start_event.id, hop, revisited = %ancestor.id, "reply chain cycle");
            return Ok(None);
        }
        if let Some(observer) = on_hop.as_deref_mut() {
            observer(hop, &ancestor);
        }
        if is_run_command(&ancestor.content) {
            return Ok(Some(ancestor));
        }
        current = ancestor;
    }

    tracing::debug!(start = %start_event.id, max_hops, "reply chain hop budget exhausted");
    Ok(None)
}
