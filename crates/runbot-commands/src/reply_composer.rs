use runbot_events::{Event, EventSigner, SigningError, Tag, UnsignedEvent, KIND_TEXT_NOTE};

/// Builds and signs a text note replying to `target`.
///
/// The reply is timestamped one second after the target so it always sorts
/// after the event it answers, whatever the local clock says.
pub fn compose_reply_post(
    content: &str,
    target: &Event,
    signer: &dyn EventSigner,
) -> Result<Event, SigningError> {
    signer.sign(UnsignedEvent {
        created_at: target.created_at.saturating_add(1),
        kind: KIND_TEXT_NOTE,
        tags: vec![Tag::event(&target.id), Tag::pubkey(&target.pubkey)],
        content: content.to_string(),
    })
}
