use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Kind used for plain text notes and replies.
pub const KIND_TEXT_NOTE: u32 = 1;
/// Tag discriminator referencing another event.
pub const TAG_EVENT: &str = "e";
/// Tag discriminator referencing an author public key.
pub const TAG_PUBKEY: &str = "p";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// One entry of an event tag list. The first element is the discriminator.
pub struct Tag(Vec<String>);

impl Tag {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn event(id: &str) -> Self {
        Self::new([TAG_EVENT, id])
    }

    pub fn pubkey(pubkey: &str) -> Self {
        Self::new([TAG_PUBKEY, pubkey])
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Returns the tag payload that follows the discriminator.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Signed, content-addressed message unit received from or published to a relay.
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub content: String,
    pub sig: String,
}

impl Event {
    /// Iterates the payload of every tag whose discriminator equals `discriminator`, in order.
    pub fn tag_values<'a>(&'a self, discriminator: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.kind() == Some(discriminator))
            .filter_map(Tag::value)
    }

    pub fn event_references(&self) -> Vec<&str> {
        self.tag_values(TAG_EVENT).collect()
    }

    /// Later-listed `e` tags win: the last reference is the replied-to event.
    pub fn last_event_reference(&self) -> Option<&str> {
        self.tag_values(TAG_EVENT).last()
    }

    pub fn pubkey_references(&self) -> Vec<&str> {
        self.tag_values(TAG_PUBKEY).collect()
    }

    /// Returns true when `id` is the canonical digest of the event fields.
    pub fn has_valid_id(&self) -> bool {
        compute_event_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        ) == self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Event fields prior to signing; the signer supplies `id`, `pubkey` and `sig`.
pub struct UnsignedEvent {
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Tag>,
    pub content: String,
}

/// Lowercase hex SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
pub fn compute_event_id(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> String {
    let canonical = json!([0, pubkey, created_at, kind, tags, content]);
    format!("{:x}", Sha256::digest(canonical.to_string().as_bytes()))
}
