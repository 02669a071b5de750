use std::collections::HashMap;

use smallvec::SmallVec;

/// `tag -> value` assignments carried alongside an object through `queueTagged`.
///
/// Most producers attach zero or one tag, so a plain `HashMap` (rather than
/// anything ordered) is the right shape: lookups by tag name dominate, and
/// the Lua scripts serialize this as a `cjson` object, which has no concept
/// of key order either.
pub type Tags = HashMap<String, String>;

/// A batch of objects as held by a single claim.
///
/// Untagged claims almost always hold exactly one object; tagged claims can
/// hold many. `SmallVec` avoids a heap allocation for the common case
/// without giving up `Vec`'s growth behavior for the tagged one.
pub type ObjectBatch = SmallVec<[String; 1]>;

/// Seed objects a processor wants (re-)queued immediately before every claim
/// attempt it makes - the "seed & claim" idiom for self-priming processors.
#[derive(Debug, Clone, Default)]
pub struct QueueSeed {
    pub objects: Vec<String>,
    pub tags: Tags,
}

impl QueueSeed {
    pub fn new(objects: Vec<String>) -> Self {
        Self {
            objects,
            tags: Tags::default(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// The raw result of a `claim` script invocation, before it is wrapped into
/// one or more [`crate::claim::Claim`]s by [`crate::pool::ObjectPool`].
#[derive(Debug, Clone)]
pub struct ClaimedBatch {
    pub session: String,
    pub objects: Vec<String>,
}
