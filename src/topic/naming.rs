use std::fmt;

use crate::utils::InvalidTopic;

/// A canonical hashtag: no surrounding whitespace, no leading `#` marker,
/// never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashtagTopic(String);

impl HashtagTopic {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully-qualified topic under `base`, e.g. `class/mqtt_twitter/hashtags/Sports`.
    pub fn under(&self, base: &str) -> String {
        full_topic(base, self)
    }
}

impl fmt::Display for HashtagTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HashtagTopic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trims `raw` and strips one leading `#`.
///
/// Only a single marker is removed: `"##tag"` canonicalizes to `"#tag"`.
pub fn canonicalize(raw: &str) -> Result<HashtagTopic, InvalidTopic> {
    let trimmed = raw.trim();
    let tag = trimmed.strip_prefix('#').unwrap_or(trimmed);

    if tag.is_empty() {
        return Err(InvalidTopic {
            raw: raw.to_string(),
        });
    }

    Ok(HashtagTopic(tag.to_string()))
}

/// `base + "/" + tag`, with no further normalisation of either side.
pub fn full_topic(base: &str, tag: &HashtagTopic) -> String {
    format!("{base}/{}", tag.as_str())
}
