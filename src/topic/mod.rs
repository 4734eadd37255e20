//! Topic naming
//!
//! Maps free-form hashtag input onto the canonical tag segment used in
//! topic names, and joins it with the shared base prefix. Everything here is
//! pure; a `HashtagTopic` is derived at the moment of use and never cached.

pub mod naming;

pub use naming::{HashtagTopic, canonicalize, full_topic};
