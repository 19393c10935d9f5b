//! Identity - workflow item の同一性キー
//!
//! Activities are keyed by `(name, version, positional_name)`. Timers and
//! action nodes are keyed by name alone; their version and positional name
//! stay empty.

use super::ids::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    positional_name: String,
}

impl Identity {
    /// Activity identity with an empty positional name.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_positional_name(name, version, "")
    }

    /// Activity identity distinguishing several uses of the same activity type.
    pub fn with_positional_name(
        name: impl Into<String>,
        version: impl Into<String>,
        positional_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            positional_name: positional_name.into(),
        }
    }

    /// Name-only identity, used by timers and action nodes.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_positional_name(name, "", "")
    }

    /// Same as [`Identity::named`].
    pub fn timer(name: impl Into<String>) -> Self {
        Self::named(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn positional_name(&self) -> &str {
        &self.positional_name
    }

    pub fn is_name_only(&self) -> bool {
        self.version.is_empty() && self.positional_name.is_empty()
    }

    /// Wire id: the bare name for name-only identities, `name:version:positional` otherwise.
    pub fn id(&self) -> ItemId {
        if self.is_name_only() {
            ItemId::new(self.name.clone())
        } else {
            ItemId::new(format!(
                "{}:{}:{}",
                self.name, self.version, self.positional_name
            ))
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        if !self.positional_name.is_empty() {
            write!(f, "#{}", self.positional_name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn positional_name_distinguishes_activities_of_the_same_type() {
        let first = Identity::with_positional_name("Download", "1.0", "First");
        let second = Identity::with_positional_name("Download", "1.0", "Second");
        assert_ne!(first, second);
        assert_ne!(first.id(), second.id());

        let set: HashSet<_> = [first.clone(), first.clone(), second].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn timers_are_keyed_by_name_only() {
        let timer = Identity::timer("wait");
        assert!(timer.is_name_only());
        assert_eq!(timer.id().as_str(), "wait");
        assert_eq!(timer, Identity::named("wait"));
    }

    #[test]
    fn activity_id_joins_all_three_fields() {
        assert_eq!(Identity::new("Download", "1.0").id().as_str(), "Download:1.0:");
        assert_eq!(
            Identity::with_positional_name("Download", "1.0", "First").id().as_str(),
            "Download:1.0:First"
        );
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Identity::new("Download", "1.0").to_string(), "Download@1.0");
        assert_eq!(Identity::timer("wait").to_string(), "wait");
    }
}
