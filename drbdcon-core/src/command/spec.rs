//! Immutable description of one command invocation.

use crate::models::DistributionKey;

/// A symbolic command name with its substitutions and distribution key.
///
/// Built fresh for every invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    name: String,
    substitutions: Vec<(String, String)>,
    distribution: DistributionKey,
}

impl CommandSpec {
    /// Creates a spec without substitutions.
    #[must_use]
    pub fn new(name: impl Into<String>, distribution: DistributionKey) -> Self {
        Self {
            name: name.into(),
            substitutions: Vec::new(),
            distribution,
        }
    }

    /// Creates a spec with the given substitutions.
    #[must_use]
    pub fn build(
        name: impl Into<String>,
        substitutions: &[(String, String)],
        distribution: DistributionKey,
    ) -> Self {
        Self {
            name: name.into(),
            substitutions: substitutions.to_vec(),
            distribution,
        }
    }

    /// Appends a `(placeholder, value)` pair.
    ///
    /// The placeholder is given without the surrounding `@`.
    #[must_use]
    pub fn with(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.substitutions.push((placeholder.into(), value.into()));
        self
    }

    /// Symbolic command name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Substitutions in insertion order
    pub fn substitutions(&self) -> &[(String, String)] {
        &self.substitutions
    }

    /// Distribution key the command resolves against
    pub const fn distribution(&self) -> &DistributionKey {
        &self.distribution
    }
}
