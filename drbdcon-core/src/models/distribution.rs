//! Distribution fingerprints used to pick command variants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One level of the command-table fallback chain.
///
/// Scopes are ordered from most to least specific by
/// [`DistributionKey::lookup_scopes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupScope {
    /// Family, version and architecture, e.g. `debian:12:x86_64`
    Exact {
        /// Distribution family
        family: String,
        /// Distribution version
        version: String,
        /// CPU architecture
        arch: String,
    },
    /// Family and version, e.g. `debian:12`
    Version {
        /// Distribution family
        family: String,
        /// Distribution version
        version: String,
    },
    /// Family only, e.g. `debian`
    Family(String),
    /// The generic default entry
    Generic,
}

impl LookupScope {
    /// Returns the table key for this scope as used in command files.
    #[must_use]
    pub fn table_key(&self) -> String {
        match self {
            Self::Exact {
                family,
                version,
                arch,
            } => format!("{family}:{version}:{arch}"),
            Self::Version { family, version } => format!("{family}:{version}"),
            Self::Family(family) => family.clone(),
            Self::Generic => "default".to_string(),
        }
    }

    /// Parses a table key back into a scope.
    ///
    /// Keys are case-insensitive; `default` and `generic` both name the
    /// generic scope.
    #[must_use]
    pub fn from_table_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        if key == "default" || key == "generic" {
            return Some(Self::Generic);
        }
        let parts: Vec<&str> = key.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        match parts.as_slice() {
            [family] => Some(Self::Family((*family).to_string())),
            [family, version] => Some(Self::Version {
                family: (*family).to_string(),
                version: (*version).to_string(),
            }),
            [family, version, arch] => Some(Self::Exact {
                family: (*family).to_string(),
                version: (*version).to_string(),
                arch: (*arch).to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for LookupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_key())
    }
}

/// A host's OS family, version and architecture.
///
/// Family, version and architecture are normalized to lowercase so that
/// `Debian` and `debian` select the same table entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionKey {
    /// OS family (`debian`, `redhat`, `suse`, ...)
    pub family: Option<String>,
    /// Distribution version (`12`, `9`, ...)
    pub version: Option<String>,
    /// CPU architecture (`x86_64`, `aarch64`, ...)
    pub arch: Option<String>,
}

impl DistributionKey {
    /// Creates a key with a family and optional version and architecture.
    #[must_use]
    pub fn new(family: &str, version: Option<&str>, arch: Option<&str>) -> Self {
        Self {
            family: normalize(Some(family)),
            version: normalize(version),
            arch: normalize(arch),
        }
    }

    /// A key that only matches generic command entries.
    #[must_use]
    pub fn generic() -> Self {
        Self::default()
    }

    /// Returns the fallback chain, most specific first.
    ///
    /// Levels whose components are unknown are skipped; the generic scope is
    /// always last.
    #[must_use]
    pub fn lookup_scopes(&self) -> Vec<LookupScope> {
        let mut scopes = Vec::with_capacity(4);
        if let Some(family) = &self.family {
            if let Some(version) = &self.version {
                if let Some(arch) = &self.arch {
                    scopes.push(LookupScope::Exact {
                        family: family.clone(),
                        version: version.clone(),
                        arch: arch.clone(),
                    });
                }
                scopes.push(LookupScope::Version {
                    family: family.clone(),
                    version: version.clone(),
                });
            }
            scopes.push(LookupScope::Family(family.clone()));
        }
        scopes.push(LookupScope::Generic);
        scopes
    }
}

impl fmt::Display for DistributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lookup_scopes().first() {
            Some(scope) => write!(f, "{scope}"),
            None => f.write_str("default"),
        }
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_scopes_most_specific_first() {
        let key = DistributionKey::new("Debian", Some("12"), Some("x86_64"));
        let scopes: Vec<String> = key.lookup_scopes().iter().map(|s| s.table_key()).collect();
        assert_eq!(
            scopes,
            vec!["debian:12:x86_64", "debian:12", "debian", "default"]
        );
    }

    #[test]
    fn test_missing_version_skips_versioned_scopes() {
        let key = DistributionKey::new("suse", None, Some("x86_64"));
        let scopes: Vec<String> = key.lookup_scopes().iter().map(|s| s.table_key()).collect();
        assert_eq!(scopes, vec!["suse", "default"]);
    }

    #[test]
    fn test_generic_key() {
        assert_eq!(
            DistributionKey::generic().lookup_scopes(),
            vec![LookupScope::Generic]
        );
        assert_eq!(DistributionKey::generic().to_string(), "default");
    }

    #[test]
    fn test_table_key_parsing() {
        assert_eq!(
            LookupScope::from_table_key("RedHat:9"),
            Some(LookupScope::Version {
                family: "redhat".into(),
                version: "9".into()
            })
        );
        assert_eq!(
            LookupScope::from_table_key("generic"),
            Some(LookupScope::Generic)
        );
        assert_eq!(LookupScope::from_table_key("a:b:c:d"), None);
        assert_eq!(LookupScope::from_table_key("debian::x86_64"), None);
    }

    #[test]
    fn test_blank_components_are_unknown() {
        let key = DistributionKey::new("ubuntu", Some("  "), None);
        assert_eq!(key.version, None);
    }
}
