//! Command tables: `(name, scope) -> template` lookups.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::{CommandFileError, names};
use crate::models::LookupScope;

/// Lookup of command templates by symbolic name and distribution scope.
///
/// Implementations must be pure lookups; the resolver walks the fallback
/// chain itself.
pub trait CommandTable: Send + Sync {
    /// Returns the template stored for `name` at exactly `scope`.
    fn lookup(&self, name: &str, scope: &LookupScope) -> Option<&str>;

    /// Returns every command name in the table, sorted.
    fn names(&self) -> Vec<String>;
}

/// In-memory command table.
#[derive(Debug, Clone, Default)]
pub struct StaticCommandTable {
    entries: HashMap<String, HashMap<LookupScope, String>>,
}

#[derive(Debug, Deserialize)]
struct CommandFile {
    #[serde(default)]
    commands: HashMap<String, HashMap<String, String>>,
}

const HOST_INFO_CMD: &str = concat!(
    "echo \"hostname: $(hostname)\";",
    "echo \"kernel-version: $(uname -r)\";",
    "echo \"arch: $(uname -m)\";",
    "if [ -r /etc/os-release ]; then . /etc/os-release; fi;",
    "echo \"distribution: ${ID:-}\";",
    "echo \"distribution-version: ${VERSION_ID:-}\";",
    "echo \"drbd-version: $(drbdadm --version 2>/dev/null | sed -n 's/^DRBDADM_VERSION=//p')\"",
);

const BLOCK_DEVICES_CMD: &str = concat!(
    "lsblk -rnb -o NAME,SIZE,TYPE,FSTYPE,MOUNTPOINT 2>/dev/null | ",
    "while read -r name size type fs mp; do ",
    "printf 'device: /dev/%s\\nsize: %s\\ntype: %s\\nfstype: %s\\nmountpoint: %s\\n\\n' ",
    "\"$name\" \"$size\" \"$type\" \"$fs\" \"$mp\"; done",
);

const DRBD_STATUS_CMD: &str = concat!(
    "drbdsetup events2 --now --statistics 2>/dev/null | awk '",
    "{ delete kv; for (i = 3; i <= NF; i++) { p = index($i, \":\"); ",
    "if (p > 0) kv[substr($i, 1, p - 1)] = substr($i, p + 1) } } ",
    "$1 == \"exists\" && $2 == \"resource\" { role[kv[\"name\"]] = kv[\"role\"] } ",
    "$1 == \"exists\" && $2 == \"device\" { k = kv[\"name\"] SUBSEP kv[\"volume\"]; ",
    "dev[k] = 1; minor[k] = kv[\"minor\"]; disk[k] = kv[\"disk\"] } ",
    "$1 == \"exists\" && $2 == \"peer-device\" { k = kv[\"name\"] SUBSEP kv[\"volume\"]; ",
    "repl[k] = kv[\"replication\"]; pdisk[k] = kv[\"peer-disk\"]; pct[k] = kv[\"done\"] } ",
    "END { for (k in dev) { split(k, p, SUBSEP); ",
    "printf \"resource: %s\\nvolume: %s\\nminor: %s\\nrole: %s\\ndisk: %s\\n",
    "peer-disk: %s\\nreplication: %s\\nsync-percent: %s\\n\\n\", ",
    "p[1], p[2], minor[k], role[p[1]], disk[k], pdisk[k], repl[k], pct[k] } }'",
);

const VM_DOMAINS_CMD: &str = concat!(
    "echo '<vms>';",
    "for d in $(virsh list --all --name 2>/dev/null); do ",
    "echo \"<vm state=\\\"$(virsh domstate \"$d\")\\\" ",
    "autostart=\\\"$(virsh dominfo \"$d\" | awk '/^Autostart:/ { print (($2 == \"enable\") ? \"yes\" : \"no\") }')\\\">\";",
    "virsh dumpxml \"$d\"; echo '</vm>'; done;",
    "echo '</vms>'",
);

const VNC_DISPLAYS_CMD: &str = concat!(
    "for d in $(virsh list --name 2>/dev/null); do ",
    "echo \"domain: $d\"; ",
    "echo \"display: $(virsh vncdisplay \"$d\" 2>/dev/null)\"; echo; done",
);

impl StaticCommandTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the generic variants of the built-in
    /// inspection commands.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.insert(names::HOST_INFO, LookupScope::Generic, HOST_INFO_CMD);
        table.insert(names::BLOCK_DEVICES, LookupScope::Generic, BLOCK_DEVICES_CMD);
        table.insert(names::DRBD_CONFIG, LookupScope::Generic, "drbdadm dump-xml");
        table.insert(names::DRBD_STATUS, LookupScope::Generic, DRBD_STATUS_CMD);
        table.insert(names::VM_DOMAINS, LookupScope::Generic, VM_DOMAINS_CMD);
        table.insert(names::VNC_DISPLAYS, LookupScope::Generic, VNC_DISPLAYS_CMD);
        table
    }

    /// Adds or replaces the template for `name` at `scope`.
    pub fn insert(&mut self, name: &str, scope: LookupScope, template: impl Into<String>) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .insert(scope, template.into());
    }

    /// Merges the `[commands.*]` tables of a TOML document into this table.
    ///
    /// Entries from the document override existing ones at the same scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a scope key is
    /// malformed.
    pub fn merge_toml(&mut self, content: &str) -> Result<usize, CommandFileError> {
        let file: CommandFile = toml::from_str(content)?;
        self.merge_entries(file.commands)
    }

    /// Loads a command file from disk and merges it into this table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn merge_file(&mut self, path: &Path) -> Result<usize, CommandFileError> {
        let content = std::fs::read_to_string(path)?;
        let count = self.merge_toml(&content)?;
        tracing::debug!(path = %path.display(), entries = count, "Loaded command file");
        Ok(count)
    }

    /// Merges already-deserialized `name -> (scope key -> template)` entries.
    ///
    /// # Errors
    ///
    /// Returns [`CommandFileError::InvalidScope`] for a malformed scope key;
    /// the table is left unchanged in that case.
    pub fn merge_entries(
        &mut self,
        entries: HashMap<String, HashMap<String, String>>,
    ) -> Result<usize, CommandFileError> {
        let mut validated = Vec::new();
        for (name, variants) in entries {
            for (key, template) in variants {
                let Some(scope) = LookupScope::from_table_key(&key) else {
                    return Err(CommandFileError::InvalidScope { name, key });
                };
                validated.push((name.clone(), scope, template));
            }
        }
        let count = validated.len();
        for (name, scope, template) in validated {
            self.insert(&name, scope, template);
        }
        Ok(count)
    }

    /// Number of templates across all names and scopes
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Returns true if the table has no templates
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CommandTable for StaticCommandTable {
    fn lookup(&self, name: &str, scope: &LookupScope) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|variants| variants.get(scope))
            .map(String::as_str)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_inspection_commands() {
        let table = StaticCommandTable::with_defaults();
        for name in [
            names::HOST_INFO,
            names::BLOCK_DEVICES,
            names::DRBD_CONFIG,
            names::DRBD_STATUS,
            names::VM_DOMAINS,
            names::VNC_DISPLAYS,
        ] {
            assert!(
                table.lookup(name, &LookupScope::Generic).is_some(),
                "missing default for {name}"
            );
        }
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_merge_toml_overrides_and_adds() {
        let mut table = StaticCommandTable::with_defaults();
        let count = table
            .merge_toml(
                r#"
[commands.DrbdConfig]
default = "drbdadm -d dump-xml"
"redhat:9" = "/usr/sbin/drbdadm dump-xml"

[commands.Reboot]
default = "systemctl reboot"
"#,
            )
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(
            table.lookup(names::DRBD_CONFIG, &LookupScope::Generic),
            Some("drbdadm -d dump-xml")
        );
        assert_eq!(
            table.lookup(
                names::DRBD_CONFIG,
                &LookupScope::Version {
                    family: "redhat".into(),
                    version: "9".into()
                }
            ),
            Some("/usr/sbin/drbdadm dump-xml")
        );
        assert!(table.names().contains(&"Reboot".to_string()));
    }

    #[test]
    fn test_merge_toml_rejects_bad_scope() {
        let mut table = StaticCommandTable::new();
        let err = table
            .merge_toml("[commands.X]\n\"a:b:c:d\" = \"true\"\n")
            .unwrap_err();
        assert!(matches!(err, CommandFileError::InvalidScope { .. }));
    }

    #[test]
    fn test_bad_scope_leaves_table_unchanged() {
        let mut table = StaticCommandTable::with_defaults();
        let before = table.len();
        let content = "[commands.A]\ndefault = \"a\"\ndebian = \"a-deb\"\n\
                       [commands.B]\ndefault = \"b\"\n\"x:y:z:w\" = \"bad\"\n\
                       [commands.C]\ndefault = \"c\"\n";
        for _ in 0..8 {
            assert!(table.merge_toml(content).is_err());
            assert_eq!(table.len(), before);
            assert!(!table.names().iter().any(|n| n == "A" || n == "C"));
        }
    }

    #[test]
    fn test_merge_toml_rejects_invalid_toml() {
        let mut table = StaticCommandTable::new();
        assert!(matches!(
            table.merge_toml("[commands.X"),
            Err(CommandFileError::Parse(_))
        ));
    }
}
