//! Template lookup with distribution fallback and `@TOKEN@` substitution.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::{CommandSpec, CommandTable, ResolveError, ResolveResult};
use crate::models::{DistributionKey, Host, LookupScope};

/// Prefix used to run a command with root privileges without prompting
const SUDO_PREFIX: &str = "sudo -n sh -c";

/// Matches `@NAME@` placeholders
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z][A-Za-z0-9_-]*)@").expect("PLACEHOLDER_REGEX is a valid regex pattern")
});

/// Resolves symbolic command names into shell commands.
///
/// Resolution is a pure function of the table contents and its arguments, so
/// a resolver can be shared freely between tasks.
#[derive(Clone)]
pub struct CommandResolver {
    table: Arc<dyn CommandTable>,
    escalate: bool,
}

impl std::fmt::Debug for CommandResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResolver")
            .field("commands", &self.table.names().len())
            .field("escalate", &self.escalate)
            .finish()
    }
}

impl CommandResolver {
    /// Creates a resolver over the given table.
    #[must_use]
    pub fn new(table: Arc<dyn CommandTable>) -> Self {
        Self {
            table,
            escalate: false,
        }
    }

    /// Wraps commands for non-root users in `sudo -n` when enabled.
    #[must_use]
    pub const fn with_privilege_escalation(mut self, escalate: bool) -> Self {
        self.escalate = escalate;
        self
    }

    /// Finds the template for `name`, walking the fallback chain of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnresolvedCommand`] if no scope has an entry.
    pub fn template(
        &self,
        name: &str,
        key: &DistributionKey,
    ) -> ResolveResult<(LookupScope, &str)> {
        let scopes = key.lookup_scopes();
        for scope in &scopes {
            if let Some(template) = self.table.lookup(name, scope) {
                return Ok((scope.clone(), template));
            }
        }
        Err(ResolveError::UnresolvedCommand {
            name: name.to_string(),
            distribution: key.to_string(),
        })
    }

    /// Resolves `name` for `key`, replacing every `@TOKEN@` placeholder.
    ///
    /// When a placeholder appears more than once in `substitutions` the last
    /// value wins. Values are inserted verbatim and are not scanned for
    /// further placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnresolvedCommand`] when the table has no entry
    /// and [`ResolveError::MissingSubstitution`] for the first placeholder
    /// without a value.
    pub fn resolve(
        &self,
        name: &str,
        substitutions: &[(String, String)],
        key: &DistributionKey,
    ) -> ResolveResult<String> {
        let (scope, template) = self.template(name, key)?;
        let command = substitute(name, template, substitutions)?;
        tracing::trace!(command_name = name, scope = %scope, "Resolved command");
        Ok(command)
    }

    /// Resolves a prepared [`CommandSpec`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`].
    pub fn resolve_spec(&self, spec: &CommandSpec) -> ResolveResult<String> {
        self.resolve(spec.name(), spec.substitutions(), spec.distribution())
    }

    /// Resolves `name` for a host, using its current distribution key.
    ///
    /// With privilege escalation enabled and a non-root login, the command
    /// is wrapped as `sudo -n sh -c '<command>'`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`].
    pub fn resolve_for_host(
        &self,
        name: &str,
        substitutions: &[(String, String)],
        host: &Host,
    ) -> ResolveResult<String> {
        let command = self.resolve(name, substitutions, &host.distribution_key())?;
        if self.escalate && !host.credentials().is_root() {
            return Ok(format!("{SUDO_PREFIX} {}", shell_quote(&command)));
        }
        Ok(command)
    }

    /// Returns the names the underlying table knows about.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.table.names()
    }
}

fn substitute(
    name: &str,
    template: &str,
    substitutions: &[(String, String)],
) -> ResolveResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER_REGEX.captures_iter(template) {
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = substitutions
            .iter()
            .rev()
            .find(|(placeholder, _)| placeholder == token.as_str())
            .map(|(_, value)| value.as_str())
            .ok_or_else(|| ResolveError::MissingSubstitution {
                name: name.to_string(),
                placeholder: token.as_str().to_string(),
            })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Quotes `s` as a single POSIX shell word.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
