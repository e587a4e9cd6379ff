//! Login credentials referenced by a host.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

/// User name used when the configuration does not name one.
pub const DEFAULT_USER: &str = "root";

/// Credentials used to open a remote session to a host.
///
/// The password, when present, is held as a [`SecretString`] and never shows
/// up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    /// Remote login name
    pub user: String,
    /// Path to an SSH private key (tilde already expanded)
    pub identity_file: Option<PathBuf>,
    /// Password for `sshpass` authentication
    pub password: Option<SecretString>,
}

impl Credentials {
    /// Creates credentials for the given user with key/agent authentication.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            identity_file: None,
            password: None,
        }
    }

    /// Sets the identity file, expanding a leading `~` and environment
    /// variables.
    #[must_use]
    pub fn with_identity_file(mut self, path: &str) -> Self {
        let expanded = shellexpand::full(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        self.identity_file = Some(PathBuf::from(expanded));
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Returns true if commands for this user need privilege escalation.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.user == "root"
    }

    /// Returns the password in clear text, for handing to `sshpass`.
    #[must_use]
    pub fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USER)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("identity_file", &self.identity_file)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_password() {
        let creds = Credentials::new("admin").with_password(SecretString::from("hunter2"));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));
        assert_eq!(creds.password_str(), Some("hunter2"));
    }

    #[test]
    fn test_root_detection() {
        assert!(Credentials::default().is_root());
        assert!(!Credentials::new("operator").is_root());
    }

    #[test]
    fn test_identity_file_plain_path() {
        let creds = Credentials::new("root").with_identity_file("/etc/keys/id_ed25519");
        assert_eq!(
            creds.identity_file,
            Some(PathBuf::from("/etc/keys/id_ed25519"))
        );
    }
}
