//! # Process Identity
//!
//! One asymmetric keypair per process, loaded from disk on start or
//! generated and persisted if absent.

use crate::envelope::RECIPIENT_PREFIX;
use crate::error::{SecureError, SecureResult};
use secrecy::{ExposeSecret, Secret};
use std::io::Write;
use std::path::Path;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

const TOOL_NAME: &str = "conductor-secure";

/// A loaded or freshly generated process identity: a private scalar and its
/// derived public "recipient" string (`agent1` followed by lowercase hex).
#[derive(Clone)]
pub struct Identity {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public", &self.recipient())
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// The public recipient string: `agent1` prefixed to the lowercase-hex
    /// encoded X25519 public key.
    pub fn recipient(&self) -> String {
        format!("{RECIPIENT_PREFIX}{}", hex::encode(self.public.as_bytes()))
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Load the identity from `path`; if absent, generate one and persist it
    /// with file mode 0600 and parent directory mode 0700.
    pub fn load_or_generate(path: &Path) -> SecureResult<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let identity = Self::generate();
        identity.persist(path)?;
        Ok(identity)
    }

    fn load(path: &Path) -> SecureResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let secret_line = contents
            .lines()
            .find(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
            .ok_or_else(|| SecureError::CorruptPayload {
                reason: "identity file has no secret line".into(),
            })?;

        // Held as a `secrecy::Secret` for the brief window between reading
        // the file and parsing it, so it never lands in a Debug impl or a
        // panic message by accident.
        let secret_hex: Secret<String> = Secret::new(secret_line.trim().to_string());

        let mut bytes = hex::decode(secret_hex.expose_secret()).map_err(|e| SecureError::CorruptPayload {
            reason: format!("identity secret is not valid hex: {e}"),
        })?;
        let array: [u8; 32] = bytes.clone().try_into().map_err(|_| SecureError::CorruptPayload {
            reason: "identity secret must be 32 bytes".into(),
        })?;
        bytes.zeroize();

        let secret = StaticSecret::from(array);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    fn persist(&self, path: &Path) -> SecureResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            set_permissions(parent, 0o700)?;
        }

        let body = format!(
            "# created: {TOOL_NAME}\n# public key: {}\n{}\n",
            self.recipient(),
            hex::encode(self.secret.to_bytes())
        );

        let mut file = std::fs::File::create(path)?;
        file.write_all(body.as_bytes())?;
        set_permissions(path, 0o600)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> SecureResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> SecureResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_and_persists_then_reloads_identically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/identity");

        let first = Identity::load_or_generate(&path).unwrap();
        let reloaded = Identity::load_or_generate(&path).unwrap();

        assert_eq!(first.recipient(), reloaded.recipient());
    }

    #[test]
    fn persisted_file_has_comment_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity");
        let identity = Identity::load_or_generate(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# created:"));
        assert!(contents.contains(&identity.recipient()));
    }

    #[cfg(unix)]
    #[test]
    fn persisted_file_is_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("identity");
        Identity::load_or_generate(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
