use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("error writing key to '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error reading secret key '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error decoding secret key '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// Generate the server's Ed25519 signing keypair and write it to files.
///
/// Writes `<prefix>.secret` (base64-encoded 32-byte seed) and
/// `<prefix>.pub` (base64-encoded 32-byte verifying key).
/// Sets .secret file permissions to 0o600 on Unix.
pub fn cmd_keygen(output_prefix: &str) -> Result<(PathBuf, PathBuf), KeygenError> {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let verifying_key = signing_key.verifying_key();

    let secret_path = PathBuf::from(format!("{}.secret", output_prefix));
    std::fs::write(&secret_path, BASE64.encode(signing_key.to_bytes())).map_err(|source| {
        KeygenError::Write {
            path: secret_path.clone(),
            source,
        }
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = std::fs::set_permissions(&secret_path, perms) {
            tracing::warn!(
                path = %secret_path.display(),
                error = %e,
                "failed to restrict key permissions"
            );
        }
    }

    let pub_path = PathBuf::from(format!("{}.pub", output_prefix));
    std::fs::write(&pub_path, BASE64.encode(verifying_key.to_bytes())).map_err(|source| {
        KeygenError::Write {
            path: pub_path.clone(),
            source,
        }
    })?;

    Ok((secret_path, pub_path))
}

/// Read a secret key file and return the SigningKey.
///
/// The file must contain a base64-encoded 32-byte Ed25519 seed.
pub fn read_secret_key(path: &Path) -> Result<SigningKey, KeygenError> {
    let contents = std::fs::read_to_string(path).map_err(|source| KeygenError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = BASE64
        .decode(contents.trim())
        .map_err(|e| KeygenError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| KeygenError::Decode {
        path: path.to_path_buf(),
        reason: "expected 32 bytes".to_string(),
    })?;
    Ok(SigningKey::from_bytes(&key_bytes))
}

/// Short hex fingerprint of a verifying key (first 8 bytes of the key bytes).
pub fn key_fingerprint(key: &VerifyingKey) -> String {
    key.to_bytes()[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, Verifier};
    use tempfile::TempDir;

    #[test]
    fn keygen_round_trips_through_files() {
        let tmp = TempDir::new().unwrap();
        let prefix = tmp.path().join("siad");
        let (secret_path, pub_path) = cmd_keygen(prefix.to_str().unwrap()).unwrap();

        let signing_key = read_secret_key(&secret_path).unwrap();
        let stored_pub = std::fs::read_to_string(&pub_path).unwrap();
        assert_eq!(
            BASE64.encode(signing_key.verifying_key().to_bytes()),
            stored_pub
        );

        let sig = signing_key.sign(b"d1::u1:2026-01-01T00:00:00Z");
        signing_key
            .verifying_key()
            .verify(b"d1::u1:2026-01-01T00:00:00Z", &sig)
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn secret_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let (secret_path, _) = cmd_keygen(tmp.path().join("k").to_str().unwrap()).unwrap();
        let mode = std::fs::metadata(secret_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn invalid_key_files_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.secret");
        std::fs::write(&bad, "not-valid-base64!!!").unwrap();
        assert!(matches!(
            read_secret_key(&bad),
            Err(KeygenError::Decode { .. })
        ));

        std::fs::write(&bad, BASE64.encode([1u8; 16])).unwrap();
        assert!(matches!(
            read_secret_key(&bad),
            Err(KeygenError::Decode { .. })
        ));

        assert!(matches!(
            read_secret_key(&tmp.path().join("missing.secret")),
            Err(KeygenError::Read { .. })
        ));
    }

    #[test]
    fn fingerprint_is_sixteen_hex_chars() {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let fp = key_fingerprint(&key.verifying_key());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
