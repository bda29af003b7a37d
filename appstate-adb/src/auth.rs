//! ADB RSA key material.
//!
//! Private keys are persisted as PKCS#8 PEM; public keys use Android's
//! RSAPublicKey binary layout (word count, Montgomery `n0inv`, little-endian
//! modulus, `R² mod n`, exponent), base64-encoded with a name suffix, which
//! is the form the device consumes over `AUTH RSAPUBLICKEY`.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{AdbError, AdbResult};

/// Length of the device-issued AUTH challenge.
pub const TOKEN_LEN: usize = 20;

const KEY_BITS: usize = 2048;
const MODULUS_WORDS: usize = KEY_BITS / 32;
const MODULUS_BYTES: usize = KEY_BITS / 8;

/// An RSA keypair used to authenticate with a device.
#[derive(Clone)]
pub struct AdbKey {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl fmt::Debug for AdbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdbKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl AdbKey {
    /// Generates a fresh 2048-bit keypair.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Key`] when key generation fails.
    pub fn generate() -> AdbResult<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|err| AdbError::key(err.to_string()))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Loads a private key from a PKCS#8 PEM file.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Io`] when the file cannot be read and
    /// [`AdbError::Key`] when the PEM does not contain a usable key.
    pub fn load(path: impl AsRef<Path>) -> AdbResult<Self> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path)?;
        let private = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|err| AdbError::key(format!("{}: {err}", path.display())))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Loads the keypair when both files exist, otherwise generates one and
    /// persists it (private key mode 0600 on unix).
    ///
    /// # Errors
    ///
    /// Propagates load, generation, and persistence failures.
    pub fn ensure(
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> AdbResult<Self> {
        let private_path = private_path.as_ref();
        let public_path = public_path.as_ref();
        if private_path.exists() && public_path.exists() {
            return Self::load(private_path);
        }

        info!(path = %private_path.display(), "generating adb keypair");
        let key = Self::generate()?;
        key.persist(private_path, public_path)?;
        Ok(key)
    }

    fn persist(&self, private_path: &Path, public_path: &Path) -> AdbResult<()> {
        if let Some(parent) = private_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| AdbError::key(err.to_string()))?;
        fs::write(private_path, pem.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(private_path, fs::Permissions::from_mode(0o600))?;
        }

        if let Some(parent) = public_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = self.public_key_line()?;
        line.push('\n');
        fs::write(public_path, line)?;
        Ok(())
    }

    /// Signs a device AUTH challenge with PKCS#1 v1.5 under the SHA-1 digest
    /// identity, which is the scheme adbd verifies.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Auth`] for a malformed token and
    /// [`AdbError::Key`] when signing fails.
    pub fn sign_token(&self, token: &[u8]) -> AdbResult<Vec<u8>> {
        if token.len() != TOKEN_LEN {
            return Err(AdbError::auth(format!(
                "auth token must be {TOKEN_LEN} bytes, got {}",
                token.len()
            )));
        }
        self.private
            .sign(Pkcs1v15Sign::new::<Sha1>(), token)
            .map_err(|err| AdbError::key(err.to_string()))
    }

    /// Returns the `<base64> <name>` public-key line the device consumes.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Key`] for unsupported modulus sizes.
    pub fn public_key_line(&self) -> AdbResult<String> {
        let encoded = encode_android_pubkey(&self.public)?;
        Ok(format!("{} {}", BASE64.encode(encoded), key_name()))
    }

    /// Returns a stable hex fingerprint of the public modulus, for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.public.n().to_bytes_be()))
    }
}

fn key_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_owned());
    format!("adb-rs@{host}")
}

/// Android `RSAPublicKey` binary layout.
fn encode_android_pubkey(key: &RsaPublicKey) -> AdbResult<Vec<u8>> {
    if key.size() != MODULUS_BYTES {
        return Err(AdbError::key(format!(
            "unsupported modulus size: {} bytes",
            key.size()
        )));
    }

    let n = key.n();
    let mut n_le = n.to_bytes_le();
    n_le.resize(MODULUS_BYTES, 0);

    // n0inv = -n^-1 mod 2^32, via Newton iteration on the low word.
    let n0 = u32::from_le_bytes([n_le[0], n_le[1], n_le[2], n_le[3]]);
    let mut inv: u32 = 1;
    for _ in 0..5 {
        inv = inv.wrapping_mul(2u32.wrapping_sub(n0.wrapping_mul(inv)));
    }
    let n0inv = inv.wrapping_neg();

    // rr = (2^KEY_BITS)^2 mod n.
    let rr = (BigUint::from(1u32) << (KEY_BITS * 2)) % n;
    let mut rr_le = rr.to_bytes_le();
    rr_le.resize(MODULUS_BYTES, 0);

    let exponent = {
        let mut e_le = key.e().to_bytes_le();
        e_le.resize(4, 0);
        u32::from_le_bytes([e_le[0], e_le[1], e_le[2], e_le[3]])
    };

    let mut out = Vec::with_capacity(8 + 2 * MODULUS_BYTES + 4);
    out.extend_from_slice(&u32::try_from(MODULUS_WORDS).expect("word count fits").to_le_bytes());
    out.extend_from_slice(&n0inv.to_le_bytes());
    out.extend_from_slice(&n_le);
    out.extend_from_slice(&rr_le);
    out.extend_from_slice(&exponent.to_le_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;

    fn test_key() -> AdbKey {
        static KEY: OnceLock<AdbKey> = OnceLock::new();
        KEY.get_or_init(|| AdbKey::generate().unwrap()).clone()
    }

    #[test]
    fn signs_twenty_byte_tokens() {
        let key = test_key();
        let signature = key.sign_token(&[7u8; TOKEN_LEN]).unwrap();
        assert_eq!(signature.len(), MODULUS_BYTES);
    }

    #[test]
    fn rejects_short_tokens() {
        let key = test_key();
        let err = key.sign_token(&[7u8; 8]).unwrap_err();
        assert!(matches!(err, AdbError::Auth { .. }));
    }

    #[test]
    fn android_pubkey_layout() {
        let key = test_key();
        let line = key.public_key_line().unwrap();
        let (b64, name) = line.split_once(' ').unwrap();
        assert!(name.starts_with("adb-rs@"));

        let decoded = BASE64.decode(b64).unwrap();
        assert_eq!(decoded.len(), 8 + 2 * MODULUS_BYTES + 4);

        let words = u32::from_le_bytes(decoded[0..4].try_into().unwrap());
        assert_eq!(words as usize, MODULUS_WORDS);

        // n0 * n0inv must be -1 mod 2^32.
        let n0inv = u32::from_le_bytes(decoded[4..8].try_into().unwrap());
        let n0 = u32::from_le_bytes(decoded[8..12].try_into().unwrap());
        assert_eq!(n0.wrapping_mul(n0inv), u32::MAX);

        let exponent =
            u32::from_le_bytes(decoded[decoded.len() - 4..].try_into().unwrap());
        assert_eq!(exponent, 65537);
    }

    #[test]
    fn ensure_generates_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let private_path = dir.path().join("keys/firetvappstate.key");
        let public_path = dir.path().join("keys/firetvappstate.key.pub");

        let generated = AdbKey::ensure(&private_path, &public_path).unwrap();
        assert!(private_path.exists());
        assert!(public_path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&private_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let reloaded = AdbKey::ensure(&private_path, &public_path).unwrap();
        assert_eq!(
            generated.public_key_line().unwrap(),
            reloaded.public_key_line().unwrap()
        );
    }
}
