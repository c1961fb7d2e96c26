use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::ClientError;
use crate::utils::Address;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const SECRET_LEN: usize = 32;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256 key derived from the operator password. Lives only for the
/// duration of one encrypt or decrypt call.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PasswordDerivedKey {
    bytes: [u8; 32],
}

impl PasswordDerivedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Debug for PasswordDerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDerivedKey(<redacted>)")
    }
}

/// Unlocked secp256k1 secret scalar.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: [u8; SECRET_LEN],
}

impl SigningKey {
    pub fn generate() -> Self {
        let secret = k256::SecretKey::random(&mut OsRng);
        let mut bytes = [0u8; SECRET_LEN];
        bytes.copy_from_slice(&secret.to_bytes());
        Self { bytes }
    }

    /// Rejects zero and scalars at or above the curve order.
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Result<Self, ClientError> {
        k256::SecretKey::from_slice(&bytes)
            .map_err(|_| ClientError::InvalidInput("not a valid secp256k1 secret".to_string()))?;
        Ok(Self { bytes })
    }

    pub fn from_hex(value: &str) -> Result<Self, ClientError> {
        let digits = value.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        if digits.len() != SECRET_LEN * 2 {
            return Err(ClientError::InvalidInput(
                "secret key must be 64 hex characters".to_string(),
            ));
        }
        let mut bytes = Zeroizing::new([0u8; SECRET_LEN]);
        hex::decode_to_slice(digits, bytes.as_mut_slice())
            .map_err(|_| ClientError::InvalidInput("secret key is not hex".to_string()))?;
        Self::from_bytes(*bytes)
    }

    /// `0x`-prefixed lowercase hex, the plaintext stored in key files.
    pub fn to_hex(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::with_capacity(2 + SECRET_LEN * 2));
        out.push_str("0x");
        out.push_str(&Zeroizing::new(hex::encode(self.bytes)));
        out
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.bytes
    }

    pub fn address(&self) -> Result<Address, ClientError> {
        let secret = k256::SecretKey::from_slice(&self.bytes)
            .map_err(|_| ClientError::Crypto("secret key is not a valid scalar".to_string()))?;
        let point = secret.public_key().to_encoded_point(false);
        // Uncompressed SEC1 starts with the 0x04 tag byte.
        Ok(Address::from_raw_public_key(&point.as_bytes()[1..]))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKeyFile {
    pub iv: [u8; IV_LEN],
    pub encrypted: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyFileJson {
    iv: String,
    encrypted: String,
}

impl EncryptedKeyFile {
    pub fn to_json(&self) -> Result<String, ClientError> {
        let file = KeyFileJson {
            iv: hex::encode(self.iv),
            encrypted: hex::encode(&self.encrypted),
        };
        Ok(serde_json::to_string(&file)?)
    }

    pub fn from_json(contents: &str) -> Result<Self, ClientError> {
        let file: KeyFileJson = serde_json::from_str(contents)
            .map_err(|e| ClientError::CorruptKeyFile(format!("not a key file: {e}")))?;
        let iv = hex::decode(file.iv.trim())
            .map_err(|_| ClientError::CorruptKeyFile("iv is not hex".to_string()))?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| {
            ClientError::CorruptKeyFile(format!("iv must be {IV_LEN} bytes"))
        })?;
        let encrypted = hex::decode(file.encrypted.trim())
            .map_err(|_| ClientError::CorruptKeyFile("ciphertext is not hex".to_string()))?;
        if encrypted.is_empty() || encrypted.len() % BLOCK_LEN != 0 {
            return Err(ClientError::CorruptKeyFile(format!(
                "ciphertext length {} is not a positive multiple of {BLOCK_LEN}",
                encrypted.len()
            )));
        }
        Ok(Self { iv, encrypted })
    }
}

/// Password length in UTF-16 code units, the unit existing key files were
/// validated against.
pub(crate) fn password_len(password: &str) -> usize {
    password.encode_utf16().count()
}

pub fn derive_key_from_password(password: &str) -> Result<PasswordDerivedKey, ClientError> {
    if password_len(password) < MIN_PASSWORD_LEN {
        return Err(ClientError::WeakPassword);
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&Sha256::digest(password.as_bytes()));
    Ok(PasswordDerivedKey { bytes })
}

/// Generates a fresh key and stores it encrypted at `path`.
///
/// Never overwrites: an existing path fails with `FileAlreadyExists` and is
/// left byte-for-byte untouched.
pub fn create_and_encrypt(
    path: &Path,
    password: &str,
) -> Result<(EncryptedKeyFile, SigningKey), ClientError> {
    let key = SigningKey::generate();
    let file = encrypt_to_file(&key, path, password)?;
    info!(path = %path.display(), "created encrypted key file");
    Ok((file, key))
}

/// Encrypts `key` under `password` with a fresh IV and writes it to `path`.
pub fn encrypt_to_file(
    key: &SigningKey,
    path: &Path,
    password: &str,
) -> Result<EncryptedKeyFile, ClientError> {
    if path.exists() {
        return Err(ClientError::FileAlreadyExists(path.to_path_buf()));
    }
    let derived = derive_key_from_password(password)?;
    let file = encrypt_key(key, &derived)?;
    let serialized = file.to_json()?;
    write_new_file(path, serialized.as_bytes())?;
    Ok(file)
}

pub fn encrypt_key(
    key: &SigningKey,
    derived: &PasswordDerivedKey,
) -> Result<EncryptedKeyFile, ClientError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let cipher = Aes256CbcEnc::new_from_slices(derived.as_bytes(), &iv)
        .map_err(|e| ClientError::Crypto(e.to_string()))?;
    let plaintext = key.to_hex();
    let encrypted = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(EncryptedKeyFile { iv, encrypted })
}

pub fn decrypt(path: &Path, password: &str) -> Result<SigningKey, ClientError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ClientError::FileNotFound(path.to_path_buf()))
        }
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            return Err(ClientError::CorruptKeyFile("key file is not utf-8".to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    let file = EncryptedKeyFile::from_json(&contents)?;
    let derived = derive_key_from_password(password)?;
    let key = decrypt_key(&file, &derived).map_err(|err| {
        if matches!(err, ClientError::WrongPassword) {
            warn!(path = %path.display(), "key file did not decrypt with the supplied password");
        }
        err
    })?;
    info!(path = %path.display(), "unlocked key file");
    Ok(key)
}

pub fn decrypt_key(
    file: &EncryptedKeyFile,
    derived: &PasswordDerivedKey,
) -> Result<SigningKey, ClientError> {
    let cipher = Aes256CbcDec::new_from_slices(derived.as_bytes(), &file.iv)
        .map_err(|e| ClientError::Crypto(e.to_string()))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&file.encrypted)
            .map_err(|_| ClientError::WrongPassword)?,
    );
    // Padding can verify by chance under the wrong key; the payload must
    // still be a valid secret.
    let text = std::str::from_utf8(&plaintext).map_err(|_| ClientError::WrongPassword)?;
    SigningKey::from_hex(text).map_err(|_| ClientError::WrongPassword)
}

fn write_new_file(path: &Path, contents: &[u8]) -> Result<(), ClientError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut handle = match options.open(path) {
        Ok(handle) => handle,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(ClientError::FileAlreadyExists(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };
    handle.write_all(contents)?;
    handle.sync_all()?;
    Ok(())
}
