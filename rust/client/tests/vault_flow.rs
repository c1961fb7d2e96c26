use std::fs;
use std::sync::Arc;
use std::thread;

use lpwallet_client::{
    create_and_encrypt, decrypt, encrypt_to_file, ClientError, EncryptedKeyFile, KeyCache,
    SigningKey, StaticPassword,
};

const PASSWORD: &str = "integration-password";

#[test]
fn created_key_unlocks_through_cache() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wallet.json");

    let (file, key) = create_and_encrypt(&path, PASSWORD)?;
    let contents = fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    assert_eq!(value["iv"].as_str().map(str::len), Some(32));
    assert_eq!(EncryptedKeyFile::from_json(&contents)?, file);

    let cache = KeyCache::new();
    assert!(cache.get().is_none());
    let unlocked = cache.unlock(&path, &StaticPassword::new(PASSWORD))?;
    assert_eq!(unlocked, key);
    assert_eq!(unlocked.address()?, key.address()?);

    // Cached now: a prompt with the wrong password is never consulted.
    let again = cache.unlock(&path, &StaticPassword::new("definitely-wrong"))?;
    assert_eq!(again, key);
    Ok(())
}

#[test]
fn wrong_password_is_reported_and_file_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wallet.json");
    create_and_encrypt(&path, PASSWORD)?;
    let before = fs::read(&path)?;

    assert!(matches!(
        decrypt(&path, "another-password"),
        Err(ClientError::WrongPassword)
    ));
    let cache = KeyCache::new();
    assert!(matches!(
        cache.unlock(&path, &StaticPassword::new("another-password")),
        Err(ClientError::WrongPassword)
    ));
    assert!(cache.get().is_none());
    assert_eq!(fs::read(&path)?, before);
    Ok(())
}

#[test]
fn second_create_does_not_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wallet.json");
    let (_, first) = create_and_encrypt(&path, PASSWORD)?;
    let before = fs::read(&path)?;

    let err = create_and_encrypt(&path, "some-other-password").unwrap_err();
    assert!(matches!(err, ClientError::FileAlreadyExists(_)));
    assert_eq!(fs::read(&path)?, before);
    assert_eq!(decrypt(&path, PASSWORD)?, first);
    Ok(())
}

#[test]
fn imported_key_keeps_its_address() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("imported.json");
    let key = SigningKey::from_hex(
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
    )?;
    encrypt_to_file(&key, &path, PASSWORD)?;
    let unlocked = decrypt(&path, PASSWORD)?;
    assert_eq!(
        unlocked.address()?.to_string(),
        "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
    );
    Ok(())
}

#[test]
fn shared_cache_unlocks_once_across_threads() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wallet.json");
    let (_, key) = create_and_encrypt(&path, PASSWORD)?;

    let cache = Arc::new(KeyCache::new());
    let prompt = Arc::new(StaticPassword::new(PASSWORD));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let prompt = Arc::clone(&prompt);
            let path = path.clone();
            thread::spawn(move || cache.unlock(&path, prompt.as_ref()))
        })
        .collect();
    for worker in workers {
        let unlocked = worker.join().expect("worker panicked")?;
        assert_eq!(unlocked, key);
    }
    assert_eq!(cache.get(), Some(key));
    Ok(())
}
