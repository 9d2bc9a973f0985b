use super::data_storage::DataStorage;
use crate::libs::messages::Message;
use aes::Aes256;
use anyhow::Result;
use base64::prelude::*;
use block_modes::block_padding::Pkcs7;
use block_modes::{BlockMode, Cbc};
use dialoguer::{theme::ColorfulTheme, Password};
use std::env;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

type Aes256Cbc = Cbc<Aes256, Pkcs7>;

/// Encrypted file holding the GitHub access token.
pub const GITHUB_TOKEN_FILE: &str = ".github_token";

/// Environment variable that overrides the stored token.
pub const GITHUB_TOKEN_ENV: &str = "LRU_TRACKER_GITHUB_TOKEN";

#[derive(Clone, Debug)]
pub struct Secret {
    password: Option<String>,
    prompt: String,
    secret_file_path: PathBuf,
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl Secret {
    pub fn new(secret_name: &str, prompt: &str) -> Self {
        Self::with_storage(&DataStorage::new(), secret_name, prompt)
    }

    pub fn with_storage(storage: &DataStorage, secret_name: &str, prompt: &str) -> Self {
        let secret_file_path = storage.get_path(secret_name).unwrap_or_else(|_| PathBuf::from(secret_name));

        Self {
            password: None,
            secret_file_path,
            prompt: prompt.to_owned(),
            key: APP_METADATA_ENCRYPTION_KEY.to_vec(),
            iv: APP_METADATA_ENCRYPTION_IV.to_vec(),
        }
    }

    /// The GitHub token secret inside `storage`.
    pub fn github_token(storage: &DataStorage) -> Self {
        Self::with_storage(storage, GITHUB_TOKEN_FILE, &Message::PromptGithubToken.to_string())
    }

    fn set_password(&self, password: &str) -> Self {
        Self {
            password: Some(password.to_owned()),
            ..self.clone()
        }
    }

    /// Stored value, or `None` when nothing readable is stored.
    pub fn read(&self) -> Option<String> {
        if fs::metadata(&self.secret_file_path).is_err() {
            return None;
        }
        match self.decrypt() {
            Ok(password) => Some(password),
            Err(e) => {
                debug!("Cannot decrypt {}: {}", self.secret_file_path.display(), e);
                None
            }
        }
    }

    pub fn get_or_prompt(&self) -> Result<String> {
        match self.read() {
            Some(password) => Ok(password),
            None => self.prompt(),
        }
    }

    pub fn prompt(&self) -> Result<String> {
        let password = Password::with_theme(&ColorfulTheme::default()).with_prompt(&self.prompt).interact()?;
        self.store(&password)?;
        Ok(password)
    }

    /// Encrypts and writes `password`.
    pub fn store(&self, password: &str) -> Result<()> {
        self.set_password(password).encrypt()?;
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        if self.secret_file_path.exists() {
            fs::remove_file(&self.secret_file_path)?;
        }
        Ok(())
    }

    fn encrypt(&self) -> Result<Self> {
        let cipher = Aes256Cbc::new_from_slices(&self.key, &self.iv)?;
        let password = self.password.clone().unwrap_or_default();
        let ciphertext = cipher.encrypt_vec(password.as_bytes());
        let encoded = BASE64_STANDARD.encode(&ciphertext);

        if let Some(parent) = self.secret_file_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let mut file = File::create(&self.secret_file_path)?;
        file.write_all(encoded.as_bytes())?;

        Ok(self.clone())
    }

    fn decrypt(&self) -> Result<String> {
        let mut file = File::open(&self.secret_file_path)?;
        let mut encoded = String::new();
        file.read_to_string(&mut encoded)?;
        let ciphertext = BASE64_STANDARD.decode(encoded.trim())?;
        let cipher = Aes256Cbc::new_from_slices(&self.key, &self.iv)?;
        let decrypted_ciphertext = cipher.decrypt_vec(&ciphertext)?;
        let decrypted_password = String::from_utf8(decrypted_ciphertext)?;

        Ok(decrypted_password)
    }
}

/// GitHub token from the environment, falling back to the encrypted secret.
pub fn resolve_github_token(storage: &DataStorage) -> Option<String> {
    if let Ok(token) = env::var(GITHUB_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Some(token.trim().to_string());
        }
    }
    Secret::github_token(storage).read()
}
