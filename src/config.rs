use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

pub const SECRETS_FILE: &str = "secrets.toml";
pub const SECTORS_FILE: &str = "setores_usuarios.json";

/// Normalize a username the same way everywhere: config keys, login input,
/// session lookups. Avoids case/whitespace mismatches between the secrets
/// file and what people type.
pub fn normalize_user(s: &str) -> String {
    s.trim().to_lowercase()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSecret {
    pub senha: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_worksheet() -> String {
    "Histórico".to_string()
}

/// Contents of `secrets.toml`, overridable via `ACOMP_*` environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub spreadsheet_path: PathBuf,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    pub users: HashMap<String, UserSecret>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secrets: Secrets,
    /// Normalized username -> sectors that user reviews.
    pub sectors: HashMap<String, Vec<String>>,
}

impl Config {
    pub fn load(secrets_path: Option<&Path>, sectors_path: Option<&Path>) -> Result<Self> {
        let secrets = load_secrets(&resolve(secrets_path, SECRETS_FILE))?;
        let sectors = load_sector_map(&resolve(sectors_path, SECTORS_FILE))?;
        Ok(Self { secrets, sectors })
    }

    pub fn sectors_for(&self, user: &str) -> &[String] {
        self.sectors
            .get(&normalize_user(user))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Constant-time credential check. Returns false for unknown users too,
    /// without distinguishing them from a wrong password.
    pub fn verify_login(&self, user: &str, senha: &str) -> bool {
        match self.secrets.users.get(&normalize_user(user)) {
            Some(secret) => secret.senha.as_bytes().ct_eq(senha.as_bytes()).into(),
            None => false,
        }
    }
}

/// Explicit flag wins, then a file in the working directory, then the user
/// config dir.
fn resolve(explicit: Option<&Path>, file_name: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(file_name);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("acompanhamento").join(file_name))
        .unwrap_or(local)
}

fn load_secrets(path: &Path) -> Result<Secrets> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "secrets file not found: {}",
            path.display()
        )));
    }
    let figment = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("ACOMP_"));
    let mut secrets: Secrets = figment
        .extract()
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
    secrets.users = secrets
        .users
        .into_iter()
        .map(|(k, v)| (normalize_user(&k), v))
        .collect();
    Ok(secrets)
}

fn load_sector_map(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "sector map not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let raw: HashMap<String, Vec<String>> = serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (normalize_user(&k), v))
        .collect())
}
