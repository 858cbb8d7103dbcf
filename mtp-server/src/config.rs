//! Server configuration, loaded from environment variables.
//!
//! Plain constants promoted to env-driven configuration for a long-running
//! binary, rather than a config file or CLI flags.

use std::env;

/// Typed server configuration.
pub struct ServerConfig {
    /// Address the TCP listener binds to, e.g. `0.0.0.0:7443`.
    pub listen_addr: String,
    /// Decimal RSA modulus `n`.
    pub rsa_n: String,
    /// Decimal RSA private exponent `d`.
    pub rsa_d: String,
    /// Decimal RSA modulus, again (the public key shares `n` with the private key).
    pub rsa_pub_n: String,
    /// Decimal RSA public exponent `e`.
    pub rsa_pub_e: String,
    /// The composite `pq` the handshake factorizes.
    pub pq: u64,
    /// Diffie-Hellman generator.
    pub dh_g: u32,
    /// 2048-bit Diffie-Hellman prime, big-endian.
    pub dh_prime: [u8; 256],
    /// Path to the SQLite auth-key database. `None` keeps keys in memory only.
    pub sqlite_path: Option<String>,
}

/// Errors loading [`ServerConfig`] from the environment.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable was not set.
    Missing(&'static str),
    /// An environment variable's value could not be parsed.
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing environment variable {name}"),
            Self::Invalid(name) => write!(f, "invalid value for environment variable {name}"),
        }
    }
}
impl std::error::Error for ConfigError {}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Required: `MTP_RSA_N`, `MTP_RSA_D`, `MTP_RSA_PUB_E`, `MTP_PQ`,
    /// `MTP_DH_G`, `MTP_DH_PRIME` (128 hex characters, big-endian).
    /// Optional: `MTP_LISTEN_ADDR` (default `0.0.0.0:7443`), `MTP_SQLITE_PATH`
    /// (default: in-memory only).
    pub fn from_env() -> Result<Self, ConfigError> {
        let rsa_n = required("MTP_RSA_N")?;
        let rsa_d = required("MTP_RSA_D")?;
        let rsa_pub_e = required("MTP_RSA_PUB_E")?;
        let pq = required("MTP_PQ")?
            .parse()
            .map_err(|_| ConfigError::Invalid("MTP_PQ"))?;
        let dh_g = required("MTP_DH_G")?
            .parse()
            .map_err(|_| ConfigError::Invalid("MTP_DH_G"))?;
        let dh_prime_hex = required("MTP_DH_PRIME")?;
        let dh_prime = parse_hex_256(&dh_prime_hex).ok_or(ConfigError::Invalid("MTP_DH_PRIME"))?;

        Ok(Self {
            listen_addr: env::var("MTP_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:7443".to_string()),
            rsa_pub_n: rsa_n.clone(),
            rsa_n,
            rsa_d,
            rsa_pub_e,
            pq,
            dh_g,
            dh_prime,
            sqlite_path: env::var("MTP_SQLITE_PATH").ok(),
        })
    }
}

fn parse_hex_256(s: &str) -> Option<[u8; 256]> {
    if s.len() != 512 {
        return None;
    }
    let mut out = [0u8; 256];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}
