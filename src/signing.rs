// Request signing - every authenticated call carries a nonce `hn` and a
// digest `h` that the server recomputes from the same fields.
use crate::error::{BotError, Result};
use md5::{Digest, Md5};
use rand::Rng;

pub const MAX_NONCE: u32 = 9_999_999;

/// Nonce and digest pair, always sent together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub nonce: u32,
    pub digest: String,
}

/// Salt code for one seed character, after the two correction rules.
pub fn transform_code(code: u32) -> i64 {
    let c = 90 - code as i64 + 97;
    if c == 139 {
        c - 91
    } else if c >= 130 {
        c - 81
    } else {
        c
    }
}

/// De-obfuscate a seed into the salt used for secure signing.
/// Characters whose code maps outside the valid range are rejected.
pub fn transform_seed(seed: &str) -> Result<String> {
    seed.chars()
        .map(|ch| {
            u32::try_from(transform_code(ch as u32))
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| BotError::Config(format!("seed character {:?} cannot be salted", ch)))
        })
        .collect()
}

pub fn numeric_transform(nonce: u32) -> u64 {
    (nonce as u64 % 11) * nonce as u64
}

/// Hex MD5 over `[salt] ++ parameter_string ++ numeric_transform(nonce)`.
/// Must match the server byte for byte.
pub fn digest(seed: &str, parameter_string: &str, nonce: u32, secure: bool) -> Result<String> {
    let mut raw = String::new();
    if secure {
        raw.push_str(&transform_seed(seed)?);
    }
    raw.push_str(parameter_string);
    raw.push_str(&numeric_transform(nonce).to_string());

    Ok(hex::encode(Md5::digest(raw.as_bytes())))
}

/// Pick a fresh nonce and sign with it
pub fn sign(seed: &str, parameter_string: &str, secure: bool) -> Result<Signature> {
    let nonce = rand::thread_rng().gen_range(0..=MAX_NONCE);
    sign_with_nonce(seed, parameter_string, nonce, secure)
}

pub fn sign_with_nonce(seed: &str, parameter_string: &str, nonce: u32, secure: bool) -> Result<Signature> {
    Ok(Signature {
        nonce,
        digest: digest(seed, parameter_string, nonce, secure)?,
    })
}
