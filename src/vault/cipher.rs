//! AES-256-ECB decryption for stored parameter values.
//!
//! Values are PKCS#7 padded and base64 encoded. Every 16-byte block is
//! decrypted on its own; existing ciphertexts depend on that, so no chaining
//! mode is applied here.

use crate::error::{AppError, AppResult};
use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use aes::Aes256;
use base64::Engine;

const BLOCK_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Turn stored key material into a 32-byte AES-256 key.
///
/// The raw UTF-8 bytes are used when they are already 32 bytes long,
/// otherwise the value is treated as base64.
pub fn normalize_key(raw: &str) -> AppResult<Vec<u8>> {
    let raw = raw.trim();
    if raw.len() == KEY_SIZE {
        return Ok(raw.as_bytes().to_vec());
    }

    match base64::engine::general_purpose::STANDARD.decode(raw) {
        Ok(decoded) if decoded.len() == KEY_SIZE => Ok(decoded),
        Ok(decoded) => Err(AppError::InvalidKeyLength { len: decoded.len() }),
        Err(_) => Err(AppError::InvalidKeyLength { len: raw.len() }),
    }
}

/// Decrypt a base64 ciphertext with a 32-byte key.
pub fn decrypt_ecb(key: &[u8], ciphertext_b64: &str) -> AppResult<String> {
    let cipher = Aes256::new_from_slice(key)
        .map_err(|_| AppError::InvalidKeyLength { len: key.len() })?;

    let mut buffer = base64::engine::general_purpose::STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| AppError::Decryption(format!("Invalid base64 ciphertext: {}", e)))?;

    if buffer.is_empty() || buffer.len() % BLOCK_SIZE != 0 {
        return Err(AppError::Decryption(format!(
            "Ciphertext length {} is not a multiple of {}",
            buffer.len(),
            BLOCK_SIZE
        )));
    }

    for block in buffer.chunks_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let pad = usize::from(buffer[buffer.len() - 1]);
    if pad == 0 || pad > BLOCK_SIZE || pad > buffer.len() {
        return Err(AppError::Decryption(format!("Invalid padding length {}", pad)));
    }
    buffer.truncate(buffer.len() - pad);

    String::from_utf8(buffer)
        .map_err(|e| AppError::Decryption(format!("Plaintext is not valid UTF-8: {}", e)))
}
