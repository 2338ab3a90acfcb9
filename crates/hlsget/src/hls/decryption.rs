// AES-128-CBC segment encryption and decryption.

use aes::Aes128;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

use crate::hls::error::CryptoError;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;
const AES_128_KEY_SIZE: usize = 16;

fn check_lengths(key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if key.len() != AES_128_KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength(key.len()));
    }
    if iv.len() != AES_BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength(iv.len()));
    }
    Ok(())
}

/// Encrypt `data`, always appending PKCS#5 padding (a full block when
/// `data` is already block aligned).
pub fn encrypt(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_lengths(key, iv)?;
    let encryptor = Encryptor::<Aes128>::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;

    let padded_len = data.len() + (AES_BLOCK_SIZE - data.len() % AES_BLOCK_SIZE);
    let mut buffer = vec![0u8; padded_len];
    buffer[..data.len()].copy_from_slice(data);

    let written = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
        .map_err(|_| CryptoError::InvalidPadding)?
        .len();
    buffer.truncate(written);
    Ok(buffer)
}

/// Decrypt `data` and strip its padding.
///
/// The last plaintext byte is read as the pad length; only that length is
/// validated, not the value of the other padding bytes.
pub fn decrypt(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_lengths(key, iv)?;
    if !data.len().is_multiple_of(AES_BLOCK_SIZE) {
        return Err(CryptoError::UnalignedInput(data.len()));
    }
    let decryptor = Decryptor::<Aes128>::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;

    let mut buffer = data.to_vec();
    decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| CryptoError::UnalignedInput(data.len()))?;

    let pad = buffer.last().copied().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad == 0 || pad > buffer.len() || pad > AES_BLOCK_SIZE {
        return Err(CryptoError::InvalidPadding);
    }
    buffer.truncate(buffer.len() - pad);
    Ok(buffer)
}
