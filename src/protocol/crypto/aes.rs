use super::{CryptoError, lengths};
use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// AES-128 in ECB mode without padding.
///
/// The pairing handshake exchanges fixed 16/32/48-byte fields, each one a
/// single block or a fixed run of independent blocks. ECB is what the host
/// speaks on the wire; do not reuse this type for anything else.
pub struct Aes128Ecb {
    cipher: Aes128,
}

impl Aes128Ecb {
    /// Create cipher with a 16-byte key
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != lengths::AES_128_KEY {
            return Err(CryptoError::InvalidKeyLength {
                expected: lengths::AES_128_KEY,
                actual: key.len(),
            });
        }

        let cipher = Aes128::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: lengths::AES_128_KEY,
            actual: key.len(),
        })?;

        Ok(Self { cipher })
    }

    /// Encrypt block-aligned data, returning a new buffer
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_aligned(plaintext)?;

        let mut output = plaintext.to_vec();
        for block in output.chunks_exact_mut(lengths::AES_BLOCK) {
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(output)
    }

    /// Decrypt block-aligned data, returning a new buffer
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_aligned(ciphertext)?;

        let mut output = ciphertext.to_vec();
        for block in output.chunks_exact_mut(lengths::AES_BLOCK) {
            self.cipher
                .decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(output)
    }
}

fn check_aligned(data: &[u8]) -> Result<(), CryptoError> {
    if data.len() % lengths::AES_BLOCK != 0 {
        return Err(CryptoError::UnalignedInput(data.len()));
    }
    Ok(())
}

/// One-shot AES-128-ECB encryption
pub fn aes128_ecb_encrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Aes128Ecb::new(key)?.encrypt(data)
}

/// One-shot AES-128-ECB decryption
pub fn aes128_ecb_decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Aes128Ecb::new(key)?.decrypt(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_ecb_fips197_vector() {
        // FIPS-197 appendix C.1
        let key: Vec<u8> = (0u8..16).collect();
        let plaintext = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];

        let ciphertext = aes128_ecb_encrypt(&plaintext, &key).unwrap();
        assert_eq!(ciphertext, expected);

        let decrypted = aes128_ecb_decrypt(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_aes_ecb_blocks_are_independent() {
        let key = [0x42u8; 16];
        let data = [0x07u8; 48];

        let ciphertext = aes128_ecb_encrypt(&data, &key).unwrap();

        assert_eq!(ciphertext.len(), 48);
        assert_eq!(ciphertext[..16], ciphertext[16..32]);
        assert_eq!(ciphertext[16..32], ciphertext[32..]);
    }

    #[test]
    fn test_aes_ecb_rejects_unaligned() {
        let key = [0u8; 16];
        let result = aes128_ecb_encrypt(&[0u8; 17], &key);
        assert!(matches!(result, Err(CryptoError::UnalignedInput(17))));

        let result = aes128_ecb_decrypt(&[0u8; 5], &key);
        assert!(matches!(result, Err(CryptoError::UnalignedInput(5))));
    }

    #[test]
    fn test_aes_ecb_rejects_bad_key() {
        let result = Aes128Ecb::new(&[0u8; 32]);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength {
                expected: 16,
                actual: 32
            })
        ));
    }

    #[test]
    fn test_aes_ecb_empty_input() {
        let key = [0u8; 16];
        assert!(aes128_ecb_encrypt(&[], &key).unwrap().is_empty());
    }
}
