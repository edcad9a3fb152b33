use crate::aes128::{Aes128, Block, BLOCK_SIZE};
use crate::error::{CryptoError, Result};

impl Aes128 {
    /// CBC-encrypt `plaintext`, which must be a whole number of blocks.
    pub fn encrypt(&self, plaintext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let mut chain = check_iv(iv)?;
        check_aligned(plaintext)?;

        let mut out = Vec::with_capacity(plaintext.len());
        for chunk in plaintext.chunks_exact(BLOCK_SIZE) {
            let mut block = chain;
            for (b, p) in block.iter_mut().zip(chunk) {
                *b ^= p;
            }
            chain = self.encrypt_block(&block);
            out.extend_from_slice(&chain);
        }
        Ok(out)
    }

    /// CBC-decrypt `ciphertext`, which must be a whole number of blocks.
    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let mut chain = check_iv(iv)?;
        check_aligned(ciphertext)?;

        let mut out = Vec::with_capacity(ciphertext.len());
        for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
            let mut cipher_block = [0u8; BLOCK_SIZE];
            cipher_block.copy_from_slice(chunk);

            let mut plain = self.decrypt_block(&cipher_block);
            for (p, c) in plain.iter_mut().zip(&chain) {
                *p ^= c;
            }
            out.extend_from_slice(&plain);
            chain = cipher_block;
        }
        Ok(out)
    }
}

fn check_iv(iv: &[u8]) -> Result<Block> {
    iv.try_into()
        .map_err(|_| CryptoError::InvalidIvLength(iv.len()))
}

fn check_aligned(data: &[u8]) -> Result<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::UnalignedInput(data.len()));
    }
    Ok(())
}

/// Append PKCS#7 padding up to the next block boundary (always 1..=16 bytes).
pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let n = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(data.len() + n);
    out.extend_from_slice(data);
    out.resize(data.len() + n, n as u8);
    out
}

/// Strip PKCS#7 padding.
pub fn pkcs7_unpad(data: &[u8]) -> Result<&[u8]> {
    let n = *data.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if n == 0 || n > BLOCK_SIZE || n > data.len() {
        return Err(CryptoError::InvalidPadding);
    }
    let (body, padding) = data.split_at(data.len() - n);
    if padding.iter().any(|&b| b as usize != n) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes128::hex;
    use proptest::prelude::*;

    fn sp800_38a() -> (Aes128, Vec<u8>) {
        let aes = Aes128::new(&hex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        (aes, hex("000102030405060708090a0b0c0d0e0f"))
    }

    #[test]
    fn sp800_38a_cbc_vectors() {
        let (aes, iv) = sp800_38a();
        let plain = hex(concat!(
            "6bc1bee22e409f96e93d7e117393172a",
            "ae2d8a571e03ac9c9eb76fac45af8e51",
        ));
        let cipher = hex(concat!(
            "7649abac8119b246cee98e9b12e9197d",
            "5086cb9b507219ee95db113a917678b2",
        ));

        assert_eq!(aes.encrypt(&plain, &iv).unwrap(), cipher);
        assert_eq!(aes.decrypt(&cipher, &iv).unwrap(), plain);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let (aes, iv) = sp800_38a();
        assert!(aes.encrypt(&[], &iv).unwrap().is_empty());
    }

    #[test]
    fn rejects_misaligned_input_and_bad_iv() {
        let (aes, iv) = sp800_38a();
        assert_eq!(
            aes.encrypt(&[0u8; 17], &iv).unwrap_err(),
            CryptoError::UnalignedInput(17)
        );
        assert_eq!(
            aes.decrypt(&[0u8; 15], &iv).unwrap_err(),
            CryptoError::UnalignedInput(15)
        );
        assert_eq!(
            aes.encrypt(&[0u8; 16], &iv[..8]).unwrap_err(),
            CryptoError::InvalidIvLength(8)
        );
    }

    #[test]
    fn pkcs7_padding() {
        assert_eq!(pkcs7_pad(b""), vec![16u8; 16]);
        let padded = pkcs7_pad(b"hello");
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[5..], &[11u8; 11]);
        assert_eq!(pkcs7_unpad(&padded).unwrap(), b"hello");
        assert_eq!(pkcs7_pad(&[0u8; 16]).len(), 32);
    }

    #[test]
    fn pkcs7_rejects_bad_padding() {
        assert_eq!(pkcs7_unpad(&[]), Err(CryptoError::InvalidPadding));
        assert_eq!(pkcs7_unpad(&[1, 2, 0]), Err(CryptoError::InvalidPadding));
        assert_eq!(pkcs7_unpad(&[3, 2, 3]), Err(CryptoError::InvalidPadding));
        assert_eq!(pkcs7_unpad(&[17u8; 17]), Err(CryptoError::InvalidPadding));
    }

    proptest! {
        #[test]
        fn cbc_round_trip(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            data in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let aes = Aes128::new(&key).unwrap();
            let sealed = aes.encrypt(&pkcs7_pad(&data), &iv).unwrap();
            prop_assert_eq!(sealed.len() % BLOCK_SIZE, 0);

            let opened = aes.decrypt(&sealed, &iv).unwrap();
            prop_assert_eq!(pkcs7_unpad(&opened).unwrap(), data.as_slice());
        }
    }
}
