//! AES-128 in CBC mode, with no dependencies beyond the standard library.
//!
//! ```
//! use meshprims_crypto::{pkcs7_pad, pkcs7_unpad, Aes128};
//!
//! let aes = Aes128::new(&[7u8; 16]).unwrap();
//! let iv = [1u8; 16];
//!
//! let sealed = aes.encrypt(&pkcs7_pad(b"frame payload"), &iv).unwrap();
//! let opened = aes.decrypt(&sealed, &iv).unwrap();
//! assert_eq!(pkcs7_unpad(&opened).unwrap(), b"frame payload");
//! ```

pub mod aes128;
pub mod cbc;
pub mod error;

pub use aes128::{Aes128, Block, BLOCK_SIZE, KEY_SIZE};
pub use cbc::{pkcs7_pad, pkcs7_unpad};
pub use error::{CryptoError, Result};
