//! AES-128 single-block transform (FIPS-197).
//!
//! The state is a `[u8; 16]` in input byte order, which is column-major:
//! byte `4 * c + r` holds row `r` of column `c`. Every round step is a pure
//! function from one block value to the next.

use std::fmt;

use crate::error::{CryptoError, Result};

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;
const ROUNDS: usize = 10;

pub type Block = [u8; BLOCK_SIZE];

#[rustfmt::skip]
const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

const INV_SBOX: [u8; 256] = invert(&SBOX);

const RCON: [u8; ROUNDS + 1] = [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36];

const fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut inv = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inv[table[i] as usize] = i as u8;
        i += 1;
    }
    inv
}

/// AES-128 with an expanded key schedule.
#[derive(Clone)]
pub struct Aes128 {
    round_keys: [Block; ROUNDS + 1],
}

impl Aes128 {
    /// Expand `key`. Only 16-byte keys are accepted.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: &[u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            round_keys: expand_key(key),
        })
    }

    pub fn encrypt_block(&self, block: &Block) -> Block {
        let mut state = add_round_key(*block, &self.round_keys[0]);
        for round_key in &self.round_keys[1..ROUNDS] {
            state = add_round_key(mix_columns(shift_rows(sub_bytes(state))), round_key);
        }
        add_round_key(shift_rows(sub_bytes(state)), &self.round_keys[ROUNDS])
    }

    pub fn decrypt_block(&self, block: &Block) -> Block {
        let mut state = add_round_key(*block, &self.round_keys[ROUNDS]);
        for round_key in self.round_keys[1..ROUNDS].iter().rev() {
            state = inv_mix_columns(add_round_key(
                inv_sub_bytes(inv_shift_rows(state)),
                round_key,
            ));
        }
        add_round_key(inv_sub_bytes(inv_shift_rows(state)), &self.round_keys[0])
    }
}

impl fmt::Debug for Aes128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Aes128 { .. }")
    }
}

fn expand_key(key: &[u8; KEY_SIZE]) -> [Block; ROUNDS + 1] {
    let mut words = [[0u8; 4]; 4 * (ROUNDS + 1)];
    for (i, word) in words.iter_mut().take(4).enumerate() {
        word.copy_from_slice(&key[4 * i..4 * i + 4]);
    }

    for i in 4..words.len() {
        let mut temp = words[i - 1];
        if i % 4 == 0 {
            temp.rotate_left(1);
            for byte in &mut temp {
                *byte = SBOX[*byte as usize];
            }
            temp[0] ^= RCON[i / 4];
        }
        for j in 0..4 {
            words[i][j] = words[i - 4][j] ^ temp[j];
        }
    }

    let mut round_keys = [[0u8; BLOCK_SIZE]; ROUNDS + 1];
    for (round, round_key) in round_keys.iter_mut().enumerate() {
        for c in 0..4 {
            round_key[4 * c..4 * c + 4].copy_from_slice(&words[4 * round + c]);
        }
    }
    round_keys
}

fn add_round_key(mut state: Block, round_key: &Block) -> Block {
    for (byte, k) in state.iter_mut().zip(round_key) {
        *byte ^= k;
    }
    state
}

fn sub_bytes(state: Block) -> Block {
    state.map(|b| SBOX[b as usize])
}

fn inv_sub_bytes(state: Block) -> Block {
    state.map(|b| INV_SBOX[b as usize])
}

fn shift_rows(state: Block) -> Block {
    let mut out = [0u8; BLOCK_SIZE];
    for c in 0..4 {
        for r in 0..4 {
            out[4 * c + r] = state[4 * ((c + r) % 4) + r];
        }
    }
    out
}

fn inv_shift_rows(state: Block) -> Block {
    let mut out = [0u8; BLOCK_SIZE];
    for c in 0..4 {
        for r in 0..4 {
            out[4 * c + r] = state[4 * ((c + 4 - r) % 4) + r];
        }
    }
    out
}

/// Multiply by x in GF(2^8).
fn xtime(a: u8) -> u8 {
    (a << 1) ^ (((a >> 7) & 1) * 0x1b)
}

fn mix_columns(mut state: Block) -> Block {
    for col in state.chunks_exact_mut(4) {
        let t = col[0] ^ col[1] ^ col[2] ^ col[3];
        let u = col[0];
        col[0] ^= t ^ xtime(col[0] ^ col[1]);
        col[1] ^= t ^ xtime(col[1] ^ col[2]);
        col[2] ^= t ^ xtime(col[2] ^ col[3]);
        col[3] ^= t ^ xtime(col[3] ^ u);
    }
    state
}

fn inv_mix_columns(mut state: Block) -> Block {
    for col in state.chunks_exact_mut(4) {
        let u = xtime(xtime(col[0] ^ col[2]));
        let v = xtime(xtime(col[1] ^ col[3]));
        col[0] ^= u;
        col[1] ^= v;
        col[2] ^= u;
        col[3] ^= v;
    }
    mix_columns(state)
}

#[cfg(test)]
pub(crate) fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}
