// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Shodan-compatible favicon hashing
//!
//! The favicon bytes are base64 encoded with a line break every 76
//! characters (and after the last line), then hashed with 32-bit
//! MurmurHash3, seed 0, read as a signed integer. The value can be searched
//! directly as `http.favicon.hash:<n>`.

use std::time::Duration;

use base64::Engine as _;
use tracing::debug;

use crate::error::{Error, Result};

/// Timeout for fetching a favicon
pub const FAVICON_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const BASE64_LINE: usize = 76;

/// 32-bit MurmurHash3 (x86 variant)
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let mut k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);

        h ^= k;
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k ^= u32::from(*byte) << (8 * i);
        }
        h ^= k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Base64 with a newline after every 76 characters and at the end
pub fn shodan_base64(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE + 1);

    for line in encoded.as_bytes().chunks(BASE64_LINE) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out
}

/// Shodan favicon hash of raw icon bytes
pub fn favicon_hash(data: &[u8]) -> i32 {
    murmur3_32(shodan_base64(data).as_bytes(), 0) as i32
}

/// Fetch a favicon and hash it. Non-200 responses are errors.
pub async fn fetch_favicon_hash(client: &reqwest::Client, url: &str) -> Result<i32> {
    if url.is_empty() {
        return Err(Error::other("empty favicon URL"));
    }

    let response = client
        .get(url)
        .timeout(FAVICON_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::timeout_with_url("favicon fetch", FAVICON_FETCH_TIMEOUT.as_millis() as u64, url)
            } else {
                e.into()
            }
        })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(Error::other(format!(
            "favicon fetch returned status {}",
            status.as_u16()
        )));
    }

    let bytes = response.bytes().await?;
    let hash = favicon_hash(&bytes);
    debug!(%url, size = bytes.len(), hash, "favicon hashed");
    Ok(hash)
}
