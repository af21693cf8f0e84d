// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! RouterOS wire protocol helpers
//!
//! A word is a length-prefixed byte string, a sentence is a sequence of
//! words terminated by a zero-length word.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{AppError, Result};

/// Largest word accepted from the wire (16 MiB)
pub(crate) const MAX_WORD_LEN: usize = 0x0100_0000;

/// Encodes a word length as its 1 to 5 byte prefix.
///
/// Lengths that do not fit in 28 bits use the `0xF0` marker followed by a
/// big-endian `u32`; callers reject anything wider before encoding.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_length(len: usize) -> Vec<u8> {
    let value = len as u32;
    let (marker, width): (u32, usize) = match value {
        0..=0x7F => (0, 1),
        0x80..=0x3FFF => (0x8000, 2),
        0x4000..=0x1F_FFFF => (0x00C0_0000, 3),
        0x20_0000..=0x0FFF_FFFF => (0xE000_0000, 4),
        _ => {
            let mut out = Vec::with_capacity(5);
            out.push(0xF0);
            out.extend_from_slice(&value.to_be_bytes());
            return out;
        }
    };
    (value | marker).to_be_bytes()[4 - width..].to_vec()
}

/// Encodes a full sentence, including the zero-length terminator.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] if a word does not fit the 32-bit length
/// field.
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Result<Vec<u8>> {
    let total: usize = words.iter().map(|w| w.as_ref().len() + 5).sum();
    let mut out = Vec::with_capacity(total + 1);
    for word in words {
        let bytes = word.as_ref().as_bytes();
        if u32::try_from(bytes.len()).is_err() {
            return Err(AppError::Protocol(format!(
                "word of {} bytes exceeds the protocol limit",
                bytes.len()
            )));
        }
        out.extend_from_slice(&encode_length(bytes.len()));
        out.extend_from_slice(bytes);
    }
    out.push(0);
    Ok(out)
}

/// Writes one sentence and flushes the stream.
pub async fn write_sentence<W, S>(stream: &mut W, words: &[S]) -> Result<()>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let buf = encode_sentence(words)?;
    stream.write_all(&buf).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads a length prefix. The count of leading one bits in the first byte
/// gives the number of continuation bytes.
pub async fn read_length<R: AsyncRead + Unpin>(stream: &mut R) -> Result<usize> {
    let first = stream.read_u8().await?;
    let (extra, mask) = match first.leading_ones() {
        0 => return Ok(usize::from(first)),
        1 => (1, 0x3F),
        2 => (2, 0x1F),
        3 => (3, 0x0F),
        4 if first == 0xF0 => (4, 0x00),
        _ => {
            return Err(AppError::Protocol(format!(
                "reserved control byte {first:#04X} in length prefix"
            )));
        }
    };
    let mut len = usize::from(first & mask);
    for _ in 0..extra {
        len = (len << 8) | usize::from(stream.read_u8().await?);
    }
    Ok(len)
}

pub async fn read_word<R: AsyncRead + Unpin>(stream: &mut R) -> Result<String> {
    let len = read_length(stream).await?;
    if len == 0 {
        return Ok(String::new());
    }
    if len > MAX_WORD_LEN {
        return Err(AppError::Protocol(format!(
            "word length {len} exceeds limit of {MAX_WORD_LEN} bytes"
        )));
    }
    let mut word = vec![0; len];
    stream.read_exact(&mut word).await?;
    Ok(String::from_utf8_lossy(&word).into_owned())
}

/// Reads words until the zero-length terminator.
///
/// A zero-length word can only end a sentence, so an empty word list is
/// returned as an empty sentence.
pub async fn read_sentence<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<String>> {
    let mut words = Vec::new();
    loop {
        let word = read_word(stream).await?;
        if word.is_empty() {
            return Ok(words);
        }
        words.push(word);
    }
}
