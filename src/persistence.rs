//! Reading and writing the records.

use std::fmt::Debug;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::prelude::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Protocol Buffers binary encoding
    #[default]
    Binary,

    /// JSON rendering of the same record
    Text,
}

impl Format {
    pub const fn from_text_flag(text: bool) -> Self {
        if text {
            Self::Text
        } else {
            Self::Binary
        }
    }
}

#[instrument(level = "debug", skip_all, fields(path = ?path))]
pub fn read_message<M>(path: impl AsRef<Path> + Debug) -> Result<M>
where
    M: Message + Default + DeserializeOwned,
{
    let buffer = fs::read(&path).with_context(|| format!("failed to read `{:?}`", path))?;
    decode_message(&buffer).with_context(|| format!("failed to parse `{:?}`", path))
}

pub fn decode_message<M>(buffer: &[u8]) -> Result<M>
where
    M: Message + Default + DeserializeOwned,
{
    match sniff_format(buffer) {
        Format::Text => serde_json::from_slice(buffer)
            .context("failed to deserialize the JSON record")
            .or_else(|error| match buffer.first() {
                Some(&b'{') => Err(error),
                // `\n{` also starts a protobuf record with a 123-byte first field.
                _ => M::decode(buffer).map_err(|_| error),
            }),
        Format::Binary => M::decode(buffer).context("failed to decode the protobuf record"),
    }
}

#[instrument(level = "debug", skip_all, fields(path = ?path))]
pub fn write_message<M>(path: impl AsRef<Path> + Debug, message: &M, format: Format) -> Result
where
    M: Message + Serialize,
{
    let buffer = encode_message(message, format)?;
    fs::write(&path, buffer).with_context(|| format!("failed to write `{:?}`", path))?;
    debug!(?format, "saved");
    Ok(())
}

pub fn encode_message<M>(message: &M, format: Format) -> Result<Vec<u8>>
where
    M: Message + Serialize,
{
    match format {
        Format::Binary => Ok(message.encode_to_vec()),
        Format::Text => {
            serde_json::to_vec_pretty(message).context("failed to serialize the JSON record")
        }
    }
}

/// JSON documents start with `{`, which never starts any of our protobuf records.
/// Leading whitespace is only skipped for valid UTF-8, since `\n` is a protobuf tag byte,
/// and such a guess falls back to protobuf in [`decode_message`].
fn sniff_format(buffer: &[u8]) -> Format {
    match buffer.first() {
        Some(&b'{') => Format::Text,
        Some(byte) if byte.is_ascii_whitespace() => match std::str::from_utf8(buffer) {
            Ok(text) if text.trim_start().starts_with('{') => Format::Text,
            _ => Format::Binary,
        },
        _ => Format::Binary,
    }
}
