//! ADB message framing.
//!
//! Every message is a 24-byte little-endian header optionally followed by a
//! payload. The `data_crc32` field is, despite its name, a plain byte sum;
//! `magic` is the bitwise complement of the command word.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{AdbError, AdbResult};

/// Protocol version advertised in CNXN.
pub const VERSION: u32 = 0x0100_0000;

/// Largest payload this client accepts or advertises.
pub const MAX_PAYLOAD: usize = 256 * 1024;

const HEADER_LEN: usize = 24;

/// AUTH message subtypes carried in `arg0`.
pub mod auth_type {
    /// Device-issued 20-byte challenge.
    pub const TOKEN: u32 = 1;
    /// Host-issued PKCS#1 v1.5 signature of the challenge.
    pub const SIGNATURE: u32 = 2;
    /// Host-issued Android-format RSA public key.
    pub const RSAPUBLICKEY: u32 = 3;
}

/// Commands understood by this client.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Command {
    /// Connection banner exchange.
    Connect,
    /// Authentication challenge/response.
    Auth,
    /// Stream open request.
    Open,
    /// Stream acknowledgement.
    Okay,
    /// Stream payload.
    Write,
    /// Stream close.
    Close,
}

impl Command {
    /// Returns the little-endian wire word for the command.
    #[must_use]
    pub const fn wire(self) -> u32 {
        match self {
            Self::Connect => 0x4E58_4E43, // "CNXN"
            Self::Auth => 0x4854_5541,    // "AUTH"
            Self::Open => 0x4E45_504F,    // "OPEN"
            Self::Okay => 0x5941_4B4F,    // "OKAY"
            Self::Write => 0x4554_5257,   // "WRTE"
            Self::Close => 0x4553_4C43,   // "CLSE"
        }
    }

    /// Decodes a wire word, rejecting unknown commands.
    #[must_use]
    pub const fn from_wire(word: u32) -> Option<Self> {
        match word {
            0x4E58_4E43 => Some(Self::Connect),
            0x4854_5541 => Some(Self::Auth),
            0x4E45_504F => Some(Self::Open),
            0x5941_4B4F => Some(Self::Okay),
            0x4554_5257 => Some(Self::Write),
            0x4553_4C43 => Some(Self::Close),
            _ => None,
        }
    }
}

/// A single ADB message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Message command.
    pub command: Command,
    /// First command argument.
    pub arg0: u32,
    /// Second command argument.
    pub arg1: u32,
    /// Message payload, possibly empty.
    pub payload: Bytes,
}

impl Packet {
    /// Creates a packet with the supplied payload.
    #[must_use]
    pub fn new(command: Command, arg0: u32, arg1: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            arg0,
            arg1,
            payload: payload.into(),
        }
    }

    /// Creates a payload-less packet.
    #[must_use]
    pub fn empty(command: Command, arg0: u32, arg1: u32) -> Self {
        Self::new(command, arg0, arg1, Bytes::new())
    }

    /// The protocol's payload "checksum": a wrapping byte sum.
    #[must_use]
    pub fn checksum(payload: &[u8]) -> u32 {
        payload
            .iter()
            .fold(0u32, |sum, byte| sum.wrapping_add(u32::from(*byte)))
    }

    /// Encodes header and payload into a single buffer.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let command = self.command.wire();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u32_le(command);
        buf.put_u32_le(self.arg0);
        buf.put_u32_le(self.arg1);
        buf.put_u32_le(u32::try_from(self.payload.len()).unwrap_or(u32::MAX));
        buf.put_u32_le(Self::checksum(&self.payload));
        buf.put_u32_le(command ^ 0xFFFF_FFFF);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Reads and validates one packet from the transport.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Protocol`] for unknown commands, bad magic, bad
    /// checksums, or oversized payloads, and [`AdbError::Io`] for transport
    /// failures.
    pub async fn read_from<R>(reader: &mut R) -> AdbResult<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).await?;

        let word = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
        let command_word = word(0);
        let arg0 = word(4);
        let arg1 = word(8);
        let data_length = word(12);
        let data_checksum = word(16);
        let magic = word(20);

        let command = Command::from_wire(command_word)
            .ok_or_else(|| AdbError::protocol(format!("unknown command {command_word:#010x}")))?;
        if magic != command_word ^ 0xFFFF_FFFF {
            return Err(AdbError::protocol(format!(
                "bad magic {magic:#010x} for command {command_word:#010x}"
            )));
        }
        let data_length = data_length as usize;
        if data_length > MAX_PAYLOAD {
            return Err(AdbError::protocol(format!(
                "payload of {data_length} bytes exceeds the {MAX_PAYLOAD} byte limit"
            )));
        }

        let mut payload = vec![0u8; data_length];
        reader.read_exact(&mut payload).await?;
        if Self::checksum(&payload) != data_checksum {
            return Err(AdbError::protocol("payload checksum mismatch"));
        }

        Ok(Self {
            command,
            arg0,
            arg1,
            payload: Bytes::from(payload),
        })
    }

    /// Writes the packet to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Io`] for transport failures.
    pub async fn write_to<W>(&self, writer: &mut W) -> AdbResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn encode_decode_round_trip() {
        let packet = Packet::new(Command::Write, 7, 9, Bytes::from_static(b"hello"));
        let encoded = packet.encode();

        let mut cursor = Cursor::new(encoded.to_vec());
        let decoded = Packet::read_from(&mut cursor).await.unwrap();
        assert_eq!(decoded, packet);
    }

    #[tokio::test]
    async fn rejects_bad_magic() {
        let mut encoded = Packet::empty(Command::Okay, 1, 2).encode().to_vec();
        encoded[20] ^= 0xFF;

        let mut cursor = Cursor::new(encoded);
        let err = Packet::read_from(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AdbError::Protocol { .. }));
    }

    #[tokio::test]
    async fn rejects_checksum_mismatch() {
        let mut encoded = Packet::new(Command::Write, 1, 2, Bytes::from_static(b"abc"))
            .encode()
            .to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        let mut cursor = Cursor::new(encoded);
        let err = Packet::read_from(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AdbError::Protocol { .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_command() {
        let mut encoded = Packet::empty(Command::Okay, 0, 0).encode().to_vec();
        encoded[0] = 0x00;
        // Keep magic consistent so the command check fires first.
        let word = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        encoded[20..24].copy_from_slice(&(word ^ 0xFFFF_FFFF).to_le_bytes());

        let mut cursor = Cursor::new(encoded);
        let err = Packet::read_from(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AdbError::Protocol { .. }));
    }

    #[tokio::test]
    async fn rejects_oversized_payload() {
        let mut encoded = Packet::empty(Command::Write, 0, 0).encode().to_vec();
        let oversize = u32::try_from(MAX_PAYLOAD + 1).unwrap();
        encoded[12..16].copy_from_slice(&oversize.to_le_bytes());

        let mut cursor = Cursor::new(encoded);
        let err = Packet::read_from(&mut cursor).await.unwrap_err();
        assert!(matches!(err, AdbError::Protocol { .. }));
    }

    #[test]
    fn checksum_is_a_byte_sum() {
        assert_eq!(Packet::checksum(b""), 0);
        assert_eq!(Packet::checksum(b"\x01\x02\x03"), 6);
        assert_eq!(Packet::checksum(&[0xFF; 4]), 0x3FC);
    }
}
