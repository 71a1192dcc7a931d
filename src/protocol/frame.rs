//! Binary frame encoding and decoding.
//!
//! Every message on the socket is one frame with a 16-byte header:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────┬──────────────┬─────────┐
//! │ Total Length │ Header Length│ Protocol Ver │ Operation    │ Sequence ID  │ Body    │
//! │ 4 bytes      │ 2 bytes (16) │ 2 bytes      │ 4 bytes      │ 4 bytes (1)  │ ...     │
//! │ uint32 BE    │ uint16 BE    │ uint16 BE    │ uint32 BE    │ uint32 BE    │         │
//! └──────────────┴──────────────┴──────────────┴──────────────┴──────────────┴─────────┘
//! ```
//!
//! Decoding is lenient about the declared length: the platform is known to
//! send frames whose header disagrees with the message size, so a mismatch
//! is logged and the declared length is trusted for slicing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::error;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Header length value written into every frame.
pub const HEADER_LENGTH: u16 = HEADER_SIZE as u16;

/// Sequence id written into every outgoing frame.
pub const SEQUENCE_ID: u32 = 1;

// ============================================================================
// ProtocolVersion
// ============================================================================

/// Body encoding of a frame.
///
/// Unknown tags are kept verbatim so a decoded frame re-encodes bit-exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Uncompressed body, usually JSON.
    Plain,
    /// Uncompressed body carrying a 4-byte popularity count.
    Popularity,
    /// zlib envelope of concatenated frames.
    Zlib,
    /// Brotli envelope of concatenated frames.
    Brotli,
    /// Tag not known to this client.
    Unknown(u16),
}

impl ProtocolVersion {
    /// Returns the wire code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Plain => 0,
            Self::Popularity => 1,
            Self::Zlib => 2,
            Self::Brotli => 3,
            Self::Unknown(code) => code,
        }
    }

    /// Returns `true` if the body is a compressed envelope.
    #[inline]
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        matches!(self, Self::Zlib | Self::Brotli)
    }
}

impl From<u16> for ProtocolVersion {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::Plain,
            1 => Self::Popularity,
            2 => Self::Zlib,
            3 => Self::Brotli,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Popularity => f.write_str("popularity"),
            Self::Zlib => f.write_str("zlib"),
            Self::Brotli => f.write_str("brotli"),
            Self::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

// ============================================================================
// Operation
// ============================================================================

/// Frame operation.
///
/// Codes are fixed by the platform and not contiguous; 0, 1, 4 and 6 are
/// reserved and decode as [`Operation::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Client keep-alive.
    HeartBeat,
    /// Server keep-alive reply, body is the popularity count.
    HeartBeatResponse,
    /// Server push, body is a JSON event.
    Notification,
    /// Client room-enter handshake.
    RoomEnter,
    /// Server reply to the handshake.
    RoomEnterResponse,
    /// Code not known to this client.
    Unknown(u32),
}

impl Operation {
    /// Returns the wire code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::HeartBeat => 2,
            Self::HeartBeatResponse => 3,
            Self::Notification => 5,
            Self::RoomEnter => 7,
            Self::RoomEnterResponse => 8,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u32> for Operation {
    fn from(code: u32) -> Self {
        match code {
            2 => Self::HeartBeat,
            3 => Self::HeartBeatResponse,
            5 => Self::Notification,
            7 => Self::RoomEnter,
            8 => Self::RoomEnterResponse,
            other => Self::Unknown(other),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One length-prefixed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte length of the whole frame, header included.
    pub total_length: u32,
    /// Header length (16).
    pub header_length: u16,
    /// Body encoding.
    pub protocol_version: ProtocolVersion,
    /// Frame operation.
    pub operation: Operation,
    /// Sequence id, passed through untouched.
    pub sequence_id: u32,
    /// Opaque payload.
    pub body: Vec<u8>,
}

impl Frame {
    /// Creates a frame, computing its total length from the body.
    #[must_use]
    pub fn new(protocol_version: ProtocolVersion, operation: Operation, body: Vec<u8>) -> Self {
        Self {
            total_length: (HEADER_SIZE + body.len()) as u32,
            header_length: HEADER_LENGTH,
            protocol_version,
            operation,
            sequence_id: SEQUENCE_ID,
            body,
        }
    }

    /// Creates an uncompressed frame.
    #[inline]
    #[must_use]
    pub fn plain(operation: Operation, body: Vec<u8>) -> Self {
        Self::new(ProtocolVersion::Plain, operation, body)
    }

    /// Creates a zero-body heartbeat frame.
    #[inline]
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::plain(Operation::HeartBeat, Vec::new())
    }

    /// Serializes the frame, backfilling the total length from the body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let total = HEADER_SIZE + self.body.len();
        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&(total as u32).to_be_bytes());
        buf.extend_from_slice(&HEADER_LENGTH.to_be_bytes());
        buf.extend_from_slice(&self.protocol_version.code().to_be_bytes());
        buf.extend_from_slice(&self.operation.code().to_be_bytes());
        buf.extend_from_slice(&self.sequence_id.to_be_bytes());
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Decodes one frame from `data`.
    ///
    /// A declared length that disagrees with `data.len()` is logged and the
    /// declared length wins. Trailing bytes past it are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Framing`] if the buffer is shorter than a header or
    /// the declared length cannot be sliced from it.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::framing(format!(
                "buffer of {} bytes is shorter than the {HEADER_SIZE}-byte header",
                data.len()
            )));
        }

        let declared = read_u32(data, 0);
        if declared as usize != data.len() {
            error!(
                declared,
                actual = data.len(),
                "Frame length does not match buffer length"
            );
        }

        let end = declared as usize;
        if end < HEADER_SIZE || end > data.len() {
            return Err(Error::framing(format!(
                "declared length {declared} cannot be sliced from {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            total_length: declared,
            header_length: read_u16(data, 4),
            protocol_version: ProtocolVersion::from(read_u16(data, 6)),
            operation: Operation::from(read_u32(data, 8)),
            sequence_id: read_u32(data, 12),
            body: data[HEADER_SIZE..end].to_vec(),
        })
    }

    /// Returns `true` if the body needs no further decompression.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !self.protocol_version.is_compressed()
    }

    /// Returns the popularity count carried by this frame, if any.
    ///
    /// Both popularity-tagged frames and heartbeat responses carry a
    /// big-endian `u32` as their body.
    #[must_use]
    pub fn popularity(&self) -> Option<u32> {
        let carries_count = self.protocol_version == ProtocolVersion::Popularity
            || self.operation == Operation::HeartBeatResponse;
        if !carries_count || self.body.len() < 4 {
            return None;
        }
        Some(read_u32(&self.body, 0))
    }

    /// Returns the body as UTF-8 text, if valid.
    #[inline]
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

// ============================================================================
// Free Functions
// ============================================================================

/// Encodes a frame from its parts.
#[inline]
#[must_use]
pub fn encode(protocol_version: ProtocolVersion, operation: Operation, body: &[u8]) -> Vec<u8> {
    Frame::new(protocol_version, operation, body.to_vec()).to_bytes()
}

/// Reads the declared total length at `offset`, if four bytes remain.
#[inline]
pub(crate) fn peek_length(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink collecting formatted output.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_heartbeat_bytes() {
        let bytes = Frame::heartbeat().to_bytes();
        assert_eq!(bytes, [0, 0, 0, 16, 0, 16, 0, 0, 0, 0, 0, 2, 0, 0, 0, 1]);
    }

    #[test]
    fn test_encode_backfills_total_length() {
        let bytes = encode(ProtocolVersion::Plain, Operation::Notification, b"hello");
        assert_eq!(bytes.len(), 21);
        assert_eq!(&bytes[0..4], &21u32.to_be_bytes());
        assert_eq!(&bytes[16..], b"hello");
    }

    #[test]
    fn test_decode_reads_fields() {
        let bytes = encode(ProtocolVersion::Brotli, Operation::Notification, b"{}");
        let frame = Frame::decode(&bytes).unwrap();

        assert_eq!(frame.total_length, 18);
        assert_eq!(frame.header_length, 16);
        assert_eq!(frame.protocol_version, ProtocolVersion::Brotli);
        assert_eq!(frame.operation, Operation::Notification);
        assert_eq!(frame.sequence_id, 1);
        assert_eq!(frame.body, b"{}");
    }

    #[test]
    fn test_decode_declared_shorter_than_buffer() {
        let mut bytes = encode(ProtocolVersion::Plain, Operation::Notification, b"abc");
        bytes.extend_from_slice(b"trailing garbage");

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let frame = tracing::subscriber::with_default(subscriber, || Frame::decode(&bytes).unwrap());

        assert_eq!(frame.total_length, 19);
        assert_eq!(frame.body, b"abc");

        let output = logs.contents();
        assert!(output.contains("Frame length does not match buffer length"));
        assert!(output.contains("declared=19"));
        assert!(output.contains("actual=35"));
    }

    #[test]
    fn test_decode_matching_length_logs_nothing() {
        let bytes = encode(ProtocolVersion::Plain, Operation::Notification, b"abc");

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt().with_writer(logs.clone()).finish();
        tracing::subscriber::with_default(subscriber, || Frame::decode(&bytes).unwrap());

        assert!(logs.contents().is_empty());
    }

    #[test]
    fn test_decode_declared_longer_than_buffer() {
        let mut bytes = encode(ProtocolVersion::Plain, Operation::Notification, b"abcdef");
        bytes.truncate(18);

        let err = Frame::decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::Framing { .. }));
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = Frame::decode(&[0, 0, 0, 16, 0, 16]).unwrap_err();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_decode_declared_below_header() {
        let mut bytes = Frame::heartbeat().to_bytes();
        bytes[3] = 4;
        assert!(Frame::decode(&bytes).is_err());
    }

    #[test]
    fn test_reserved_operation_preserved() {
        let bytes = encode(ProtocolVersion::Plain, Operation::Unknown(6), b"");
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.operation, Operation::Unknown(6));
        assert_eq!(frame.to_bytes(), bytes);
    }

    #[test]
    fn test_unknown_protocol_version_preserved() {
        let bytes = encode(ProtocolVersion::Unknown(9), Operation::Notification, b"x");
        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.protocol_version.code(), 9);
        assert!(frame.is_leaf());
    }

    #[test]
    fn test_popularity() {
        let frame = Frame::new(
            ProtocolVersion::Popularity,
            Operation::HeartBeatResponse,
            1234u32.to_be_bytes().to_vec(),
        );
        assert_eq!(frame.popularity(), Some(1234));

        let notification = Frame::plain(Operation::Notification, vec![0, 0, 0, 1]);
        assert_eq!(notification.popularity(), None);
    }

    #[test]
    fn test_peek_length() {
        let bytes = Frame::heartbeat().to_bytes();
        assert_eq!(peek_length(&bytes, 0), Some(16));
        assert_eq!(peek_length(&bytes, 14), None);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            version in any::<u16>(),
            operation in any::<u32>(),
            body in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let bytes = encode(version.into(), operation.into(), &body);
            prop_assert_eq!(bytes.len(), HEADER_SIZE + body.len());

            let frame = Frame::decode(&bytes).unwrap();
            prop_assert_eq!(frame.protocol_version.code(), version);
            prop_assert_eq!(frame.operation.code(), operation);
            prop_assert_eq!(frame.total_length as usize, HEADER_SIZE + body.len());
            prop_assert_eq!(frame.body, body);
        }
    }
}
