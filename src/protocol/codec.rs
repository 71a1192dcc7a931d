//! Envelope decompression.
//!
//! Compressed frames carry an envelope: a zlib or Brotli stream that
//! inflates to zero or more complete frames laid end to end. The
//! [`Decompressor`] looks up a [`Codec`] for each protocol version, inflates
//! the body and walks the result frame by frame.
//!
//! # Failure Policy
//!
//! An envelope that fails to inflate, or would inflate past
//! [`MAX_INFLATED_SIZE`], is logged and dropped; the receive loop moves on
//! to the next socket message. A walk that hits a truncated
//! or nonsensical length stops there and keeps the frames it already cut.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::error::{Error, Result};

use super::frame::{Frame, HEADER_SIZE, ProtocolVersion, peek_length};

// ============================================================================
// Constants
// ============================================================================

/// Maximum envelope nesting followed before a frame is dropped.
///
/// The platform only ever nests one level deep.
pub const MAX_ENVELOPE_DEPTH: usize = 4;

/// Default cap on the inflated size of one envelope.
pub const MAX_INFLATED_SIZE: usize = 8 * 1024 * 1024;

// ============================================================================
// Codec
// ============================================================================

/// Decompression strategy for one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Leaf frame, body is used as is.
    Passthrough,
    /// zlib (DEFLATE with zlib header) envelope.
    Zlib,
    /// Brotli envelope.
    Brotli,
}

impl Codec {
    /// Returns a short name for logging.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Zlib => "zlib",
            Self::Brotli => "brotli",
        }
    }

    /// Inflates an envelope body, refusing to produce more than `limit`
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decompression`] if the stream is corrupt, truncated
    /// or inflates past `limit`.
    pub fn inflate(self, body: &[u8], limit: usize) -> Result<Vec<u8>> {
        let decompression = |e: io::Error| Error::decompression(self.name(), e.to_string());

        match self {
            Self::Passthrough => Ok(body.to_vec()),
            Self::Zlib => {
                let mut out = Vec::with_capacity(initial_capacity(body, limit));
                ZlibDecoder::new(body)
                    .take((limit as u64).saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(decompression)?;
                if out.len() > limit {
                    return Err(decompression(too_large(limit)));
                }
                Ok(out)
            }
            Self::Brotli => {
                let mut input = body;
                let mut out = CappedWriter {
                    buf: Vec::with_capacity(initial_capacity(body, limit)),
                    limit,
                };
                brotli::BrotliDecompress(&mut input, &mut out).map_err(decompression)?;
                Ok(out.buf)
            }
        }
    }
}

fn initial_capacity(body: &[u8], limit: usize) -> usize {
    body.len().saturating_mul(4).min(limit)
}

fn too_large(limit: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("inflated size exceeds {limit} bytes"),
    )
}

/// Output buffer that fails once it would grow past `limit`.
struct CappedWriter {
    buf: Vec<u8>,
    limit: usize,
}

impl Write for CappedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            return Err(too_large(self.limit));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Decompressor
// ============================================================================

/// Registry from protocol version to [`Codec`].
///
/// The default registry handles every version the platform defines.
/// Frames tagged with an unregistered version are dropped.
#[derive(Debug, Clone)]
pub struct Decompressor {
    codecs: FxHashMap<ProtocolVersion, Codec>,
    max_inflated_size: usize,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::empty()
            .with_codec(ProtocolVersion::Plain, Codec::Passthrough)
            .with_codec(ProtocolVersion::Popularity, Codec::Passthrough)
            .with_codec(ProtocolVersion::Zlib, Codec::Zlib)
            .with_codec(ProtocolVersion::Brotli, Codec::Brotli)
    }
}

impl Decompressor {
    /// Creates a registry with the platform's codecs.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with no codecs.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            codecs: FxHashMap::default(),
            max_inflated_size: MAX_INFLATED_SIZE,
        }
    }

    /// Registers (or replaces) the codec for a protocol version.
    #[inline]
    #[must_use]
    pub fn with_codec(mut self, version: ProtocolVersion, codec: Codec) -> Self {
        self.codecs.insert(version, codec);
        self
    }

    /// Sets the cap on the inflated size of one envelope.
    #[inline]
    #[must_use]
    pub fn with_max_inflated_size(mut self, limit: usize) -> Self {
        self.max_inflated_size = limit;
        self
    }

    /// Returns the codec registered for a protocol version.
    #[inline]
    #[must_use]
    pub fn codec_for(&self, version: ProtocolVersion) -> Option<Codec> {
        self.codecs.get(&version).copied()
    }

    /// Expands a frame into its leaf frames, in wire order.
    ///
    /// Leaf frames come back unchanged. Envelopes are inflated and their
    /// children expanded through the same path. Anything that cannot be
    /// expanded is logged and yields no frames.
    #[must_use]
    pub fn expand(&self, frame: Frame) -> Vec<Frame> {
        let mut leaves = Vec::new();
        self.expand_into(frame, 0, &mut leaves);
        leaves
    }

    fn expand_into(&self, frame: Frame, depth: usize, leaves: &mut Vec<Frame>) {
        let version = frame.protocol_version;
        let Some(codec) = self.codec_for(version) else {
            error!(%version, "Unknown protocol version, dropping frame");
            return;
        };

        if codec == Codec::Passthrough {
            leaves.push(frame);
            return;
        }

        if depth >= MAX_ENVELOPE_DEPTH {
            error!(depth, %version, "Envelope nested too deep, dropping frame");
            return;
        }

        let inflated = match codec.inflate(&frame.body, self.max_inflated_size) {
            Ok(inflated) => inflated,
            Err(e) => {
                error!(error = %e, "Dropping undecodable envelope");
                return;
            }
        };

        let children = slice_envelope(&inflated);
        trace!(
            codec = codec.name(),
            compressed = frame.body.len(),
            inflated = inflated.len(),
            children = children.len(),
            "Envelope expanded"
        );

        for child in children {
            self.expand_into(child, depth + 1, leaves);
        }
    }
}

// ============================================================================
// Envelope Walking
// ============================================================================

/// Cuts a buffer of concatenated frames into frames.
///
/// Reads the total length at the cursor, decodes exactly that many bytes
/// and advances by it until the buffer is consumed.
#[must_use]
pub fn slice_envelope(data: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let Some(length) = peek_length(data, cursor) else {
            error!(
                cursor,
                remaining = data.len() - cursor,
                "Envelope ends inside a frame length"
            );
            break;
        };

        let length = length as usize;
        let end = cursor.saturating_add(length);
        if length < HEADER_SIZE || end > data.len() {
            error!(
                cursor,
                length,
                buffer = data.len(),
                "Envelope frame length out of range"
            );
            break;
        }

        match Frame::decode(&data[cursor..end]) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                error!(cursor, error = %e, "Failed to decode envelope frame");
                break;
            }
        }
        cursor = end;
    }

    frames
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use proptest::prelude::*;

    use crate::protocol::frame::Operation;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
        writer.write_all(data).unwrap();
        writer.into_inner()
    }

    fn notifications(bodies: &[&str]) -> (Vec<Frame>, Vec<u8>) {
        let frames: Vec<Frame> = bodies
            .iter()
            .map(|body| Frame::plain(Operation::Notification, body.as_bytes().to_vec()))
            .collect();
        let buffer = frames.iter().flat_map(Frame::to_bytes).collect();
        (frames, buffer)
    }

    #[test]
    fn test_plain_is_identity() {
        let frame = Frame::plain(Operation::Notification, b"{\"cmd\":\"X\"}".to_vec());
        assert_eq!(Decompressor::new().expand(frame.clone()), vec![frame]);
    }

    #[test]
    fn test_popularity_is_identity() {
        let frame = Frame::new(
            ProtocolVersion::Popularity,
            Operation::HeartBeatResponse,
            vec![0, 0, 1, 0],
        );
        assert_eq!(Decompressor::new().expand(frame.clone()), vec![frame]);
    }

    #[test]
    fn test_zlib_envelope() {
        let (frames, buffer) = notifications(&["{\"cmd\":\"A\"}", "{\"cmd\":\"B\"}"]);
        let envelope = Frame::new(ProtocolVersion::Zlib, Operation::Notification, zlib(&buffer));

        assert_eq!(Decompressor::new().expand(envelope), frames);
    }

    #[test]
    fn test_brotli_envelope() {
        let (frames, buffer) = notifications(&["{\"cmd\":\"A\"}", "{\"cmd\":\"B\"}", "{}"]);
        let envelope = Frame::new(
            ProtocolVersion::Brotli,
            Operation::Notification,
            brotli(&buffer),
        );

        assert_eq!(Decompressor::new().expand(envelope), frames);
    }

    #[test]
    fn test_inflate_limit() {
        let data = vec![b'x'; 4096];

        assert_eq!(Codec::Zlib.inflate(&zlib(&data), 4096).unwrap(), data);
        assert_eq!(Codec::Brotli.inflate(&brotli(&data), 4096).unwrap(), data);

        let err = Codec::Zlib.inflate(&zlib(&data), 4095).unwrap_err();
        assert!(matches!(err, Error::Decompression { codec: "zlib", .. }));
        let err = Codec::Brotli.inflate(&brotli(&data), 1024).unwrap_err();
        assert!(matches!(err, Error::Decompression { codec: "brotli", .. }));
    }

    #[test]
    fn test_oversized_envelope_yields_nothing() {
        let (_, buffer) = notifications(&["{\"cmd\":\"A\"}"; 64]);
        let envelope = Frame::new(ProtocolVersion::Zlib, Operation::Notification, zlib(&buffer));

        let decompressor = Decompressor::new().with_max_inflated_size(buffer.len() - 1);
        assert!(decompressor.expand(envelope.clone()).is_empty());

        let decompressor = Decompressor::new().with_max_inflated_size(buffer.len());
        assert_eq!(decompressor.expand(envelope).len(), 64);
    }

    #[test]
    fn test_corrupt_zlib_yields_nothing() {
        let envelope = Frame::new(
            ProtocolVersion::Zlib,
            Operation::Notification,
            b"not a zlib stream".to_vec(),
        );
        assert!(Decompressor::new().expand(envelope).is_empty());
    }

    #[test]
    fn test_corrupt_brotli_yields_nothing() {
        let (_, buffer) = notifications(&["{\"cmd\":\"DANMU_MSG\",\"info\":[1,2,3]}"]);
        let mut compressed = brotli(&buffer);
        compressed.truncate(compressed.len() / 2);

        let envelope = Frame::new(ProtocolVersion::Brotli, Operation::Notification, compressed);
        assert!(Decompressor::new().expand(envelope).is_empty());
    }

    #[test]
    fn test_empty_brotli_body_yields_nothing() {
        let envelope = Frame::new(ProtocolVersion::Brotli, Operation::Notification, Vec::new());
        assert!(Decompressor::new().expand(envelope).is_empty());
    }

    #[test]
    fn test_unknown_version_dropped() {
        let frame = Frame::new(ProtocolVersion::Unknown(7), Operation::Notification, vec![1]);
        assert!(Decompressor::new().expand(frame).is_empty());
    }

    #[test]
    fn test_nested_envelope() {
        let (frames, buffer) = notifications(&["{\"cmd\":\"INNER\"}"]);
        let inner = Frame::new(ProtocolVersion::Zlib, Operation::Notification, zlib(&buffer));
        let outer = Frame::new(
            ProtocolVersion::Brotli,
            Operation::Notification,
            brotli(&inner.to_bytes()),
        );

        assert_eq!(Decompressor::new().expand(outer), frames);
    }

    #[test]
    fn test_nesting_limit() {
        let (_, buffer) = notifications(&["{}"]);
        let mut frame = Frame::new(ProtocolVersion::Zlib, Operation::Notification, zlib(&buffer));
        for _ in 0..MAX_ENVELOPE_DEPTH {
            frame = Frame::new(
                ProtocolVersion::Zlib,
                Operation::Notification,
                zlib(&frame.to_bytes()),
            );
        }
        assert!(Decompressor::new().expand(frame).is_empty());
    }

    #[test]
    fn test_registry_override() {
        let decompressor = Decompressor::empty().with_codec(ProtocolVersion::Plain, Codec::Passthrough);
        assert_eq!(decompressor.codec_for(ProtocolVersion::Zlib), None);

        let envelope = Frame::new(ProtocolVersion::Zlib, Operation::Notification, zlib(b""));
        assert!(decompressor.expand(envelope).is_empty());
    }

    #[test]
    fn test_slice_envelope_truncated_tail() {
        let (frames, mut buffer) = notifications(&["{\"a\":1}", "{\"b\":2}"]);
        buffer.extend_from_slice(&[0, 0]);

        assert_eq!(slice_envelope(&buffer), frames);
    }

    #[test]
    fn test_slice_envelope_overlong_length() {
        let (frames, mut buffer) = notifications(&["{\"a\":1}"]);
        let mut bad = Frame::plain(Operation::Notification, b"xyz".to_vec()).to_bytes();
        bad[3] = 200;
        buffer.extend_from_slice(&bad);

        assert_eq!(slice_envelope(&buffer), frames);
    }

    #[test]
    fn test_slice_envelope_zero_length_stops() {
        assert!(slice_envelope(&[0, 0, 0, 0, 1, 2, 3]).is_empty());
    }

    #[test]
    fn test_slice_envelope_empty() {
        assert!(slice_envelope(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_envelope_reslicing(
            bodies in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..128),
                0..16,
            ),
        ) {
            let frames: Vec<Frame> = bodies
                .into_iter()
                .map(|body| Frame::plain(Operation::Notification, body))
                .collect();
            let buffer: Vec<u8> = frames.iter().flat_map(Frame::to_bytes).collect();

            let sliced = slice_envelope(&buffer);
            prop_assert_eq!(sliced.len(), frames.len());
            for (sliced, original) in sliced.iter().zip(&frames) {
                prop_assert_eq!(sliced.to_bytes(), original.to_bytes());
            }
        }
    }
}
