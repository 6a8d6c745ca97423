//! Frame codecs for the peer wire.
//!
//! The baseline wire is one message per `\n`-terminated line. Because the
//! line format cannot carry payloads containing line breaks, a
//! length-prefixed framing (4-byte big-endian length, then the UTF-8 body)
//! is available as an alternative. Both ends of a connection must agree on
//! the framing; there is no negotiation.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder, LengthDelimitedCodec,
};

/// Upper bound on a single frame, in bytes.
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    #[default]
    Newline,
    LengthPrefixed,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Framing::Newline => write!(f, "newline"),
            Framing::LengthPrefixed => write!(f, "length-prefixed"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newline" => Ok(Framing::Newline),
            "length-prefixed" => Ok(Framing::LengthPrefixed),
            other => Err(format!(
                "unknown framing '{}', expected 'newline' or 'length-prefixed'",
                other
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("payload contains a line break and cannot be newline-framed")]
    EmbeddedNewline,
    #[error("frame exceeds the {} byte limit", MAX_FRAME_LENGTH)]
    TooLong,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AnyDelimiterCodecError> for FramingError {
    fn from(err: AnyDelimiterCodecError) -> Self {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => FramingError::TooLong,
            AnyDelimiterCodecError::Io(e) => FramingError::Io(e),
        }
    }
}

/// Checks that `text` can be sent as a single frame under `framing`.
pub fn check_frame(framing: Framing, text: &str) -> Result<(), FramingError> {
    if text.len() > MAX_FRAME_LENGTH {
        return Err(FramingError::TooLong);
    }
    if framing == Framing::Newline && text.contains(|c: char| c == '\n' || c == '\r') {
        return Err(FramingError::EmbeddedNewline);
    }
    Ok(())
}

/// One frame read off a peer stream.
///
/// A body that is not UTF-8 is still correctly delimited, so it is handed
/// up as `Undecodable` and the stream stays usable for the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Undecodable(Bytes),
}

impl Frame {
    fn from_body(body: Bytes) -> Self {
        match std::str::from_utf8(&body) {
            Ok(text) => Frame::Text(text.to_string()),
            Err(_) => Frame::Undecodable(body),
        }
    }
}

#[derive(Debug)]
enum Inner {
    Newline(AnyDelimiterCodec),
    LengthPrefixed(LengthDelimitedCodec),
}

/// Frame codec used on every peer connection.
#[derive(Debug)]
pub struct PeerCodec {
    framing: Framing,
    inner: Inner,
}

impl PeerCodec {
    pub fn new(framing: Framing) -> Self {
        let inner = match framing {
            Framing::Newline => Inner::Newline(AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                b"\n".to_vec(),
                MAX_FRAME_LENGTH,
            )),
            Framing::LengthPrefixed => Inner::LengthPrefixed(
                LengthDelimitedCodec::builder()
                    .max_frame_length(MAX_FRAME_LENGTH)
                    .new_codec(),
            ),
        };
        PeerCodec { framing, inner }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}

impl Decoder for PeerCodec {
    type Item = Frame;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        let body = match &mut self.inner {
            Inner::Newline(codec) => codec.decode(src)?.map(|line| {
                if line.ends_with(b"\r") {
                    line.slice(..line.len() - 1)
                } else {
                    line
                }
            }),
            Inner::LengthPrefixed(codec) => codec.decode(src)?.map(BytesMut::freeze),
        };
        Ok(body.map(Frame::from_body))
    }

    /// An unterminated tail left when the stream ends is not a frame.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for PeerCodec {
    type Error = FramingError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), FramingError> {
        check_frame(self.framing, &item)?;
        match &mut self.inner {
            Inner::Newline(codec) => Ok(codec.encode(item, dst)?),
            Inner::LengthPrefixed(codec) => Ok(codec.encode(Bytes::from(item), dst)?),
        }
    }
}
