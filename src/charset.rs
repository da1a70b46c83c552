//! Character encodings and the scoped text wrappers built on them.
//!
//! Labels name the charset they say: `ISO-8859-1` and `US-ASCII` are the
//! single-byte charsets, not their web supersets, and `UTF-16` writes a
//! big-endian byte order mark. Other labels resolve through the WHATWG
//! registry. Characters a charset cannot represent are written as `?`.
//! Wrappers borrow the host stream and never close it.

use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::str::FromStr;

use encoding_rs::{CoderResult, Decoder, Encoder, EncoderResult, Encoding};

use crate::error::ScriptError;

const BUFFER_CAPACITY: usize = 8 * 1024;
const UNMAPPABLE: u8 = b'?';

const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "iso8859_1",
    "8859_1",
    "latin1",
    "l1",
    "iso-ir-100",
    "cp819",
    "ibm819",
    "csisolatin1",
];
const ASCII_LABELS: &[&str] = &[
    "us-ascii",
    "ascii",
    "us",
    "iso646-us",
    "646",
    "ascii7",
    "cp367",
    "ibm367",
    "csascii",
    "iso-ir-6",
    "ansi_x3.4-1968",
];
const UTF16_LABELS: &[&str] = &["utf-16", "utf16"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Latin1,
    Ascii,
    /// Big-endian with a byte order mark on write; the mark is honored on read.
    Utf16,
    Registry(&'static Encoding),
}

/// Validated character encoding identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    kind: Kind,
}

impl Charset {
    /// Resolves a charset label, failing before any stream is touched.
    pub fn for_label(label: &str) -> Result<Self, ScriptError> {
        let normalized = label.trim().to_ascii_lowercase();
        let kind = if LATIN1_LABELS.contains(&normalized.as_str()) {
            Kind::Latin1
        } else if ASCII_LABELS.contains(&normalized.as_str()) {
            Kind::Ascii
        } else if UTF16_LABELS.contains(&normalized.as_str()) {
            Kind::Utf16
        } else {
            match Encoding::for_label(normalized.as_bytes()) {
                Some(encoding) if encoding != encoding_rs::REPLACEMENT => Kind::Registry(encoding),
                _ => return Err(ScriptError::invalid_encoding(label)),
            }
        };
        Ok(Self { kind })
    }

    #[must_use]
    pub fn utf8() -> Self {
        Self {
            kind: Kind::Registry(encoding_rs::UTF_8),
        }
    }

    /// Canonical name of the encoding.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            Kind::Latin1 => "ISO-8859-1",
            Kind::Ascii => "US-ASCII",
            Kind::Utf16 => "UTF-16",
            Kind::Registry(encoding) => encoding.name(),
        }
    }

    /// Encodes `text` in one shot.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut writer = TextWriter::new(&mut out, *self);
            // Writes into a Vec cannot fail.
            let _ = writer.write_str(text);
            let _ = writer.close();
        }
        out
    }

    /// Decodes `bytes` in one shot, replacing malformed sequences.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self.kind {
            Kind::Latin1 | Kind::Ascii => {
                let mut text = String::with_capacity(bytes.len());
                text.extend(bytes.iter().map(|&byte| self.byte_char(byte)));
                text
            }
            Kind::Utf16 => encoding_rs::UTF_16BE.decode(bytes).0.into_owned(),
            Kind::Registry(encoding) => encoding
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        }
    }

    fn byte_char(&self, byte: u8) -> char {
        match self.kind {
            Kind::Ascii if !byte.is_ascii() => char::REPLACEMENT_CHARACTER,
            _ => char::from(byte),
        }
    }

    fn new_sink(&self) -> Sink {
        match self.kind {
            Kind::Latin1 => Sink::Bytes { max: 0xFF },
            Kind::Ascii => Sink::Bytes { max: 0x7F },
            Kind::Utf16 => Sink::Utf16 {
                big_endian: true,
                bom_pending: true,
            },
            Kind::Registry(encoding) if encoding == encoding_rs::UTF_16LE => Sink::Utf16 {
                big_endian: false,
                bom_pending: false,
            },
            Kind::Registry(encoding) if encoding == encoding_rs::UTF_16BE => Sink::Utf16 {
                big_endian: true,
                bom_pending: false,
            },
            Kind::Registry(encoding) => Sink::Encoder(encoding.new_encoder()),
        }
    }

    fn new_source(&self) -> Source {
        match self.kind {
            Kind::Latin1 | Kind::Ascii => Source::Bytes,
            // Sniffs a byte order mark and falls back to big-endian.
            Kind::Utf16 => Source::Decoder(encoding_rs::UTF_16BE.new_decoder()),
            Kind::Registry(encoding) => {
                Source::Decoder(encoding.new_decoder_without_bom_handling())
            }
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl FromStr for Charset {
    type Err = ScriptError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Self::for_label(label)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// encoding_rs only decodes UTF-16; its encoders emit UTF-8 for those labels.
enum Sink {
    Encoder(Encoder),
    Utf16 { big_endian: bool, bom_pending: bool },
    Bytes { max: u32 },
}

enum Source {
    Decoder(Decoder),
    Bytes,
}

/// Character writer encoding into a borrowed byte stream.
///
/// Output is buffered; [`TextWriter::close`] finalizes the encoder and flushes
/// the underlying stream without closing it. Dropping an open writer closes it
/// on a best-effort basis.
pub struct TextWriter<'a> {
    inner: &'a mut dyn Write,
    charset: Charset,
    sink: Sink,
    buffer: Vec<u8>,
    closed: bool,
    pending_error: Option<io::Error>,
}

impl<'a> TextWriter<'a> {
    pub fn new(inner: &'a mut dyn Write, charset: Charset) -> Self {
        Self {
            inner,
            charset,
            sink: charset.new_sink(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            closed: false,
            pending_error: None,
        }
    }

    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Encodes and buffers `text`.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.ensure_open()?;
        match &mut self.sink {
            Sink::Encoder(encoder) => {
                let mut remaining = text;
                loop {
                    let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(
                        remaining,
                        &mut self.buffer,
                        false,
                    );
                    remaining = &remaining[read..];
                    match result {
                        EncoderResult::InputEmpty => break,
                        EncoderResult::OutputFull => {
                            self.inner.write_all(&self.buffer)?;
                            self.buffer.clear();
                        }
                        EncoderResult::Unmappable(_) => self.buffer.push(UNMAPPABLE),
                    }
                }
            }
            Sink::Utf16 {
                big_endian,
                bom_pending,
            } => {
                let big_endian = *big_endian;
                let units = std::mem::take(bom_pending)
                    .then_some(0xFEFF)
                    .into_iter()
                    .chain(text.encode_utf16());
                for unit in units {
                    let bytes = if big_endian {
                        unit.to_be_bytes()
                    } else {
                        unit.to_le_bytes()
                    };
                    self.buffer.extend_from_slice(&bytes);
                }
            }
            Sink::Bytes { max } => {
                let max = *max;
                self.buffer.extend(text.chars().map(|ch| {
                    u8::try_from(u32::from(ch))
                        .ok()
                        .filter(|byte| u32::from(*byte) <= max)
                        .unwrap_or(UNMAPPABLE)
                }));
            }
        }
        if self.buffer.len() >= BUFFER_CAPACITY {
            self.drain()?;
        }
        Ok(())
    }

    /// Formats into the writer; lets `write!` return `io::Result`.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match fmt::write(self, args) {
            Ok(()) => Ok(()),
            Err(_) => Err(self
                .pending_error
                .take()
                .unwrap_or_else(|| io::Error::other("formatter error"))),
        }
    }

    /// Pushes buffered bytes to the underlying stream and flushes it.
    pub fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.drain()?;
        self.inner.flush()
    }

    /// Finalizes the encoder and flushes; a second close is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }
        if let Sink::Encoder(encoder) = &mut self.sink {
            loop {
                let (result, _) =
                    encoder.encode_from_utf8_to_vec_without_replacement("", &mut self.buffer, true);
                match result {
                    EncoderResult::OutputFull => {
                        self.inner.write_all(&self.buffer)?;
                        self.buffer.clear();
                    }
                    EncoderResult::InputEmpty | EncoderResult::Unmappable(_) => break,
                }
            }
        }
        self.drain()?;
        self.inner.flush()
    }

    fn drain(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::other("text writer is closed"))
        } else {
            Ok(())
        }
    }
}

impl fmt::Write for TextWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        TextWriter::write_str(self, s).map_err(|error| {
            self.pending_error = Some(error);
            fmt::Error
        })
    }
}

impl Drop for TextWriter<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for TextWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextWriter")
            .field("charset", &self.charset)
            .field("buffered", &self.buffer.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Character reader decoding a borrowed byte stream into UTF-8.
///
/// Implements [`Read`] and [`BufRead`] over the decoded text. Malformed input
/// is replaced with U+FFFD. Only the `UTF-16` charset honors a byte order mark.
pub struct TextReader<'a> {
    inner: &'a mut dyn Read,
    charset: Charset,
    source: Source,
    raw: Vec<u8>,
    raw_start: usize,
    raw_end: usize,
    decoded: Vec<u8>,
    pos: usize,
    eof: bool,
    finished: bool,
    closed: bool,
}

impl<'a> TextReader<'a> {
    pub fn new(inner: &'a mut dyn Read, charset: Charset) -> Self {
        Self {
            inner,
            charset,
            source: charset.new_source(),
            raw: vec![0; BUFFER_CAPACITY],
            raw_start: 0,
            raw_end: 0,
            decoded: Vec::with_capacity(BUFFER_CAPACITY),
            pos: 0,
            eof: false,
            finished: false,
            closed: false,
        }
    }

    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads the remaining decoded text.
    pub fn read_text(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Releases the reader; later reads fail. A second close is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
        self.decoded.clear();
        self.pos = 0;
    }

    fn refill(&mut self) -> io::Result<()> {
        self.decoded.clear();
        self.pos = 0;
        while self.decoded.is_empty() && !self.finished {
            if self.raw_start == self.raw_end && !self.eof {
                self.raw_start = 0;
                self.raw_end = loop {
                    match self.inner.read(&mut self.raw) {
                        Ok(read) => break read,
                        Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                        Err(error) => return Err(error),
                    }
                };
                self.eof = self.raw_end == 0;
            }

            let pending = &self.raw[self.raw_start..self.raw_end];
            match &mut self.source {
                Source::Decoder(decoder) => {
                    self.decoded.resize(BUFFER_CAPACITY, 0);
                    let (result, read, written, _) =
                        decoder.decode_to_utf8(pending, &mut self.decoded, self.eof);
                    self.decoded.truncate(written);
                    self.raw_start += read;
                    if self.eof && matches!(result, CoderResult::InputEmpty) {
                        self.finished = true;
                    }
                }
                Source::Bytes => {
                    let mut scratch = [0; 4];
                    for &byte in pending {
                        let ch = self.charset.byte_char(byte);
                        self.decoded
                            .extend_from_slice(ch.encode_utf8(&mut scratch).as_bytes());
                    }
                    self.raw_start = self.raw_end;
                    self.finished = self.eof;
                }
            }
        }
        Ok(())
    }
}

impl Read for TextReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.consume(count);
        Ok(count)
    }
}

impl BufRead for TextReader<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.closed {
            return Err(io::Error::other("text reader is closed"));
        }
        if self.pos >= self.decoded.len() {
            self.refill()?;
        }
        Ok(&self.decoded[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.decoded.len());
    }
}

impl fmt::Debug for TextReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextReader")
            .field("charset", &self.charset)
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .finish()
    }
}
