use std::fmt::Display;
use std::io::{self, Read, Write};

use flow_host::{FlowFile, SessionError};
use serde_json::Value;

use super::SessionFile;
use crate::charset::{Charset, TextReader, TextWriter};
use crate::error::ScriptError;

/// Value that renders itself as text into a [`TextWriter`].
pub trait Writable {
    fn write_to(&self, out: &mut TextWriter<'_>) -> io::Result<()>;
}

impl Writable for Value {
    fn write_to(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        write!(out, "{self}")
    }
}

/// Adapts any [`Display`] value into a [`Writable`].
#[derive(Debug, Clone)]
pub struct Rendered<T>(pub T);

impl<T: Display> Writable for Rendered<T> {
    fn write_to(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        write!(out, "{}", self.0)
    }
}

impl<W: Writable + ?Sized> Writable for &W {
    fn write_to(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        (**self).write_to(out)
    }
}

impl<W: Writable + ?Sized> Writable for Box<W> {
    fn write_to(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
        (**self).write_to(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Write,
    Append,
}

// Returned to the host in place of a script failure, which is kept aside and
// handed back to the caller unchanged.
fn callback_aborted() -> io::Error {
    io::Error::other("script callback failed")
}

fn settle<T, E>(result: Result<T, SessionError>, failure: Option<E>) -> Result<T, E>
where
    E: From<ScriptError>,
{
    if let Some(failure) = failure {
        return Err(failure);
    }
    result.map_err(|err| E::from(ScriptError::from(err)))
}

impl SessionFile<'_> {
    /// Replaces the content with whatever `callback` writes to the raw stream.
    pub fn write_stream<E, F>(&mut self, callback: F) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut dyn Write) -> Result<(), E>,
    {
        self.run_output("write_stream", OutputMode::Write, callback)
    }

    /// Replaces the content, reading the previous content from the input stream.
    pub fn write_transform<E, F>(&mut self, callback: F) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut dyn Read, &mut dyn Write) -> Result<(), E>,
    {
        tracing::debug!(flow_file = self.flow_file.id(), "write_transform");
        let mut callback = Some(callback);
        let mut failure = None;
        let result = self.session.write_transform(
            &self.flow_file,
            &mut |input: &mut dyn Read, out: &mut dyn Write| {
                let Some(callback) = callback.take() else {
                    return Ok(());
                };
                callback(input, out).map_err(|err| {
                    failure = Some(err);
                    callback_aborted()
                })
            },
        );
        self.flow_file = settle(result, failure)?;
        Ok(())
    }

    /// Replaces the content with text written through a `charset` encoder.
    pub fn write_with<E, F>(&mut self, charset: Charset, callback: F) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut TextWriter<'_>) -> Result<(), E>,
    {
        self.run_text_output("write_with", OutputMode::Write, charset, callback)
    }

    /// Replaces the content with `text` encoded in `charset`.
    pub fn write_text(&mut self, charset: Charset, text: &str) -> Result<(), ScriptError> {
        self.run_text_output("write_text", OutputMode::Write, charset, |writer| {
            writer
                .write_str(text)
                .map_err(|source| ScriptError::io("writing text", source))
        })
    }

    /// Replaces the content with `writable` rendered in `charset`.
    pub fn write_writable<W>(&mut self, charset: Charset, writable: &W) -> Result<(), ScriptError>
    where
        W: Writable + ?Sized,
    {
        self.run_text_output("write_writable", OutputMode::Write, charset, |writer| {
            writable
                .write_to(writer)
                .map_err(|source| ScriptError::io("rendering writable", source))
        })
    }

    /// Appends whatever `callback` writes to the raw stream.
    pub fn append_stream<E, F>(&mut self, callback: F) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut dyn Write) -> Result<(), E>,
    {
        self.run_output("append_stream", OutputMode::Append, callback)
    }

    pub fn append_with<E, F>(&mut self, charset: Charset, callback: F) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut TextWriter<'_>) -> Result<(), E>,
    {
        self.run_text_output("append_with", OutputMode::Append, charset, callback)
    }

    pub fn append_text(&mut self, charset: Charset, text: &str) -> Result<(), ScriptError> {
        self.run_text_output("append_text", OutputMode::Append, charset, |writer| {
            writer
                .write_str(text)
                .map_err(|source| ScriptError::io("writing text", source))
        })
    }

    pub fn append_writable<W>(&mut self, charset: Charset, writable: &W) -> Result<(), ScriptError>
    where
        W: Writable + ?Sized,
    {
        self.run_text_output("append_writable", OutputMode::Append, charset, |writer| {
            writable
                .write_to(writer)
                .map_err(|source| ScriptError::io("rendering writable", source))
        })
    }

    /// Hands the raw content stream to `callback` and returns its result.
    pub fn read_stream<T, E, F>(&self, callback: F) -> Result<T, E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut dyn Read) -> Result<T, E>,
    {
        tracing::debug!(flow_file = self.flow_file.id(), "read_stream");
        let mut callback = Some(callback);
        let mut outcome = None;
        let result = self
            .session
            .read(&self.flow_file, &mut |input: &mut dyn Read| {
                let Some(callback) = callback.take() else {
                    return Ok(());
                };
                let value = callback(input);
                let failed = value.is_err();
                outcome = Some(value);
                if failed {
                    Err(callback_aborted())
                } else {
                    Ok(())
                }
            });

        match outcome {
            Some(Err(failure)) => Err(failure),
            Some(Ok(value)) => settle(result, None).map(|()| value),
            None => {
                settle::<(), E>(result, None)?;
                Err(E::from(ScriptError::io(
                    "reading flow file content",
                    io::Error::other("session did not invoke the read callback"),
                )))
            }
        }
    }

    /// Hands a `charset` decoder over the content to `callback`; the decoder is
    /// closed once the callback returns.
    pub fn read_with<T, E, F>(&self, charset: Charset, callback: F) -> Result<T, E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut TextReader<'_>) -> Result<T, E>,
    {
        tracing::debug!(flow_file = self.flow_file.id(), %charset, "read_with");
        self.read_stream(|input| {
            let mut reader = TextReader::new(input, charset);
            let value = callback(&mut reader);
            reader.close();
            value
        })
    }

    /// Decodes the whole content as text.
    pub fn read_text(&self, charset: Charset) -> Result<String, ScriptError> {
        self.read_with(charset, |reader| {
            reader
                .read_text()
                .map_err(|source| ScriptError::io("decoding flow file content", source))
        })
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, ScriptError> {
        self.read_stream(|input| {
            let mut bytes = Vec::new();
            input
                .read_to_end(&mut bytes)
                .map_err(|source| ScriptError::io("reading flow file content", source))?;
            Ok(bytes)
        })
    }

    fn run_output<E, F>(&mut self, op: &'static str, mode: OutputMode, callback: F) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut dyn Write) -> Result<(), E>,
    {
        tracing::debug!(flow_file = self.flow_file.id(), op, ?mode, "session output");
        let mut callback = Some(callback);
        let mut failure = None;
        let mut host_callback = |out: &mut dyn Write| -> io::Result<()> {
            let Some(callback) = callback.take() else {
                return Ok(());
            };
            callback(out).map_err(|err| {
                failure = Some(err);
                callback_aborted()
            })
        };
        let result: Result<FlowFile, SessionError> = match mode {
            OutputMode::Write => self.session.write(&self.flow_file, &mut host_callback),
            OutputMode::Append => self.session.append(&self.flow_file, &mut host_callback),
        };
        self.flow_file = settle(result, failure)?;
        Ok(())
    }

    // The writer is closed on every path; a callback failure wins over a
    // failure to close.
    fn run_text_output<E, F>(
        &mut self,
        op: &'static str,
        mode: OutputMode,
        charset: Charset,
        callback: F,
    ) -> Result<(), E>
    where
        E: From<ScriptError>,
        F: FnOnce(&mut TextWriter<'_>) -> Result<(), E>,
    {
        tracing::debug!(flow_file = self.flow_file.id(), %charset, "{op}");
        self.run_output(op, mode, |out| {
            let mut writer = TextWriter::new(out, charset);
            let rendered = callback(&mut writer);
            let closed = writer.close();
            rendered?;
            closed.map_err(|source| E::from(ScriptError::io("closing text writer", source)))
        })
    }
}
