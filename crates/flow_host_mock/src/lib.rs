//! Deterministic in-memory implementation of the `flow_host` session contract.
//!
//! This crate keeps content and attributes in memory, records which primitive
//! served each call, and can inject output-stream failures. It is intended for
//! adapter tests and local script development.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};

use flow_host::{
    Attributes, FlowFile, FlowFileId, InputCallback, OutputCallback, ProcessSession,
    SessionError, TransformCallback,
};

/// Host primitive served by the mock session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Read,
    Write,
    WriteTransform,
    Append,
    PutAttribute,
    RemoveAttribute,
}

/// One recorded primitive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveCall {
    pub primitive: Primitive,
    pub flow_file: FlowFileId,
    /// Number of `flush` calls the output stream received, zero for reads.
    pub output_flushes: usize,
}

#[derive(Debug, Clone, Default)]
struct Record {
    content: Vec<u8>,
    attributes: Attributes,
}

#[derive(Debug, Default)]
struct State {
    next_id: FlowFileId,
    records: HashMap<FlowFileId, Record>,
    calls: Vec<PrimitiveCall>,
    write_fault: Option<io::ErrorKind>,
}

/// In-memory session; failed stream callbacks leave content unchanged.
#[derive(Debug, Default)]
pub struct MockSession {
    state: Mutex<State>,
}

impl MockSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new flow record and returns its snapshot.
    pub fn create(&self, content: impl Into<Vec<u8>>, attributes: Attributes) -> FlowFile {
        let mut state = lock_unpoisoned(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        let record = Record {
            content: content.into(),
            attributes,
        };
        let flow_file = snapshot(id, &record);
        state.records.insert(id, record);
        flow_file
    }

    /// Registers an empty flow record without attributes.
    pub fn create_empty(&self) -> FlowFile {
        self.create(Vec::new(), Attributes::new())
    }

    /// Returns the stored content of a flow record.
    #[must_use]
    pub fn content(&self, flow_file: &FlowFile) -> Option<Vec<u8>> {
        let state = lock_unpoisoned(&self.state);
        state
            .records
            .get(&flow_file.id())
            .map(|record| record.content.clone())
    }

    /// Returns the stored content decoded as UTF-8, lossily.
    #[must_use]
    pub fn content_string(&self, flow_file: &FlowFile) -> Option<String> {
        self.content(flow_file)
            .map(|content| String::from_utf8_lossy(&content).into_owned())
    }

    /// Returns the latest snapshot of a flow record as the session sees it.
    #[must_use]
    pub fn current(&self, flow_file: &FlowFile) -> Option<FlowFile> {
        let state = lock_unpoisoned(&self.state);
        state
            .records
            .get(&flow_file.id())
            .map(|record| snapshot(flow_file.id(), record))
    }

    /// Returns every primitive invocation in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<PrimitiveCall> {
        lock_unpoisoned(&self.state).calls.clone()
    }

    /// Returns only the primitive kinds in call order.
    #[must_use]
    pub fn primitives(&self) -> Vec<Primitive> {
        lock_unpoisoned(&self.state)
            .calls
            .iter()
            .map(|call| call.primitive)
            .collect()
    }

    /// Makes every subsequent output stream write fail with `kind`; `None` clears it.
    pub fn set_write_fault(&self, kind: Option<io::ErrorKind>) {
        lock_unpoisoned(&self.state).write_fault = kind;
    }

    fn existing_content(&self, flow_file: &FlowFile) -> Result<Vec<u8>, SessionError> {
        let state = lock_unpoisoned(&self.state);
        state
            .records
            .get(&flow_file.id())
            .map(|record| record.content.clone())
            .ok_or(SessionError::UnknownFlowFile { id: flow_file.id() })
    }

    fn output_stream(&self) -> MockOutput {
        MockOutput {
            buffer: Vec::new(),
            flushes: 0,
            fault: lock_unpoisoned(&self.state).write_fault,
        }
    }

    fn record_call(&self, primitive: Primitive, flow_file: FlowFileId, output_flushes: usize) {
        tracing::debug!(?primitive, flow_file, output_flushes, "mock session primitive");
        lock_unpoisoned(&self.state).calls.push(PrimitiveCall {
            primitive,
            flow_file,
            output_flushes,
        });
    }

    fn commit_content(
        &self,
        flow_file: &FlowFile,
        update: impl FnOnce(&mut Vec<u8>),
    ) -> Result<FlowFile, SessionError> {
        let mut state = lock_unpoisoned(&self.state);
        let record = state
            .records
            .get_mut(&flow_file.id())
            .ok_or(SessionError::UnknownFlowFile { id: flow_file.id() })?;
        update(&mut record.content);
        Ok(snapshot(flow_file.id(), record))
    }

    fn update_attributes(
        &self,
        flow_file: &FlowFile,
        primitive: Primitive,
        update: impl FnOnce(&mut Attributes),
    ) -> Result<FlowFile, SessionError> {
        let updated = {
            let mut state = lock_unpoisoned(&self.state);
            let record = state
                .records
                .get_mut(&flow_file.id())
                .ok_or(SessionError::UnknownFlowFile { id: flow_file.id() })?;
            update(&mut record.attributes);
            snapshot(flow_file.id(), record)
        };
        self.record_call(primitive, flow_file.id(), 0);
        Ok(updated)
    }
}

impl ProcessSession for MockSession {
    fn read(
        &self,
        flow_file: &FlowFile,
        callback: &mut InputCallback<'_>,
    ) -> Result<(), SessionError> {
        let content = self.existing_content(flow_file)?;
        self.record_call(Primitive::Read, flow_file.id(), 0);
        let mut input: &[u8] = &content;
        callback(&mut input).map_err(SessionError::CallbackFailed)
    }

    fn write(
        &self,
        flow_file: &FlowFile,
        callback: &mut OutputCallback<'_>,
    ) -> Result<FlowFile, SessionError> {
        self.existing_content(flow_file)?;
        let mut output = self.output_stream();
        let outcome = callback(&mut output);
        self.record_call(Primitive::Write, flow_file.id(), output.flushes);
        outcome.map_err(SessionError::CallbackFailed)?;
        output.close()?;
        self.commit_content(flow_file, |content| *content = output.buffer)
    }

    fn write_transform(
        &self,
        flow_file: &FlowFile,
        callback: &mut TransformCallback<'_>,
    ) -> Result<FlowFile, SessionError> {
        let existing = self.existing_content(flow_file)?;
        let mut input: &[u8] = &existing;
        let mut output = self.output_stream();
        let outcome = callback(&mut input, &mut output);
        self.record_call(Primitive::WriteTransform, flow_file.id(), output.flushes);
        outcome.map_err(SessionError::CallbackFailed)?;
        output.close()?;
        self.commit_content(flow_file, |content| *content = output.buffer)
    }

    fn append(
        &self,
        flow_file: &FlowFile,
        callback: &mut OutputCallback<'_>,
    ) -> Result<FlowFile, SessionError> {
        self.existing_content(flow_file)?;
        let mut output = self.output_stream();
        let outcome = callback(&mut output);
        self.record_call(Primitive::Append, flow_file.id(), output.flushes);
        outcome.map_err(SessionError::CallbackFailed)?;
        output.close()?;
        self.commit_content(flow_file, |content| content.extend_from_slice(&output.buffer))
    }

    fn put_attribute(
        &self,
        flow_file: &FlowFile,
        key: &str,
        value: &str,
    ) -> Result<FlowFile, SessionError> {
        self.update_attributes(flow_file, Primitive::PutAttribute, |attributes| {
            attributes.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_attribute(
        &self,
        flow_file: &FlowFile,
        key: &str,
    ) -> Result<FlowFile, SessionError> {
        self.update_attributes(flow_file, Primitive::RemoveAttribute, |attributes| {
            attributes.remove(key);
        })
    }
}

/// Output stream handed to callbacks; the session closes it after the callback.
#[derive(Debug)]
struct MockOutput {
    buffer: Vec<u8>,
    flushes: usize,
    fault: Option<io::ErrorKind>,
}

impl MockOutput {
    fn close(&mut self) -> Result<(), SessionError> {
        self.flush()
            .map_err(|source| SessionError::io("closing", source))
    }
}

impl Write for MockOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.fault {
            return Err(io::Error::new(kind, "injected write fault"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

fn snapshot(id: FlowFileId, record: &Record) -> FlowFile {
    FlowFile::new(id, record.content.len() as u64, record.attributes.clone())
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Reads all remaining bytes of a callback input; convenience for tests.
pub fn drain(input: &mut dyn Read) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Ok(bytes)
}
