//! Name-based method dispatch for script callers.
//!
//! Built-in methods are resolved first, then the handle's method table. New
//! handles start from a snapshot of the type-level table, which embedders can
//! extend with [`register_type_method`].

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value;

use super::{SessionFile, Writable};
use crate::charset::{Charset, TextReader, TextWriter};
use crate::error::ScriptError;

/// Extension method callable through [`SessionFile::invoke_method`].
pub type Method = Arc<
    dyn for<'s, 'c> Fn(&mut SessionFile<'s>, Vec<ScriptArg<'c>>) -> Result<Value, ScriptError>
        + Send
        + Sync,
>;

static TYPE_METHODS: Lazy<RwLock<MethodTable>> = Lazy::new(|| RwLock::new(MethodTable::new()));

/// Adds `method` to the type-level table; handles created afterwards see it.
pub fn register_type_method<F>(name: impl Into<String>, method: F)
where
    F: for<'s, 'c> Fn(&mut SessionFile<'s>, Vec<ScriptArg<'c>>) -> Result<Value, ScriptError>
        + Send
        + Sync
        + 'static,
{
    let mut table = match TYPE_METHODS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    table.insert(name, method);
}

/// Removes a type-level method; returns whether it existed.
pub fn unregister_type_method(name: &str) -> bool {
    let mut table = match TYPE_METHODS.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    table.remove(name)
}

/// Table of script-installed methods, keyed by name.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: BTreeMap<String, Method>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the type-level table.
    #[must_use]
    pub fn type_default() -> Self {
        match TYPE_METHODS.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, method: F)
    where
        F: for<'s, 'c> Fn(&mut SessionFile<'s>, Vec<ScriptArg<'c>>) -> Result<Value, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
    }

    #[must_use]
    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: for<'s, 'c> Fn(&mut SessionFile<'s>, Vec<ScriptArg<'c>>) -> Result<Value, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, method);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.methods.remove(name).is_some()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    fn get(&self, name: &str) -> Option<Method> {
        self.methods.get(name).cloned()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}

/// Stream shape handed to a [`ScriptCallback`].
pub enum StreamArg<'a, 'b> {
    Input(&'a mut dyn Read),
    Output(&'a mut dyn Write),
    Transform(&'a mut dyn Read, &'a mut dyn Write),
    Reader(&'a mut TextReader<'b>),
    Writer(&'a mut TextWriter<'b>),
}

impl StreamArg<'_, '_> {
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Output(_) => "output",
            Self::Transform(..) => "input, output",
            Self::Reader(_) => "reader",
            Self::Writer(_) => "writer",
        }
    }
}

type CallbackBody<'c> =
    Box<dyn for<'a, 'b> FnOnce(StreamArg<'a, 'b>) -> Result<(), ScriptError> + 'c>;

/// Script-supplied stream callback with its declared parameter count.
pub struct ScriptCallback<'c> {
    max_params: usize,
    body: CallbackBody<'c>,
}

impl<'c> ScriptCallback<'c> {
    pub fn new<F>(max_params: usize, body: F) -> Self
    where
        F: for<'a, 'b> FnOnce(StreamArg<'a, 'b>) -> Result<(), ScriptError> + 'c,
    {
        Self {
            max_params,
            body: Box::new(body),
        }
    }

    /// Declared maximum number of parameters.
    #[must_use]
    pub fn max_params(&self) -> usize {
        self.max_params
    }

    fn call(self, streams: StreamArg<'_, '_>) -> Result<(), ScriptError> {
        (self.body)(streams)
    }
}

impl fmt::Debug for ScriptCallback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCallback")
            .field("max_params", &self.max_params)
            .finish_non_exhaustive()
    }
}

/// Argument kinds used to describe call signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    Callback,
    Writable,
}

impl ArgKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Callback => "callback",
            Self::Writable => "writable",
        }
    }
}

/// One argument of a dynamic method call.
pub enum ScriptArg<'c> {
    Value(Value),
    Callback(ScriptCallback<'c>),
    Writable(Box<dyn Writable + 'c>),
}

impl ScriptArg<'_> {
    #[must_use]
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Value(Value::Null) => ArgKind::Null,
            Self::Value(Value::Bool(_)) => ArgKind::Bool,
            Self::Value(Value::Number(_)) => ArgKind::Number,
            Self::Value(Value::String(_)) => ArgKind::String,
            Self::Value(Value::Array(_)) => ArgKind::Array,
            Self::Value(Value::Object(_)) => ArgKind::Object,
            Self::Callback(_) => ArgKind::Callback,
            Self::Writable(_) => ArgKind::Writable,
        }
    }
}

impl fmt::Debug for ScriptArg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Callback(callback) => f.debug_tuple("Callback").field(callback).finish(),
            Self::Writable(_) => f.write_str("Writable(..)"),
        }
    }
}

impl From<Value> for ScriptArg<'_> {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for ScriptArg<'_> {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for ScriptArg<'_> {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl<'c> From<ScriptCallback<'c>> for ScriptArg<'c> {
    fn from(callback: ScriptCallback<'c>) -> Self {
        Self::Callback(callback)
    }
}

/// Comma-separated argument kinds, as shown in `NoSuchMethod` errors.
#[must_use]
pub fn signature(args: &[ScriptArg<'_>]) -> String {
    args.iter()
        .map(|arg| arg.kind().name())
        .collect::<Vec<_>>()
        .join(", ")
}

enum Dispatch<'c> {
    Handled(Result<Value, ScriptError>),
    Unhandled(Vec<ScriptArg<'c>>),
}

fn unit<'c>(result: Result<(), ScriptError>) -> Dispatch<'c> {
    Dispatch::Handled(result.map(|()| Value::Null))
}

fn is_text_payload(arg: &ScriptArg<'_>) -> bool {
    matches!(
        arg,
        ScriptArg::Callback(_) | ScriptArg::Writable(_) | ScriptArg::Value(Value::String(_))
    )
}

impl SessionFile<'_> {
    /// Calls `name` with `args`: built-ins first, then the method table.
    pub fn invoke_method(
        &mut self,
        name: &str,
        args: Vec<ScriptArg<'_>>,
    ) -> Result<Value, ScriptError> {
        let args = match self.invoke_builtin(name, args) {
            Dispatch::Handled(result) => return result,
            Dispatch::Unhandled(args) => args,
        };

        match self.methods.get(name) {
            Some(method) => {
                tracing::debug!(flow_file = self.flow_file.id(), name, "extension method");
                method(self, args)
            }
            None => Err(ScriptError::no_such_method(name, signature(&args))),
        }
    }

    /// Writes through `callback`, picking the stream shape from its declared
    /// parameter count: one parameter gets the output stream, any other count
    /// gets the previous content and the output stream.
    pub fn write_callback(&mut self, callback: ScriptCallback<'_>) -> Result<(), ScriptError> {
        if callback.max_params() == 1 {
            self.write_stream(|out| callback.call(StreamArg::Output(out)))
        } else {
            self.write_transform(|input, out| callback.call(StreamArg::Transform(input, out)))
        }
    }

    fn invoke_builtin<'c>(&mut self, name: &str, args: Vec<ScriptArg<'c>>) -> Dispatch<'c> {
        match name {
            "get_attribute" => match <[ScriptArg<'c>; 1]>::try_from(args) {
                Ok([ScriptArg::Value(Value::String(key))]) => Dispatch::Handled(Ok(self
                    .get_attribute(&key)
                    .map_or(Value::Null, |value| Value::String(value.to_string())))),
                Ok(args) => Dispatch::Unhandled(args.into()),
                Err(args) => Dispatch::Unhandled(args),
            },
            "put_attribute" => match <[ScriptArg<'c>; 2]>::try_from(args) {
                Ok([ScriptArg::Value(Value::String(key)), ScriptArg::Value(value)])
                    if !value.is_null() =>
                {
                    let value = super::script_string(&value).unwrap_or_default();
                    unit(self.put_attribute(&key, &value).map(|_| ()))
                }
                Ok(args) => Dispatch::Unhandled(args.into()),
                Err(args) => Dispatch::Unhandled(args),
            },
            "remove_attribute" => match <[ScriptArg<'c>; 1]>::try_from(args) {
                Ok([ScriptArg::Value(Value::String(key))]) => {
                    unit(self.remove_attribute(&key).map(|_| ()))
                }
                Ok(args) => Dispatch::Unhandled(args.into()),
                Err(args) => Dispatch::Unhandled(args),
            },
            "set_or_remove_attribute" | "set_property" => {
                match <[ScriptArg<'c>; 2]>::try_from(args) {
                    Ok([ScriptArg::Value(Value::String(key)), ScriptArg::Value(value)]) => {
                        unit(self.set_property(&key, &value))
                    }
                    Ok(args) => Dispatch::Unhandled(args.into()),
                    Err(args) => Dispatch::Unhandled(args),
                }
            }
            "get_property" => match <[ScriptArg<'c>; 1]>::try_from(args) {
                Ok([ScriptArg::Value(Value::String(key))]) => {
                    Dispatch::Handled(Ok(self.get_property(&key).into_value()))
                }
                Ok(args) => Dispatch::Unhandled(args.into()),
                Err(args) => Dispatch::Unhandled(args),
            },
            "get_size" if args.is_empty() => Dispatch::Handled(Ok(Value::from(self.size()))),
            "get_attributes" if args.is_empty() => Dispatch::Handled(Ok(self
                .get_property(super::ATTRIBUTES_PROPERTY)
                .into_value())),
            "write" => self.dispatch_output(name, args),
            "append" => self.dispatch_output(name, args),
            "read" => self.dispatch_read(args),
            "read_text" => match args.len() {
                0 => Dispatch::Handled(self.read_text(self.default_charset).map(Value::String)),
                _ => match <[ScriptArg<'c>; 1]>::try_from(args) {
                    Ok([ScriptArg::Value(Value::String(label))]) => Dispatch::Handled(
                        Charset::for_label(&label)
                            .and_then(|charset| self.read_text(charset))
                            .map(Value::String),
                    ),
                    Ok(args) => Dispatch::Unhandled(args.into()),
                    Err(args) => Dispatch::Unhandled(args),
                },
            },
            _ => Dispatch::Unhandled(args),
        }
    }

    fn dispatch_output<'c>(&mut self, name: &str, args: Vec<ScriptArg<'c>>) -> Dispatch<'c> {
        let append = name == "append";
        let args = match <[ScriptArg<'c>; 1]>::try_from(args) {
            Ok([ScriptArg::Callback(callback)]) if append => {
                if callback.max_params() != 1 {
                    return unit(Err(ScriptError::invalid_argument(
                        "append",
                        format!(
                            "callback must take exactly one stream, declares {}",
                            callback.max_params()
                        ),
                    )));
                }
                return unit(self.append_stream(|out| callback.call(StreamArg::Output(out))));
            }
            Ok([ScriptArg::Callback(callback)]) => return unit(self.write_callback(callback)),
            Ok(args) => return Dispatch::Unhandled(args.into()),
            Err(args) => args,
        };

        let (label, payload) = match <[ScriptArg<'c>; 2]>::try_from(args) {
            Ok([ScriptArg::Value(Value::String(label)), payload]) if is_text_payload(&payload) => {
                (label, payload)
            }
            Ok(args) => return Dispatch::Unhandled(args.into()),
            Err(args) => return Dispatch::Unhandled(args),
        };
        let charset = match Charset::for_label(&label) {
            Ok(charset) => charset,
            Err(err) => return unit(Err(err)),
        };

        let result = match (payload, append) {
            (ScriptArg::Callback(callback), false) => {
                self.write_with(charset, |writer| callback.call(StreamArg::Writer(writer)))
            }
            (ScriptArg::Callback(callback), true) => {
                self.append_with(charset, |writer| callback.call(StreamArg::Writer(writer)))
            }
            (ScriptArg::Value(Value::String(text)), false) => self.write_text(charset, &text),
            (ScriptArg::Value(Value::String(text)), true) => self.append_text(charset, &text),
            (ScriptArg::Writable(writable), false) => self.write_writable(charset, &writable),
            (ScriptArg::Writable(writable), true) => self.append_writable(charset, &writable),
            (payload, _) => return Dispatch::Unhandled(vec![ScriptArg::from(label), payload]),
        };
        unit(result)
    }

    fn dispatch_read<'c>(&mut self, args: Vec<ScriptArg<'c>>) -> Dispatch<'c> {
        let args = match <[ScriptArg<'c>; 1]>::try_from(args) {
            Ok([ScriptArg::Callback(callback)]) => {
                return unit(self.read_stream(|input| callback.call(StreamArg::Input(input))));
            }
            Ok(args) => return Dispatch::Unhandled(args.into()),
            Err(args) => args,
        };

        match <[ScriptArg<'c>; 2]>::try_from(args) {
            Ok([ScriptArg::Value(Value::String(label)), ScriptArg::Callback(callback)]) => {
                unit(Charset::for_label(&label).and_then(|charset| {
                    self.read_with(charset, |reader| callback.call(StreamArg::Reader(reader)))
                }))
            }
            Ok(args) => Dispatch::Unhandled(args.into()),
            Err(args) => Dispatch::Unhandled(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{signature, ArgKind, MethodTable, ScriptArg, ScriptCallback};
    use crate::session_file::Rendered;

    #[test]
    fn argument_kinds_follow_value_types() {
        let args: Vec<ScriptArg<'_>> = vec![
            json!(null).into(),
            json!(false).into(),
            json!(3).into(),
            "s".into(),
            json!([]).into(),
            json!({}).into(),
            ScriptCallback::new(1, |_streams| Ok(())).into(),
            ScriptArg::Writable(Box::new(Rendered('x'))),
        ];

        let kinds: Vec<ArgKind> = args.iter().map(ScriptArg::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ArgKind::Null,
                ArgKind::Bool,
                ArgKind::Number,
                ArgKind::String,
                ArgKind::Array,
                ArgKind::Object,
                ArgKind::Callback,
                ArgKind::Writable,
            ]
        );
        assert_eq!(
            signature(&args),
            "null, bool, number, string, array, object, callback, writable"
        );
        assert_eq!(signature(&[]), "");
    }

    #[test]
    fn method_tables_list_names_in_order() {
        let mut table = MethodTable::new()
            .with_method("zeta", |_file, _args| Ok(json!(null)))
            .with_method("alpha", |_file, _args| Ok(json!(null)));

        assert_eq!(table.names().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        assert_eq!(format!("{table:?}"), "{\"alpha\", \"zeta\"}");
        assert!(table.remove("zeta"));
        assert!(!table.remove("zeta"));
        assert!(!table.contains("zeta"));
    }
}
