//! # Metadata Records
//!
//! A `serde`-backed implementation of [`MethodIdentity`] and
//! [`ExceptionLike`], for traces captured elsewhere and stored as JSON.
//!
//! ## Format
//!
//! ```json
//! {
//!   "methods": [
//!     { "id": 1, "name": "DoWork", "declaring_type": { "name": "MyClass" },
//!       "parameters": [ { "name": "count", "type": { "namespace": "System", "name": "Int32" } } ] }
//!   ],
//!   "exception": {
//!     "type": "InvalidOperationException",
//!     "message": "boom",
//!     "frames": [ { "method": 1, "file": "/src/my.cs", "line": 42 } ],
//!     "inner": null
//!   },
//!   "call_site": []
//! }
//! ```
//!
//! Methods reference each other by id through their `synthesis` record
//! (`origin` of a state machine, `host` of a closure). [`MethodTable`] turns
//! those ids into shared handles.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DemystError, DemystResult};
use crate::trace::ExceptionLike;
use crate::types::{MethodId, MethodIdentity, ParameterInfo, RawFrame, StateMachineKind, Synthesis, TypeRef};

/// Serialized form of [`Synthesis`], with links expressed as method ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisRecord
{
    /// No classification; names decide.
    #[default]
    Unknown,
    /// Ordinary method.
    Plain,
    /// `MoveNext` of an async state machine.
    AsyncStateMachine
    {
        /// Id of the originating async method.
        #[serde(default)]
        origin: Option<MethodId>,
    },
    /// `MoveNext` of an iterator state machine.
    IteratorStateMachine
    {
        /// Id of the originating iterator method.
        #[serde(default)]
        origin: Option<MethodId>,
    },
    /// Lambda or local function body.
    Closure
    {
        /// Id of the declaring method.
        #[serde(default)]
        host: Option<MethodId>,
    },
}

impl SynthesisRecord
{
    /// Ordinary method.
    pub const fn plain() -> Self
    {
        SynthesisRecord::Plain
    }

    /// Async state machine resume method.
    pub fn async_state_machine(origin: Option<u64>) -> Self
    {
        SynthesisRecord::AsyncStateMachine {
            origin: origin.map(MethodId::new),
        }
    }

    /// Iterator state machine resume method.
    pub fn iterator_state_machine(origin: Option<u64>) -> Self
    {
        SynthesisRecord::IteratorStateMachine {
            origin: origin.map(MethodId::new),
        }
    }

    /// Closure body.
    pub fn closure(host: Option<u64>) -> Self
    {
        SynthesisRecord::Closure {
            host: host.map(MethodId::new),
        }
    }

    /// Id of the linked method, if any.
    pub fn link(&self) -> Option<MethodId>
    {
        match *self {
            SynthesisRecord::AsyncStateMachine { origin } | SynthesisRecord::IteratorStateMachine { origin } => origin,
            SynthesisRecord::Closure { host } => host,
            SynthesisRecord::Unknown | SynthesisRecord::Plain => None,
        }
    }
}

/// One method's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRecord
{
    /// Identity.
    pub id: MethodId,
    /// Metadata name.
    pub name: String,
    /// Runtime declaring type.
    #[serde(default)]
    pub declaring_type: Option<TypeRef>,
    /// Return value.
    #[serde(default)]
    pub returns: Option<ParameterInfo>,
    /// Parameters in declaration order.
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    /// Method generic arguments.
    #[serde(default)]
    pub generic_arguments: Vec<TypeRef>,
    /// Compiler-synthesis classification.
    #[serde(default)]
    pub synthesis: SynthesisRecord,
    /// Parameter metadata was stripped; queries fail.
    #[serde(default)]
    pub stripped: bool,
    #[serde(skip)]
    linked: Option<Arc<dyn MethodIdentity>>,
}

impl MethodRecord
{
    /// A method with no parameters or return value.
    pub fn new(id: u64, name: impl Into<String>) -> Self
    {
        Self {
            id: MethodId::new(id),
            name: name.into(),
            declaring_type: None,
            returns: None,
            parameters: Vec::new(),
            generic_arguments: Vec::new(),
            synthesis: SynthesisRecord::Unknown,
            stripped: false,
            linked: None,
        }
    }

    /// Set the declaring type.
    #[must_use]
    pub fn declared_by(mut self, ty: TypeRef) -> Self
    {
        self.declaring_type = Some(ty);
        self
    }

    /// Set the return type.
    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self
    {
        self.returns = Some(ParameterInfo::unnamed(ty));
        self
    }

    /// Set the return value, with tuple names or modifiers.
    #[must_use]
    pub fn returns_parameter(mut self, parameter: ParameterInfo) -> Self
    {
        self.returns = Some(parameter);
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterInfo) -> Self
    {
        self.parameters.push(parameter);
        self
    }

    /// Set the method generic arguments.
    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<TypeRef>) -> Self
    {
        self.generic_arguments = arguments;
        self
    }

    /// Set the synthesis classification.
    #[must_use]
    pub fn with_synthesis(mut self, synthesis: SynthesisRecord) -> Self
    {
        self.synthesis = synthesis;
        self
    }

    /// Mark the parameter metadata as stripped.
    #[must_use]
    pub fn stripped(mut self) -> Self
    {
        self.stripped = true;
        self
    }

    /// Attach the method the synthesis record points at.
    #[must_use]
    pub fn linked_to(mut self, method: Arc<dyn MethodIdentity>) -> Self
    {
        self.linked = Some(method);
        self
    }
}

impl MethodIdentity for MethodRecord
{
    fn id(&self) -> MethodId
    {
        self.id
    }

    fn name(&self) -> &str
    {
        &self.name
    }

    fn declaring_type(&self) -> Option<&TypeRef>
    {
        self.declaring_type.as_ref()
    }

    fn return_parameter(&self) -> Option<ParameterInfo>
    {
        self.returns.clone()
    }

    fn parameters(&self) -> DemystResult<Vec<ParameterInfo>>
    {
        if self.stripped {
            return Err(DemystError::resolution(self.id, "parameter metadata stripped"));
        }
        Ok(self.parameters.clone())
    }

    fn generic_arguments(&self) -> &[TypeRef]
    {
        &self.generic_arguments
    }

    fn synthesis(&self) -> Synthesis
    {
        match self.synthesis {
            SynthesisRecord::Unknown => Synthesis::Unknown,
            SynthesisRecord::Plain => Synthesis::Plain,
            SynthesisRecord::AsyncStateMachine { .. } => Synthesis::StateMachine {
                kind: StateMachineKind::Async,
                origin: self.linked.clone(),
            },
            SynthesisRecord::IteratorStateMachine { .. } => Synthesis::StateMachine {
                kind: StateMachineKind::Iterator,
                origin: self.linked.clone(),
            },
            SynthesisRecord::Closure { .. } => Synthesis::Closure {
                host: self.linked.clone(),
            },
        }
    }
}

/// Methods by id, with synthesis links resolved.
#[derive(Debug, Default)]
pub struct MethodTable
{
    methods: HashMap<MethodId, Arc<dyn MethodIdentity>>,
}

impl MethodTable
{
    /// Link `records` into shared handles.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::InvalidArgument`] for duplicate ids, links to
    /// unknown ids, and link cycles.
    pub fn build(records: Vec<MethodRecord>) -> DemystResult<Self>
    {
        let mut pending = HashMap::with_capacity(records.len());
        let mut order = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id;
            if pending.insert(id, record).is_some() {
                return Err(DemystError::InvalidArgument(format!("Duplicate method id {id}")));
            }
            order.push(id);
        }

        let mut table = Self {
            methods: HashMap::with_capacity(order.len()),
        };
        let mut visiting = Vec::new();
        for id in order {
            table.link(id, &mut pending, &mut visiting)?;
        }
        Ok(table)
    }

    fn link(
        &mut self,
        id: MethodId,
        pending: &mut HashMap<MethodId, MethodRecord>,
        visiting: &mut Vec<MethodId>,
    ) -> DemystResult<Arc<dyn MethodIdentity>>
    {
        if let Some(done) = self.methods.get(&id) {
            return Ok(Arc::clone(done));
        }
        if visiting.contains(&id) {
            return Err(DemystError::InvalidArgument(format!("Method link cycle through {id}")));
        }
        let Some(mut record) = pending.remove(&id) else {
            return Err(DemystError::InvalidArgument(format!("Unknown method id {id}")));
        };

        if let Some(target) = record.synthesis.link() {
            visiting.push(id);
            let linked = self.link(target, pending, visiting);
            visiting.pop();
            record.linked = Some(linked?);
        }

        let method: Arc<dyn MethodIdentity> = Arc::new(record);
        self.methods.insert(id, Arc::clone(&method));
        Ok(method)
    }

    /// Handle for `id`.
    pub fn get(&self, id: MethodId) -> Option<&Arc<dyn MethodIdentity>>
    {
        self.methods.get(&id)
    }

    /// Number of methods.
    pub fn len(&self) -> usize
    {
        self.methods.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool
    {
        self.methods.is_empty()
    }
}

/// One serialized frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord
{
    /// Method id; absent for native or unknown frames.
    #[serde(default)]
    pub method: Option<MethodId>,
    /// Source file.
    #[serde(default)]
    pub file: Option<String>,
    /// Source line.
    #[serde(default)]
    pub line: Option<u32>,
    /// Runtime text of the frame.
    #[serde(default)]
    pub text: Option<String>,
    /// Native linkage symbol, demangled for display.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Native instruction address.
    #[serde(default)]
    pub address: Option<u64>,
}

impl FrameRecord
{
    /// Build the raw frame, looking the method up in `methods`.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::InvalidArgument`] when the method id is unknown.
    pub fn into_raw_frame(self, methods: &MethodTable) -> DemystResult<RawFrame>
    {
        let mut frame = match (self.method, self.symbol) {
            (Some(id), _) => {
                let method = methods
                    .get(id)
                    .ok_or_else(|| DemystError::InvalidArgument(format!("Frame refers to unknown method {id}")))?;
                RawFrame::new(Arc::clone(method))
            }
            (None, Some(symbol)) => RawFrame::native(&symbol, self.address),
            (None, None) => RawFrame::unresolved(self.text.clone().unwrap_or_else(|| "at <unknown>".to_string())),
        };

        if let Some(text) = self.text {
            frame = frame.with_raw_text(text);
        }
        if let Some(file) = self.file {
            frame = frame.with_location(file, self.line);
        }
        Ok(frame)
    }
}

/// One serialized exception and its cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord
{
    /// Exception type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Message.
    #[serde(default)]
    pub message: String,
    /// Captured frames, innermost call first.
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
    /// Inner exception.
    #[serde(default)]
    pub inner: Option<Box<ExceptionRecord>>,
}

/// A complete serialized trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFile
{
    /// Method metadata referenced by frames.
    #[serde(default)]
    pub methods: Vec<MethodRecord>,
    /// Outermost exception.
    #[serde(default)]
    pub exception: Option<ExceptionRecord>,
    /// Frames of the code that observed the exception.
    #[serde(default)]
    pub call_site: Vec<FrameRecord>,
}

impl TraceFile
{
    /// Parse a trace file.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::Json`] for malformed input.
    pub fn from_json(text: &str) -> DemystResult<Self>
    {
        Ok(serde_json::from_str(text)?)
    }

    /// Link methods and build runtime frames.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::InvalidArgument`] for broken method references.
    pub fn load(self) -> DemystResult<LoadedTrace>
    {
        let methods = MethodTable::build(self.methods)?;
        let exception = self
            .exception
            .map(|record| RecordedException::load(record, &methods))
            .transpose()?;
        let call_site = self
            .call_site
            .into_iter()
            .map(|frame| frame.into_raw_frame(&methods))
            .collect::<DemystResult<Vec<_>>>()?;

        Ok(LoadedTrace {
            methods,
            exception,
            call_site,
        })
    }
}

/// A trace file with methods linked and frames built.
#[derive(Debug)]
pub struct LoadedTrace
{
    /// Linked methods.
    pub methods: MethodTable,
    /// Outermost exception.
    pub exception: Option<RecordedException>,
    /// Call-site frames.
    pub call_site: Vec<RawFrame>,
}

/// An exception loaded from an [`ExceptionRecord`].
#[derive(Debug, Clone)]
pub struct RecordedException
{
    type_name: String,
    message: String,
    frames: Vec<RawFrame>,
    inner: Option<Box<RecordedException>>,
}

impl RecordedException
{
    /// Build frames for `record` and its inner exceptions.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::InvalidArgument`] for unknown method ids.
    pub fn load(record: ExceptionRecord, methods: &MethodTable) -> DemystResult<Self>
    {
        let frames = record
            .frames
            .into_iter()
            .map(|frame| frame.into_raw_frame(methods))
            .collect::<DemystResult<Vec<_>>>()?;
        let inner = record
            .inner
            .map(|inner| Self::load(*inner, methods).map(Box::new))
            .transpose()?;

        Ok(Self {
            type_name: record.type_name,
            message: record.message,
            frames,
            inner,
        })
    }
}

impl ExceptionLike for RecordedException
{
    fn type_name(&self) -> &str
    {
        &self.type_name
    }

    fn message(&self) -> &str
    {
        &self.message
    }

    fn cause(&self) -> Option<&dyn ExceptionLike>
    {
        self.inner.as_deref().map(|inner| inner as &dyn ExceptionLike)
    }

    fn frames(&self) -> Vec<RawFrame>
    {
        self.frames.clone()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    const SAMPLE: &str = r#"{
        "methods": [
            { "id": 1, "name": "Start", "declaring_type": { "name": "MyClass" } },
            { "id": 2, "name": "<Start>b__0_2", "declaring_type": { "name": "<>c", "enclosing": { "name": "MyClass" } },
              "synthesis": { "kind": "closure", "host": 1 } },
            { "id": 3, "name": "MoveNext", "declaring_type": { "name": "<<Start>b__0_2>d" },
              "synthesis": { "kind": "async_state_machine", "origin": 2 } }
        ],
        "exception": {
            "type": "InvalidOperationException",
            "message": "boom",
            "frames": [ { "method": 3, "file": "/src/my.cs", "line": 7 }, { "symbol": "memcpy" } ],
            "inner": { "type": "IOException", "frames": [ { "text": "at native_frame_0x1234" } ] }
        }
    }"#;

    #[test]
    fn test_parse_and_link()
    {
        let loaded = TraceFile::from_json(SAMPLE).unwrap().load().unwrap();
        assert_eq!(loaded.methods.len(), 3);

        let machine = loaded.methods.get(MethodId::new(3)).unwrap();
        match machine.synthesis() {
            Synthesis::StateMachine { kind, origin } => {
                assert_eq!(kind, StateMachineKind::Async);
                assert_eq!(origin.unwrap().id(), MethodId::new(2));
            }
            other => panic!("unexpected synthesis {other:?}"),
        }

        let exception = loaded.exception.unwrap();
        assert_eq!(exception.type_name(), "InvalidOperationException");
        let frames = exception.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].line_number, Some(7));
        assert_eq!(frames[1].raw_text, "at memcpy");

        let inner = exception.cause().unwrap();
        assert_eq!(inner.type_name(), "IOException");
        assert_eq!(inner.message(), "");
        assert!(inner.frames()[0].unresolved);
    }

    #[test]
    fn test_broken_links_are_rejected()
    {
        let unknown = MethodTable::build(vec![
            MethodRecord::new(1, "<Run>b__0").with_synthesis(SynthesisRecord::closure(Some(9))),
        ]);
        assert!(matches!(unknown, Err(DemystError::InvalidArgument(_))));

        let cycle = MethodTable::build(vec![
            MethodRecord::new(1, "a").with_synthesis(SynthesisRecord::closure(Some(2))),
            MethodRecord::new(2, "b").with_synthesis(SynthesisRecord::closure(Some(1))),
        ]);
        assert!(cycle.unwrap_err().to_string().contains("cycle"));

        let duplicate = MethodTable::build(vec![MethodRecord::new(1, "a"), MethodRecord::new(1, "b")]);
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_stripped_record_fails_parameters()
    {
        let record = MethodRecord::new(4, "Hidden").stripped();
        assert!(matches!(record.parameters(), Err(DemystError::Resolution { .. })));
    }
}
