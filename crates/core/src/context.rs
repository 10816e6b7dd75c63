use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::clock::{Timestamp, TimestampAllocator};
use crate::config::ProvenanceConfig;
use crate::ids::Iri;
use crate::vocabulary::ctx;

/// Who or what produced a context. Immutable once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextType {
    User,
    Provider,
    Cli,
    System,
    LookupProvider,
    SyncService,
    MetaContext,
    Void,
    Empty,
    Unknown,
}

impl ContextType {
    pub const ALL: [ContextType; 10] = [
        Self::User,
        Self::Provider,
        Self::Cli,
        Self::System,
        Self::LookupProvider,
        Self::SyncService,
        Self::MetaContext,
        Self::Void,
        Self::Empty,
        Self::Unknown,
    ];

    /// Persisted form. These strings are matched literally by stored data.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Provider => "Provider",
            Self::Cli => "CLI",
            Self::System => "System",
            Self::LookupProvider => "LookupProvider",
            Self::SyncService => "CommunicationService",
            Self::MetaContext => "MetaContext",
            Self::Void => "VoID",
            Self::Empty => "Empty",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::MetaContext | Self::Void | Self::Empty)
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editorial state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    Draft,
    Rejected,
    Approved,
    Published,
}

impl ContextState {
    pub const ALL: [ContextState; 4] = [
        Self::Draft,
        Self::Rejected,
        Self::Approved,
        Self::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Rejected => "Rejected",
            Self::Approved => "Approved",
            Self::Published => "Published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// Rejected and published contexts take no further workflow transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Published)
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a context exists. Released values are never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextLabel {
    InstanceDataImport,
    OntologyImportAnnotated,
    AtmosImport,
    AutomaticSynchronization,
    Changelog,
    DataInputForm,
    FileUpload,
    LuxidImport,
    NewInstanceWizard,
    OntologyImport,
    RdfImport,
    ProviderRun,
    SparqlUpdate,
    Workflow,
    Wiki,
    Solution,
    Unknown,
}

impl ContextLabel {
    pub const ALL: [ContextLabel; 17] = [
        Self::InstanceDataImport,
        Self::OntologyImportAnnotated,
        Self::AtmosImport,
        Self::AutomaticSynchronization,
        Self::Changelog,
        Self::DataInputForm,
        Self::FileUpload,
        Self::LuxidImport,
        Self::NewInstanceWizard,
        Self::OntologyImport,
        Self::RdfImport,
        Self::ProviderRun,
        Self::SparqlUpdate,
        Self::Workflow,
        Self::Wiki,
        Self::Solution,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstanceDataImport => "Annotation framework instance data import",
            Self::OntologyImportAnnotated => "Annotation framework ontology import",
            Self::AtmosImport => "Atmos Import",
            Self::AutomaticSynchronization => "Automatic Synchronization",
            Self::Changelog => "changelog",
            Self::DataInputForm => "Data input form",
            Self::FileUpload => "File upload",
            Self::LuxidImport => "Luxid Import",
            Self::NewInstanceWizard => "New instance wizard",
            Self::OntologyImport => "Ontology import",
            Self::RdfImport => "RDF Import",
            Self::ProviderRun => "Provider run",
            Self::SparqlUpdate => "SPARQL update command",
            Self::Workflow => "Workflow",
            Self::Wiki => "Wiki",
            Self::Solution => "Solution",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for ContextLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of provenance: every stored statement belongs to exactly one.
///
/// Equality and hashing use the id only.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: Iri,
    pub context_type: ContextType,
    pub state: ContextState,
    pub timestamp: Option<Timestamp>,
    pub source: Option<Iri>,
    pub group: Option<Iri>,
    pub input_parameter: Option<Iri>,
    pub label: Option<ContextLabel>,
    /// `None` means "use the configured default".
    pub editable: Option<bool>,
}

impl Context {
    fn system(context_type: ContextType, id: &str) -> Self {
        Self {
            id: Iri::new(id),
            context_type,
            state: ContextState::Published,
            timestamp: None,
            source: None,
            group: None,
            input_parameter: None,
            label: None,
            editable: Some(false),
        }
    }

    pub fn empty() -> Self {
        Self::system(ContextType::Empty, ctx::EMPTY_CONTEXT)
    }

    /// The reserved context holding every context's metadata.
    pub fn meta() -> Self {
        Self::system(ContextType::MetaContext, ctx::META_CONTEXT)
    }

    pub fn void() -> Self {
        Self::system(ContextType::Void, ctx::VOID_CONTEXT)
    }

    /// The fixed context for a singleton type.
    pub fn singleton(context_type: ContextType) -> Option<Self> {
        match context_type {
            ContextType::Empty => Some(Self::empty()),
            ContextType::MetaContext => Some(Self::meta()),
            ContextType::Void => Some(Self::void()),
            _ => None,
        }
    }

    /// Resolves a reserved id to its singleton.
    pub fn singleton_for_id(id: &Iri) -> Option<Self> {
        match id.as_str() {
            ctx::EMPTY_CONTEXT => Some(Self::empty()),
            ctx::META_CONTEXT => Some(Self::meta()),
            ctx::VOID_CONTEXT => Some(Self::void()),
            _ => None,
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.context_type.is_singleton()
    }

    pub fn is_user_context(&self) -> bool {
        self.context_type == ContextType::User
    }

    pub fn is_editable(&self, default: bool) -> bool {
        self.editable.unwrap_or(default)
    }

    /// Orders by timestamp; contexts without one compare equal.
    pub fn cmp_by_timestamp(&self, other: &Self) -> Ordering {
        match (self.timestamp, other.timestamp) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        }
    }

    /// Human-readable one-line summary.
    pub fn describe(&self) -> String {
        match self.context_type {
            ContextType::MetaContext => return "MetaContext (stores data about contexts)".into(),
            ContextType::Void => return "VoID Context (stores statistics about contexts)".into(),
            _ => {}
        }
        let Some(timestamp) = self.timestamp else {
            return self.id.to_string();
        };

        let mut out = format!("Created by {}", self.context_type);
        if self.is_user_context() {
            if let Some(source) = &self.source {
                out.push_str(&format!(" '{}'", source.local_name()));
            }
        } else {
            let parts: Vec<String> = [
                self.source.as_ref().map(|s| format!("source='{s}'")),
                self.group.as_ref().map(|g| format!("group='{g}'")),
            ]
            .into_iter()
            .flatten()
            .collect();
            out.push_str(&format!(" ({})", parts.join("/")));
        }
        out.push_str(&format!(" at {timestamp}"));
        if let Some(label) = self.label {
            out.push_str(&format!(" ({label})"));
        }
        if self.state != ContextState::Published {
            out.push_str(&format!(" ({})", self.state));
        }
        out
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Parameters for [`ContextFactory::fresh_context`]; unset fields take defaults.
#[derive(Debug, Clone)]
pub struct FreshContext {
    pub context_type: ContextType,
    pub id: Option<Iri>,
    pub source: Option<Iri>,
    pub group: Option<Iri>,
    pub input_parameter: Option<Iri>,
    pub editable: Option<bool>,
    pub label: Option<ContextLabel>,
    pub state: Option<ContextState>,
}

impl FreshContext {
    pub fn new(context_type: ContextType) -> Self {
        Self {
            context_type,
            id: None,
            source: None,
            group: None,
            input_parameter: None,
            editable: None,
            label: None,
            state: None,
        }
    }

    pub fn id(mut self, id: Iri) -> Self {
        self.id = Some(id);
        self
    }

    pub fn source(mut self, source: Iri) -> Self {
        self.source = Some(source);
        self
    }

    pub fn group(mut self, group: Iri) -> Self {
        self.group = Some(group);
        self
    }

    pub fn input_parameter(mut self, input: Iri) -> Self {
        self.input_parameter = Some(input);
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = Some(editable);
        self
    }

    pub fn label(mut self, label: ContextLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn state(mut self, state: ContextState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Allocates timestamps and builds new, not-yet-persisted contexts.
pub struct ContextFactory {
    clock: TimestampAllocator,
    editorial_workflow: bool,
    namespace: Iri,
}

impl ContextFactory {
    pub fn new(config: &ProvenanceConfig) -> Self {
        Self::with_clock(config, TimestampAllocator::new())
    }

    pub fn with_clock(config: &ProvenanceConfig, clock: TimestampAllocator) -> Self {
        Self {
            clock,
            editorial_workflow: config.editorial_workflow,
            namespace: config.namespace(),
        }
    }

    pub fn allocate_timestamp(&self) -> Timestamp {
        self.clock.allocate()
    }

    pub fn clock(&self) -> &TimestampAllocator {
        &self.clock
    }

    /// `source/timestamp/type`, with the configured namespace standing in
    /// for a missing source.
    pub fn generated_id(
        &self,
        source: Option<&Iri>,
        timestamp: Timestamp,
        context_type: ContextType,
    ) -> Iri {
        let base = source.unwrap_or(&self.namespace).as_str().trim_end_matches('/');
        Iri::new(format!("{base}/{timestamp}/{}", context_type.as_str()))
    }

    pub fn default_state(&self, context_type: ContextType) -> ContextState {
        if context_type == ContextType::User && self.editorial_workflow {
            ContextState::Draft
        } else {
            ContextState::Published
        }
    }

    pub fn fresh_context(&self, request: FreshContext) -> Context {
        if let Some(singleton) = Context::singleton(request.context_type) {
            return singleton;
        }

        // The timestamp must exist before the id is derived from it.
        let timestamp = self.allocate_timestamp();
        let id = request.id.unwrap_or_else(|| {
            self.generated_id(request.source.as_ref(), timestamp, request.context_type)
        });
        let state = request
            .state
            .unwrap_or_else(|| self.default_state(request.context_type));

        Context {
            id,
            context_type: request.context_type,
            state,
            timestamp: Some(timestamp),
            source: request.source,
            group: request.group,
            input_parameter: request.input_parameter,
            label: request.label,
            editable: request.editable,
        }
    }

    pub fn fresh_published_context(
        &self,
        context_type: ContextType,
        source: Option<Iri>,
        label: Option<ContextLabel>,
    ) -> Context {
        let mut request = FreshContext::new(context_type).state(ContextState::Published);
        request.source = source;
        request.label = label;
        self.fresh_context(request)
    }

    /// An editable context owned by `user`, in draft under editorial workflow.
    pub fn fresh_user_context(&self, user: Iri, label: Option<ContextLabel>) -> Context {
        let mut request = FreshContext::new(ContextType::User)
            .source(user)
            .editable(true);
        request.label = label;
        self.fresh_context(request)
    }

    /// Context for synchronization writes. Passing the same `timestamp`
    /// again yields the same id, so repeated writes with one logical
    /// timestamp share a context.
    pub fn sync_service_context(
        &self,
        source: &Iri,
        group: Option<&Iri>,
        timestamp: Option<Timestamp>,
    ) -> Context {
        let timestamp = timestamp.unwrap_or_else(|| self.allocate_timestamp());
        Context {
            id: self.generated_id(Some(source), timestamp, ContextType::SyncService),
            context_type: ContextType::SyncService,
            state: self.default_state(ContextType::SyncService),
            timestamp: Some(timestamp),
            source: Some(source.clone()),
            group: group.cloned(),
            input_parameter: None,
            label: Some(ContextLabel::AutomaticSynchronization),
            editable: Some(false),
        }
    }
}
