//! Well-known IRIs used for context metadata and publish records.

use crate::ids::Iri;

pub const SYSTEM_NS: &str = "http://graphprov.local/system/";

/// Predicates and reserved contexts of the context-metadata layout.
pub mod ctx {
    pub const CONTEXT_CLASS: &str = "http://graphprov.local/system/Context";
    pub const CONTEXT_TYPE: &str = "http://graphprov.local/system/contextType";
    pub const CONTEXT_SRC: &str = "http://graphprov.local/system/contextSrc";
    pub const CONTEXT_STATE: &str = "http://graphprov.local/system/contextState";
    pub const CONTEXT_GROUP: &str = "http://graphprov.local/system/contextGroup";
    pub const IS_EDITABLE: &str = "http://graphprov.local/system/isEditable";
    pub const INPUT_PARAMETER: &str = "http://graphprov.local/system/inputParameter";

    pub const META_CONTEXT: &str = "http://graphprov.local/system/MetaContext";
    pub const VOID_CONTEXT: &str = "http://graphprov.local/system/VoIDContext";
    pub const EMPTY_CONTEXT: &str = "http://graphprov.local/system/EmptyContext";
}

pub mod rdf {
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

pub mod rdfs {
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
    pub const DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
}

pub mod owl {
    pub const OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
    pub const DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const INVERSE_OF: &str = "http://www.w3.org/2002/07/owl#inverseOf";
}

pub mod dc {
    pub const DATE: &str = "http://purl.org/dc/terms/date";
    pub const DESCRIPTION: &str = "http://purl.org/dc/terms/description";
    pub const CREATOR: &str = "http://purl.org/dc/terms/creator";
    pub const HAS_VERSION: &str = "http://purl.org/dc/terms/hasVersion";
}

pub mod prov {
    pub const ORIGIN: &str = "http://graphprov.local/publish/origin";
    pub const OWNER: &str = "http://graphprov.local/publish/owner";
}

pub mod changeset {
    pub const TRIPLES_ADDED: &str = "http://purl.org/vocab/changeset/schema#triplesAdded";
    pub const TRIPLES_REMOVED: &str = "http://purl.org/vocab/changeset/schema#triplesRemoved";
    pub const CHECKSUM: &str = "http://graphprov.local/publish/checksum";
}

pub mod xsd {
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
}

pub fn iri(value: &'static str) -> Iri {
    Iri::new(value)
}

pub fn meta_context() -> Iri {
    Iri::new(ctx::META_CONTEXT)
}
