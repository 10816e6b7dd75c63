use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::ids::Iri;

/// A literal value with an optional datatype or language tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<Iri>,
    pub language: Option<String>,
}

/// A node in a statement position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(Iri::new(value))
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        })
    }

    pub fn typed_literal(lexical: impl Into<String>, datatype: Iri) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            datatype: Some(datatype),
            language: None,
        })
    }

    pub fn lang_literal(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.into()),
        })
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// The string value of the term: IRI text, blank label or lexical form.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri.as_str(),
            Term::Blank(label) => label,
            Term::Literal(lit) => &lit.lexical,
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Term::Iri(iri)
    }
}

impl From<&Iri> for Term {
    fn from(iri: &Iri) -> Self {
        Term::Iri(iri.clone())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Blank(label) => write!(f, "_:{label}"),
            Term::Literal(Literal {
                lexical,
                datatype,
                language,
            }) => {
                write!(f, "{lexical:?}")?;
                if let Some(lang) = language {
                    write!(f, "@{lang}")?;
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{dt}>")?;
                }
                Ok(())
            }
        }
    }
}

/// An atomic (subject, predicate, object) fact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Iri,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: impl Into<Term>, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.subject, self.predicate, self.object)
    }
}

/// A statement as stored: tagged with the context that owns it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quad {
    pub statement: Statement,
    pub context: Iri,
}

/// A statement template where `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementPattern {
    pub subject: Option<Term>,
    pub predicate: Option<Iri>,
    pub object: Option<Term>,
}

impl StatementPattern {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(statement: &Statement) -> Self {
        Self {
            subject: Some(statement.subject.clone()),
            predicate: Some(statement.predicate.clone()),
            object: Some(statement.object.clone()),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<Term>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_predicate(mut self, predicate: Iri) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_object(mut self, object: impl Into<Term>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn matches(&self, statement: &Statement) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == statement.subject)
            && self.predicate.as_ref().is_none_or(|p| *p == statement.predicate)
            && self.object.as_ref().is_none_or(|o| *o == statement.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msgpack_keeps_literal_flavours_apart() {
        let plain = Term::literal("42");
        let typed = Term::typed_literal("42", Iri::new("http://www.w3.org/2001/XMLSchema#int"));
        let tagged = Term::lang_literal("42", "en");

        let encoded: Vec<Vec<u8>> = [&plain, &typed, &tagged]
            .iter()
            .map(|t| t.to_msgpack().unwrap())
            .collect();
        assert_ne!(encoded[0], encoded[1]);
        assert_ne!(encoded[1], encoded[2]);
        assert_eq!(Term::from_msgpack(&encoded[1]).unwrap(), typed);
    }

    #[test]
    fn pattern_wildcards() {
        let stmt = Statement::new(
            Iri::new("urn:s"),
            Iri::new("urn:p"),
            Term::literal("o"),
        );
        assert!(StatementPattern::any().matches(&stmt));
        assert!(StatementPattern::exact(&stmt).matches(&stmt));
        assert!(
            StatementPattern::any()
                .with_predicate(Iri::new("urn:p"))
                .matches(&stmt)
        );
        assert!(
            !StatementPattern::any()
                .with_object(Term::literal("other"))
                .matches(&stmt)
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Term::iri("urn:a").to_string(), "<urn:a>");
        assert_eq!(Term::Blank("b0".into()).to_string(), "_:b0");
        assert_eq!(Term::lang_literal("hi", "en").to_string(), "\"hi\"@en");
    }
}
