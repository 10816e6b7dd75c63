//! Statically declared object-to-statement mappings.
//!
//! A mapping says, per class, which statements an object produces, which
//! sub-objects are folded into its statement set, and which other objects
//! point back at it. Mappings are registered once at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use graphprov_core::vocabulary::{self, owl, rdf, rdfs};
use graphprov_core::{Iri, Statement, Term};

/// What deleting an object of a class removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// The whole context owning the object.
    Context,
    /// The object's own statements within its group.
    #[default]
    Object,
    /// Every statement mentioning the object in user contexts, then the
    /// object's own statements.
    ObjectAndUserStatements,
}

/// Static description of a mapped class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub class_iri: Iri,
    pub deletion_policy: DeletionPolicy,
    pub properties: Vec<Iri>,
    pub referred_predicates: Vec<Iri>,
    /// Predicates other objects use to point at objects of this class.
    pub referencing_predicates: Vec<Iri>,
}

/// The statements an object should produce right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSnapshot {
    pub id: Iri,
    pub class: String,
    pub statements: Vec<Statement>,
    pub referred: Vec<ObjectSnapshot>,
    /// Referencing predicate -> objects that should point here through it.
    pub referencing: BTreeMap<Iri, BTreeSet<Iri>>,
}

impl ObjectSnapshot {
    /// Own statements plus those of every referred object.
    pub fn all_statements(&self) -> Vec<Statement> {
        let mut out = self.statements.clone();
        for sub in &self.referred {
            out.extend(sub.all_statements());
        }
        out
    }

    pub fn referred_ids(&self) -> Vec<Iri> {
        self.referred.iter().map(|s| s.id.clone()).collect()
    }
}

type IdFn<T> = Box<dyn Fn(&T) -> Iri + Send + Sync>;
type TermsFn<T> = Box<dyn Fn(&T) -> Vec<Term> + Send + Sync>;
type ReferredFn<T> = Box<dyn Fn(&T) -> Vec<ObjectSnapshot> + Send + Sync>;
type ReferencingFn<T> = Box<dyn Fn(&T) -> Vec<Iri> + Send + Sync>;

/// Mapping of one Rust type onto statements.
pub struct ObjectMapping<T> {
    info: ClassInfo,
    id: IdFn<T>,
    properties: Vec<(Iri, TermsFn<T>)>,
    referred: Vec<(Iri, ReferredFn<T>)>,
    referencing: Vec<(Iri, ReferencingFn<T>)>,
}

impl<T> ObjectMapping<T> {
    pub fn new(
        name: impl Into<String>,
        class_iri: Iri,
        id: impl Fn(&T) -> Iri + Send + Sync + 'static,
    ) -> Self {
        Self {
            info: ClassInfo {
                name: name.into(),
                class_iri,
                deletion_policy: DeletionPolicy::default(),
                properties: Vec::new(),
                referred_predicates: Vec::new(),
                referencing_predicates: Vec::new(),
            },
            id: Box::new(id),
            properties: Vec::new(),
            referred: Vec::new(),
            referencing: Vec::new(),
        }
    }

    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.info.deletion_policy = policy;
        self
    }

    pub fn property(
        mut self,
        predicate: Iri,
        values: impl Fn(&T) -> Vec<Term> + Send + Sync + 'static,
    ) -> Self {
        self.info.properties.push(predicate.clone());
        self.properties.push((predicate, Box::new(values)));
        self
    }

    /// Sub-objects linked through `predicate` whose statements are folded
    /// into this object's statement set.
    pub fn referred(
        mut self,
        predicate: Iri,
        objects: impl Fn(&T) -> Vec<ObjectSnapshot> + Send + Sync + 'static,
    ) -> Self {
        self.info.referred_predicates.push(predicate.clone());
        self.referred.push((predicate, Box::new(objects)));
        self
    }

    /// Objects that point at this one through `predicate`.
    pub fn referencing(
        mut self,
        predicate: Iri,
        subjects: impl Fn(&T) -> Vec<Iri> + Send + Sync + 'static,
    ) -> Self {
        self.info.referencing_predicates.push(predicate.clone());
        self.referencing.push((predicate, Box::new(subjects)));
        self
    }

    pub fn class_info(&self) -> &ClassInfo {
        &self.info
    }

    pub fn id_of(&self, value: &T) -> Iri {
        (self.id)(value)
    }

    pub fn snapshot(&self, value: &T) -> ObjectSnapshot {
        let id = (self.id)(value);
        let mut statements = vec![Statement::new(
            &id,
            vocabulary::iri(rdf::TYPE),
            &self.info.class_iri,
        )];
        for (predicate, values) in &self.properties {
            for term in values(value) {
                statements.push(Statement::new(&id, predicate.clone(), term));
            }
        }

        let mut referred = Vec::new();
        for (predicate, objects) in &self.referred {
            for sub in objects(value) {
                statements.push(Statement::new(&id, predicate.clone(), &sub.id));
                referred.push(sub);
            }
        }

        let referencing = self
            .referencing
            .iter()
            .map(|(predicate, subjects)| {
                (predicate.clone(), subjects(value).into_iter().collect())
            })
            .collect();

        ObjectSnapshot {
            id,
            class: self.info.name.clone(),
            statements,
            referred,
            referencing,
        }
    }
}

impl<T> fmt::Debug for ObjectMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectMapping")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Class name -> [`ClassInfo`], built at startup.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    classes: BTreeMap<String, ClassInfo>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, mapping: &ObjectMapping<T>) -> &mut Self {
        let info = mapping.class_info().clone();
        self.classes.insert(info.name.clone(), info);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Schema statements describing every registered class.
    pub fn ontology_statements(&self) -> Vec<Statement> {
        let rdf_type = vocabulary::iri(rdf::TYPE);
        let domain = vocabulary::iri(rdfs::DOMAIN);
        let mut out = Vec::new();
        for info in self.classes.values() {
            out.push(Statement::new(
                &info.class_iri,
                rdf_type.clone(),
                Term::iri(rdfs::CLASS),
            ));
            out.push(Statement::new(
                &info.class_iri,
                vocabulary::iri(rdfs::LABEL),
                Term::literal(info.name.as_str()),
            ));
            for predicate in &info.properties {
                out.push(Statement::new(
                    predicate,
                    rdf_type.clone(),
                    Term::iri(owl::DATATYPE_PROPERTY),
                ));
                out.push(Statement::new(predicate, domain.clone(), &info.class_iri));
            }
            for predicate in &info.referred_predicates {
                out.push(Statement::new(
                    predicate,
                    rdf_type.clone(),
                    Term::iri(owl::OBJECT_PROPERTY),
                ));
                out.push(Statement::new(predicate, domain.clone(), &info.class_iri));
            }
            for predicate in &info.referencing_predicates {
                out.push(Statement::new(
                    predicate,
                    rdf_type.clone(),
                    Term::iri(owl::OBJECT_PROPERTY),
                ));
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

/// Rebuilds the current snapshot of an object, used when a cascade has to
/// refresh an object nobody submitted.
pub trait ObjectResolver: Send + Sync {
    fn resolve(&self, id: &Iri) -> Option<ObjectSnapshot>;
}

/// Resolves nothing; cascades then only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl ObjectResolver for NoResolver {
    fn resolve(&self, _id: &Iri) -> Option<ObjectSnapshot> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Address {
        id: String,
        city: String,
    }

    struct Site {
        id: String,
        name: String,
        address: Option<Address>,
        operators: Vec<String>,
    }

    fn address_mapping() -> ObjectMapping<Address> {
        ObjectMapping::new("Address", Iri::new("urn:ex:Address"), |a: &Address| {
            Iri::new(a.id.as_str())
        })
        .property(Iri::new("urn:ex:city"), |a| vec![Term::literal(a.city.as_str())])
    }

    fn site_mapping() -> ObjectMapping<Site> {
        let addresses = address_mapping();
        ObjectMapping::new("Site", Iri::new("urn:ex:Site"), |s: &Site| Iri::new(s.id.as_str()))
            .deletion_policy(DeletionPolicy::Context)
            .property(Iri::new("urn:ex:name"), |s| vec![Term::literal(s.name.as_str())])
            .referred(Iri::new("urn:ex:address"), move |s| {
                s.address.iter().map(|a| addresses.snapshot(a)).collect()
            })
            .referencing(Iri::new("urn:ex:operates"), |s| {
                s.operators.iter().map(|o| Iri::new(o.as_str())).collect()
            })
    }

    fn site() -> Site {
        Site {
            id: "urn:site:1".into(),
            name: "North".into(),
            address: Some(Address {
                id: "urn:addr:1".into(),
                city: "Oslo".into(),
            }),
            operators: vec!["urn:op:a".into()],
        }
    }

    #[test]
    fn snapshot_lists_typed_statements() {
        let snapshot = site_mapping().snapshot(&site());
        assert_eq!(snapshot.id, Iri::new("urn:site:1"));
        assert_eq!(snapshot.class, "Site");
        assert!(snapshot.statements.contains(&Statement::new(
            Iri::new("urn:site:1"),
            vocabulary::iri(rdf::TYPE),
            Term::iri("urn:ex:Site"),
        )));
        assert!(snapshot.statements.contains(&Statement::new(
            Iri::new("urn:site:1"),
            Iri::new("urn:ex:address"),
            Term::iri("urn:addr:1"),
        )));
        assert_eq!(snapshot.referred_ids(), vec![Iri::new("urn:addr:1")]);
        assert_eq!(
            snapshot.referencing[&Iri::new("urn:ex:operates")],
            BTreeSet::from([Iri::new("urn:op:a")])
        );
    }

    #[test]
    fn referred_statements_are_folded_in() {
        let snapshot = site_mapping().snapshot(&site());
        let all = snapshot.all_statements();
        assert_eq!(all.len(), snapshot.statements.len() + 2);
        assert!(all.contains(&Statement::new(
            Iri::new("urn:addr:1"),
            Iri::new("urn:ex:city"),
            Term::literal("Oslo"),
        )));
    }

    #[test]
    fn registry_describes_classes() {
        let mut registry = MappingRegistry::new();
        registry.register(&site_mapping()).register(&address_mapping());
        assert_eq!(registry.len(), 2);

        let info = registry.get("Site").unwrap();
        assert_eq!(info.deletion_policy, DeletionPolicy::Context);
        assert_eq!(info.referencing_predicates, vec![Iri::new("urn:ex:operates")]);

        let ontology = registry.ontology_statements();
        assert!(ontology.contains(&Statement::new(
            Iri::new("urn:ex:name"),
            vocabulary::iri(rdfs::DOMAIN),
            Term::iri("urn:ex:Site"),
        )));
        assert!(ontology.contains(&Statement::new(
            Iri::new("urn:ex:Address"),
            vocabulary::iri(rdf::TYPE),
            Term::iri(rdfs::CLASS),
        )));
    }
}
