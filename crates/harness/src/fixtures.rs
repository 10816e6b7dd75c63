use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use graphprov_core::{Iri, Term};
use graphprov_engine::{ChangeListener, ObjectMapping, ObjectResolver, ObjectSnapshot};
use parking_lot::{Mutex, RwLock};

pub const EX: &str = "http://example.org/";

pub fn ex(local: &str) -> Iri {
    Iri::new(format!("{EX}{local}"))
}

#[derive(Debug, Clone)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub team: Option<String>,
}

impl Person {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team: None,
        }
    }

    pub fn in_team(mut self, team: &str) -> Self {
        self.team = Some(team.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub members: Vec<String>,
}

impl Team {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| m.to_string()).collect();
        self
    }
}

pub fn person_mapping() -> ObjectMapping<Person> {
    ObjectMapping::new("Person", ex("Person"), |p: &Person| ex(&p.id))
        .property(ex("name"), |p| vec![Term::literal(p.name.as_str())])
        .property(ex("memberOf"), |p| {
            p.team.iter().map(|t| Term::from(ex(t))).collect()
        })
}

/// Persons point at their team through `ex:memberOf`.
pub fn team_mapping() -> ObjectMapping<Team> {
    ObjectMapping::new("Team", ex("Team"), |t: &Team| ex(&t.id))
        .property(ex("name"), |t| vec![Term::literal(t.name.as_str())])
        .referencing(ex("memberOf"), |t| t.members.iter().map(|m| ex(m)).collect())
}

/// Resolves objects from snapshots handed to it by the test.
#[derive(Default)]
pub struct MapResolver {
    objects: RwLock<HashMap<Iri, ObjectSnapshot>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: ObjectSnapshot) {
        self.objects.write().insert(snapshot.id.clone(), snapshot);
    }
}

impl ObjectResolver for MapResolver {
    fn resolve(&self, id: &Iri) -> Option<ObjectSnapshot> {
        self.objects.read().get(id).cloned()
    }
}

/// Counts invalidations and keeps every reindex call.
#[derive(Default)]
pub struct RecordingListener {
    invalidations: AtomicUsize,
    reindexed: Mutex<Vec<(BTreeSet<Iri>, BTreeSet<Iri>)>>,
}

impl RecordingListener {
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn updated(&self) -> BTreeSet<Iri> {
        self.reindexed
            .lock()
            .iter()
            .flat_map(|(updated, _)| updated.iter().cloned())
            .collect()
    }

    pub fn deleted(&self) -> BTreeSet<Iri> {
        self.reindexed
            .lock()
            .iter()
            .flat_map(|(_, deleted)| deleted.iter().cloned())
            .collect()
    }
}

impl ChangeListener for RecordingListener {
    fn invalidate_caches(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn reindex(&self, updated: &BTreeSet<Iri>, deleted: &BTreeSet<Iri>) {
        self.reindexed.lock().push((updated.clone(), deleted.clone()));
    }
}
