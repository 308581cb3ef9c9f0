//! Entity interning
//!
//! A session-scoped, content-addressed table of canonical entities. Interning
//! a structurally equal entity twice hands back the same `Arc`, so reference
//! equality and value equality coincide for every entity that went through the
//! pool. The pool also keeps the advisory `parts` index: for each entity, the
//! entities that named it as their `entirety`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use req_types::{Condition, Entity, EntityRef, Req};

/// Content-addressed entity table for one modelling + detection session
#[derive(Debug, Default)]
pub struct EntityPool {
    entities: HashSet<EntityRef>,
    parts: HashMap<EntityRef, Vec<EntityRef>>,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical handle for `entity`, inserting it if unseen.
    ///
    /// The owning entity is interned first, so canonical handles are
    /// canonical all the way down the `entirety` chain.
    pub fn intern(&mut self, mut entity: Entity) -> EntityRef {
        if let Some(whole) = entity.entirety.take() {
            entity.entirety = Some(self.canonical(whole));
        }

        if let Some(existing) = self.entities.get(&entity) {
            return Arc::clone(existing);
        }

        let handle = Arc::new(entity);
        if let Some(whole) = &handle.entirety {
            self.parts
                .entry(Arc::clone(whole))
                .or_default()
                .push(Arc::clone(&handle));
        }
        self.entities.insert(Arc::clone(&handle));
        handle
    }

    /// Canonicalize an existing handle
    pub fn canonical(&mut self, handle: EntityRef) -> EntityRef {
        if let Some(existing) = self.entities.get(handle.as_ref()) {
            return Arc::clone(existing);
        }
        let entity = Arc::try_unwrap(handle).unwrap_or_else(|shared| (*shared).clone());
        self.intern(entity)
    }

    /// Canonical handle for the implicit system actor
    pub fn system(&mut self) -> EntityRef {
        self.intern(Entity::system())
    }

    /// Re-point every entity of a requirement (events included) at its
    /// canonical handle
    pub fn canonicalize_req(&mut self, req: &mut Req) {
        req.agent = self.canonical(Arc::clone(&req.agent));
        self.canonicalize_list(&mut req.input);
        self.canonicalize_list(&mut req.output);
        for condition in &mut req.event {
            self.canonicalize_condition(condition);
        }
    }

    pub fn canonicalize_condition(&mut self, condition: &mut Condition) {
        condition.agent = self.canonical(Arc::clone(&condition.agent));
        self.canonicalize_list(&mut condition.input);
        self.canonicalize_list(&mut condition.output);
    }

    fn canonicalize_list(&mut self, list: &mut [EntityRef]) {
        for slot in list.iter_mut() {
            *slot = self.canonical(Arc::clone(slot));
        }
    }

    /// Entities recorded as parts of `whole`
    pub fn parts_of(&self, whole: &Entity) -> &[EntityRef] {
        self.parts.get(whole).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
