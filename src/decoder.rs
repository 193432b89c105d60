//! Reference table → value graph.
//!
//! Decoding runs in two phases. The first resolves slot 0 depth-first,
//! resolving other slots the first time a marker names them. Containers are
//! allocated and recorded before their children are resolved, so a marker back
//! into a container that is still being filled yields the same handle. A marker
//! to a slot whose envelope is still being reconstructed yields a
//! [`Value::Pending`] that is filled once the reconstructor returns.
//!
//! The second phase walks the finished graph and swaps every placeholder for
//! the value it stands for.

use crate::escape::{unescape_key, DATA_KEY, REF_KEY, TYPE_KEY};
use crate::value::{Pending, Shared};
use crate::{Data, DataMap, Error, ObjectMap, Result, TransformRegistry, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Rebuilds the root value from a reference table.
pub(crate) fn decode(table: Data, registry: &TransformRegistry) -> Result<Value> {
    let slots = match table {
        Data::Array(slots) if !slots.is_empty() => slots,
        Data::Array(_) => return Err(Error::malformed("reference table is empty")),
        _ => return Err(Error::malformed("expected an array of slots")),
    };

    let mut decoder = GraphDecoder::new(slots, registry);
    decoder.visited[0] = true;
    let root = decoder.resolve_slot(0)?;
    let root = settle(root)?;
    debug!(slots = decoder.resolved.len(), "decoded value graph");
    Ok(root)
}

enum Shape {
    Reference(usize),
    Envelope { tag: String, data: Data },
    Plain(DataMap),
}

fn classify(mut fields: DataMap) -> Result<Shape> {
    if fields.contains_key(REF_KEY) {
        if fields.len() != 1 {
            return Err(Error::malformed("reference marker has extra keys"));
        }
        let index = fields
            .remove(REF_KEY)
            .and_then(|slot| slot.as_i64())
            .and_then(|slot| usize::try_from(slot).ok())
            .ok_or_else(|| Error::malformed("reference marker is not a non-negative integer"))?;
        return Ok(Shape::Reference(index));
    }

    if fields.contains_key(TYPE_KEY) {
        if fields.len() != 2 || !fields.contains_key(DATA_KEY) {
            return Err(Error::malformed("envelope must hold exactly a tag and data"));
        }
        let tag = match fields.remove(TYPE_KEY) {
            Some(Data::String(tag)) => tag,
            _ => return Err(Error::malformed("envelope tag is not a string")),
        };
        let data = fields.remove(DATA_KEY).unwrap_or_default();
        return Ok(Shape::Envelope { tag, data });
    }

    if fields.contains_key(DATA_KEY) {
        return Err(Error::malformed("envelope data without a tag"));
    }

    Ok(Shape::Plain(fields))
}

struct GraphDecoder<'r> {
    registry: &'r TransformRegistry,
    slots: Vec<Option<Data>>,
    resolved: Vec<Option<Value>>,
    visited: Vec<bool>,
    active: Vec<usize>,
    pending: HashMap<usize, Pending>,
}

impl<'r> GraphDecoder<'r> {
    fn new(slots: Vec<Data>, registry: &'r TransformRegistry) -> Self {
        let count = slots.len();
        GraphDecoder {
            registry,
            slots: slots.into_iter().map(Some).collect(),
            resolved: vec![None; count],
            visited: vec![false; count],
            active: Vec::new(),
            pending: HashMap::new(),
        }
    }

    fn resolve_slot(&mut self, slot: usize) -> Result<Value> {
        let raw = self.slots[slot]
            .take()
            .ok_or_else(|| Error::malformed(format!("slot {} resolved twice", slot)))?;
        let value = self.resolve(raw, Some(slot))?;
        self.resolved[slot] = Some(value.clone());
        Ok(value)
    }

    /// `top` is the slot `data` is the top-level value of, if any.
    fn resolve(&mut self, data: Data, top: Option<usize>) -> Result<Value> {
        match data {
            Data::Null => Ok(Value::Null),
            Data::Bool(b) => Ok(Value::Bool(b)),
            Data::Number(n) => Ok(Value::Number(n)),
            Data::String(s) => Ok(Value::String(s)),
            Data::Array(items) => {
                let handle = Shared::new(Vec::with_capacity(items.len()));
                let value = Value::Array(handle.clone());
                self.record(top, &value);
                for item in items {
                    let item = self.resolve(item, None)?;
                    handle.borrow_mut().push(item);
                }
                Ok(value)
            }
            Data::Object(fields) => match classify(fields)? {
                Shape::Reference(index) => self.resolve_reference(index),
                Shape::Envelope { tag, data } => self.resolve_envelope(&tag, data, top),
                Shape::Plain(fields) => {
                    let handle = Shared::new(ObjectMap::with_capacity(fields.len()));
                    let value = Value::Object(handle.clone());
                    self.record(top, &value);
                    for (key, field) in fields {
                        let field = self.resolve(field, None)?;
                        handle
                            .borrow_mut()
                            .insert(unescape_key(&key).into_owned(), field);
                    }
                    Ok(value)
                }
            },
        }
    }

    fn record(&mut self, top: Option<usize>, value: &Value) {
        if let Some(slot) = top {
            self.resolved[slot] = Some(value.clone());
        }
    }

    fn resolve_reference(&mut self, index: usize) -> Result<Value> {
        if index >= self.slots.len() {
            return Err(Error::malformed(format!(
                "reference to slot {} but the table has {} slots",
                index,
                self.slots.len()
            )));
        }

        if self.active.contains(&index) {
            let pending = self
                .pending
                .entry(index)
                .or_insert_with(|| Pending::new(index));
            return Ok(Value::Pending(pending.clone()));
        }

        if !self.visited[index] {
            self.visited[index] = true;
            return self.resolve_slot(index);
        }

        self.resolved[index].clone().ok_or_else(|| {
            Error::malformed(format!("slot {} is referenced before it has a value", index))
        })
    }

    fn resolve_envelope(&mut self, tag: &str, data: Data, top: Option<usize>) -> Result<Value> {
        let registry = self.registry;
        let transform = registry
            .get(tag)
            .ok_or_else(|| Error::UnknownTransformType(tag.to_string()))?;

        if let Some(slot) = top {
            self.active.push(slot);
        }
        let inner = self.resolve(data, None);
        if top.is_some() {
            self.active.pop();
        }

        let value = transform.reconstruct(inner?)?;
        if let (Value::Pending(placeholder), Some(slot)) = (&value, top) {
            if placeholder.slot() == slot {
                return Err(Error::reconstruct(tag, "reconstructed to its own placeholder"));
            }
        }

        if let Some(pending) = top.and_then(|slot| self.pending.get(&slot)) {
            pending.fill(value.clone());
        }
        Ok(value)
    }
}

/// Replaces every filled placeholder reachable from `root` with its value.
fn settle(root: Value) -> Result<Value> {
    let root = root.resolved();
    if let Value::Pending(placeholder) = &root {
        return Err(unfilled(placeholder.slot()));
    }

    let mut stack = vec![root.clone()];
    let mut seen = HashSet::new();
    let mut unfilled_slot = None;

    while let Some(value) = stack.pop() {
        let Some(id) = value.identity() else { continue };
        if !seen.insert(id) {
            continue;
        }

        let mut visit = |child: &mut Value| {
            if let Value::Pending(placeholder) = child {
                let slot = placeholder.slot();
                match placeholder.get().map(Value::resolved) {
                    Some(real) if !matches!(real, Value::Pending(_)) => *child = real,
                    _ => {
                        unfilled_slot.get_or_insert(slot);
                        return;
                    }
                }
            }
            if child.is_object_like() {
                stack.push(child.clone());
            }
        };

        match &value {
            Value::Array(items) => items.borrow_mut().iter_mut().for_each(&mut visit),
            Value::Object(fields) => fields.borrow_mut().values_mut().for_each(&mut visit),
            Value::Map(map) => map.borrow_mut().rekey_with(&mut visit),
            Value::Set(set) => set.borrow_mut().rekey_with(&mut visit),
            Value::Custom(custom) => custom.for_each_child_mut(&mut visit),
            _ => {}
        }
    }

    match unfilled_slot {
        Some(slot) => Err(unfilled(slot)),
        None => Ok(root),
    }
}

fn unfilled(slot: usize) -> Error {
    Error::malformed(format!("placeholder for slot {} was never filled", slot))
}
