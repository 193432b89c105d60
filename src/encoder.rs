//! Value graph → reference table.
//!
//! The encoder walks the graph once, building an arena of encoded nodes. Every
//! object-like value it enters is recorded as a candidate keyed by identity.
//! Meeting a candidate a second time (a cycle or a shared sub-object) emits a
//! reference marker and assigns the candidate a slot: `0` for the root, the
//! next free index otherwise. Once the walk is done, each candidate with a
//! slot above zero has its encoded node moved into the table and replaced by a
//! marker in place.

use crate::escape::{escape_key, DATA_KEY, REF_KEY, TYPE_KEY};
use crate::{Data, DataMap, Error, Result, TransformRegistry, Value};
use std::collections::HashMap;
use std::mem;
use tracing::{debug, trace};

type NodeId = usize;

#[derive(Debug)]
enum Node {
    Leaf(Data),
    Array(Vec<NodeId>),
    Object(Vec<(String, NodeId)>),
    Envelope { tag: String, data: NodeId },
    Reference(usize),
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: NodeId,
    is_root: bool,
    slot: Option<usize>,
}

/// Encodes `value` into a reference table: an array whose slot 0 holds the root.
pub(crate) fn encode(value: &Value, registry: &TransformRegistry) -> Result<Data> {
    let mut encoder = GraphEncoder::new(registry);
    let root = encoder.handle(value, true)?;
    Ok(encoder.into_table(root))
}

struct GraphEncoder<'r> {
    registry: &'r TransformRegistry,
    nodes: Vec<Node>,
    candidates: Vec<Candidate>,
    index: HashMap<usize, usize>,
    next_slot: usize,
    // Keeps reduced forms alive so their addresses are not reused mid-walk.
    retained: Vec<Value>,
}

impl<'r> GraphEncoder<'r> {
    fn new(registry: &'r TransformRegistry) -> Self {
        GraphEncoder {
            registry,
            nodes: Vec::new(),
            candidates: Vec::new(),
            index: HashMap::new(),
            next_slot: 1,
            retained: Vec::new(),
        }
    }

    fn handle(&mut self, value: &Value, is_root: bool) -> Result<NodeId> {
        let value = value.resolved();

        if let Some(id) = value.identity() {
            if let Some(&candidate) = self.index.get(&id) {
                let slot = self.slot_for(candidate);
                return Ok(self.push(Node::Reference(slot)));
            }
        }

        let registry = self.registry;
        if let Some(transform) = registry.find_match(&value) {
            let node = self.reserve();
            self.track(&value, node, is_root);
            let reduced = transform.reduce(&value)?;
            let data = self.handle(&reduced, false)?;
            self.retained.push(reduced);
            self.nodes[node] = Node::Envelope {
                tag: transform.tag().to_string(),
                data,
            };
            return Ok(node);
        }

        match &value {
            Value::Array(items) => {
                let node = self.reserve();
                self.track(&value, node, is_root);
                let items = items.borrow().clone();
                let children = items
                    .iter()
                    .map(|item| self.handle(item, false))
                    .collect::<Result<Vec<_>>>()?;
                self.nodes[node] = Node::Array(children);
                Ok(node)
            }
            Value::Object(fields) => {
                let node = self.reserve();
                self.track(&value, node, is_root);
                let fields: Vec<(String, Value)> = fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut children = Vec::with_capacity(fields.len());
                for (key, field) in &fields {
                    let child = self.handle(field, false)?;
                    children.push((escape_key(key).into_owned(), child));
                }
                self.nodes[node] = Node::Object(children);
                Ok(node)
            }
            Value::Undefined | Value::Null => Ok(self.push(Node::Leaf(Data::Null))),
            Value::Bool(b) => Ok(self.push(Node::Leaf(Data::Bool(*b)))),
            Value::Number(n) => Ok(self.push(Node::Leaf(Data::Number(*n)))),
            Value::String(s) => Ok(self.push(Node::Leaf(Data::String(s.clone())))),
            Value::Custom(custom) => {
                debug!(type_name = custom.type_name(), "no transform matches custom value");
                Err(Error::UnsupportedRuntimeType(value.kind()))
            }
            other => Err(Error::UnsupportedRuntimeType(other.kind())),
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn reserve(&mut self) -> NodeId {
        self.push(Node::Leaf(Data::Null))
    }

    fn track(&mut self, value: &Value, node: NodeId, is_root: bool) {
        if let Some(id) = value.identity() {
            self.index.insert(id, self.candidates.len());
            self.candidates.push(Candidate {
                node,
                is_root,
                slot: None,
            });
        }
    }

    fn slot_for(&mut self, candidate: usize) -> usize {
        let entry = &mut self.candidates[candidate];
        if let Some(slot) = entry.slot {
            return slot;
        }

        let slot = if entry.is_root {
            0
        } else {
            let next = self.next_slot;
            self.next_slot += 1;
            next
        };
        entry.slot = Some(slot);
        trace!(slot, "shared identity confirmed");
        slot
    }

    fn into_table(mut self, root: NodeId) -> Data {
        let mut table = vec![root; self.next_slot];
        for candidate in mem::take(&mut self.candidates) {
            match candidate.slot {
                Some(slot) if slot > 0 => {
                    let moved = mem::replace(&mut self.nodes[candidate.node], Node::Reference(slot));
                    table[slot] = self.push(moved);
                }
                _ => {}
            }
        }

        debug!(slots = table.len(), nodes = self.nodes.len(), "encoded value graph");
        let slots = table.into_iter().map(|id| self.build(id)).collect();
        Data::Array(slots)
    }

    fn build(&mut self, id: NodeId) -> Data {
        match mem::replace(&mut self.nodes[id], Node::Leaf(Data::Null)) {
            Node::Leaf(data) => data,
            Node::Array(children) => {
                Data::Array(children.into_iter().map(|child| self.build(child)).collect())
            }
            Node::Object(fields) => Data::Object(
                fields
                    .into_iter()
                    .map(|(key, child)| (key, self.build(child)))
                    .collect(),
            ),
            Node::Envelope { tag, data } => {
                let mut envelope = DataMap::with_capacity(2);
                envelope.insert(TYPE_KEY.to_string(), Data::String(tag));
                envelope.insert(DATA_KEY.to_string(), self.build(data));
                Data::Object(envelope)
            }
            Node::Reference(slot) => reference_marker(slot),
        }
    }
}

fn reference_marker(slot: usize) -> Data {
    let mut marker = DataMap::with_capacity(1);
    marker.insert(REF_KEY.to_string(), Data::from(slot as i64));
    Data::Object(marker)
}
