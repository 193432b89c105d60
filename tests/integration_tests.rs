use replicator::{
    from_str, to_string, value, CustomValue, Data, Error, FnTransform, Kind, Replicator,
    ReplicatorOptions, Transform, Value,
};
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

fn json(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap()
}

#[test]
fn test_plain_graph_round_trip() {
    let order = value!({
        "order_id": 42,
        "customer": { "name": "Alice", "active": true },
        "items": [
            { "sku": "A-1", "price": 9.99, "quantity": 2 },
            { "sku": "B-2", "price": 0.5, "quantity": 10 }
        ],
        "note": null
    });

    let text = to_string(&order).unwrap();
    println!("Order: {}", text);
    assert_eq!(from_str(&text).unwrap(), order);
}

#[test]
fn test_nan_field_round_trip() {
    let obj = value!({ "a": 1 });
    obj.insert("a", Value::nan());

    let text = to_string(&obj).unwrap();
    assert_eq!(text, r#"[{"a":{"@t":"[[NaN]]","@d":""}}]"#);
    assert!(from_str(&text).unwrap().get("a").unwrap().is_nan());
}

#[test]
fn test_undefined_survives_json() {
    let list = value!([1, undefined, null]);
    let back = from_str(&to_string(&list).unwrap()).unwrap();
    assert!(back.at(1).unwrap().is_undefined());
    assert!(back.at(2).unwrap().is_null());
}

#[test]
fn test_self_reference() {
    let o = value!({ "name": "loop" });
    o.insert("self", o.clone());

    let text = to_string(&o).unwrap();
    assert_eq!(json(&text), json(r#"[{"name":"loop","self":{"@r":0}}]"#));

    let back = from_str(&text).unwrap();
    assert!(back.get("self").unwrap().same(&back));
    assert!(!back.same(&o));
}

#[test]
fn test_shared_sub_objects_keep_identity() {
    let config = value!({ "retries": 3 });
    let root = value!({
        "primary": { "config": config },
        "fallback": { "config": config },
        "all": [config, config]
    });

    let back = from_str(&to_string(&root).unwrap()).unwrap();
    let primary = back.get("primary").unwrap().get("config").unwrap();
    let fallback = back.get("fallback").unwrap().get("config").unwrap();
    let all = back.get("all").unwrap();

    assert!(primary.same(&fallback));
    assert!(primary.same(&all.at(0).unwrap()));
    assert!(primary.same(&all.at(1).unwrap()));
    assert_eq!(primary.get("retries"), Some(Value::from(3)));
}

#[test]
fn test_mutual_cycle() {
    let a = value!({ "name": "a" });
    let b = value!({ "name": "b" });
    a.insert("peer", b.clone());
    b.insert("peer", a.clone());
    let root = value!([a, b]);

    let back = from_str(&to_string(&root).unwrap()).unwrap();
    let (a2, b2) = (back.at(0).unwrap(), back.at(1).unwrap());
    assert!(a2.get("peer").unwrap().same(&b2));
    assert!(b2.get("peer").unwrap().same(&a2));
    assert_eq!(back, root);
}

#[test]
fn test_array_containing_itself() {
    let list = value!([1]);
    list.push(list.clone());

    let text = to_string(&list).unwrap();
    assert_eq!(text, r#"[[1,{"@r":0}]]"#);

    let back = from_str(&text).unwrap();
    assert!(back.at(1).unwrap().same(&back));
}

#[test]
fn test_encode_does_not_modify_input() {
    let mut replicator = Replicator::with_options(ReplicatorOptions::new().without_builtins());
    replicator
        .add_transform(
            FnTransform::new("array")
                .matching(|kind, _| kind == Kind::Array)
                .reduce_with(|v| Ok(v.at(0).unwrap_or_default()))
                .reconstruct_with(|d| Ok(Value::array(vec![d]))),
        )
        .unwrap();

    let obj = value!({
        "someProp1": { "prop": ["Hey ya"] },
        "someProp2": ["yo"]
    });
    let snapshot = value!({
        "someProp1": { "prop": ["Hey ya"] },
        "someProp2": ["yo"]
    });

    let text = replicator.encode(&obj).unwrap();
    assert_eq!(
        json(&text),
        json(
            r#"[{
                "someProp1": {"prop": {"@t": "array", "@d": "Hey ya"}},
                "someProp2": {"@t": "array", "@d": "yo"}
            }]"#
        )
    );
    assert_eq!(obj, snapshot);
    assert_eq!(replicator.decode(&text).unwrap(), snapshot);
}

#[test]
fn test_single_element_array_transform() {
    let mut replicator = Replicator::new();
    replicator
        .add_transform(
            FnTransform::new("single")
                .matching(|kind, v| {
                    kind == Kind::Array && v.as_array().is_some_and(|a| a.borrow().len() == 1)
                })
                .reduce_with(|v| Ok(v.at(0).unwrap_or_default()))
                .reconstruct_with(|d| Ok(Value::array(vec![d]))),
        )
        .unwrap();

    let original = value!({ "p": ["x"] });
    let back = replicator.decode(&replicator.encode(&original).unwrap()).unwrap();
    assert_eq!(back, value!({ "p": ["x"] }));
    assert_eq!(original, value!({ "p": ["x"] }));
}

#[test]
fn test_escaped_keys_round_trip() {
    let obj = value!({
        "@t": 1,
        "###@t": 2,
        "#@t": 3,
        "@r": 4,
        "@d": 5,
        "#plain": 6
    });

    let text = to_string(&obj).unwrap();
    assert_eq!(
        json(&text),
        json(r#####"[{"#@t":1,"####@t":2,"##@t":3,"#@r":4,"#@d":5,"#plain":6}]"#####)
    );

    let back = from_str(&text).unwrap();
    let keys: Vec<String> = back.as_object().unwrap().borrow().keys().cloned().collect();
    assert_eq!(keys, vec!["@t", "###@t", "#@t", "@r", "@d", "#plain"]);
    assert_eq!(back, obj);
}

#[test]
fn test_transforms_applied_inside_reduced_forms() {
    let mut replicator = Replicator::new();
    replicator
        .add_transform(
            FnTransform::new("Pair")
                .matching(|kind, v| kind == Kind::Object && v.get("pair").is_some())
                .reduce_with(|v| Ok(v.get("pair").unwrap_or_default()))
                .reconstruct_with(|d| Ok(Value::object([("pair", d)]))),
        )
        .unwrap();

    let obj = value!({ "pair": [1, 2] });
    obj.get("pair").unwrap().push(Value::nan());

    let text = replicator.encode(&obj).unwrap();
    assert_eq!(
        text,
        r#"[{"@t":"Pair","@d":[1,2,{"@t":"[[NaN]]","@d":""}]}]"#
    );
    assert_eq!(replicator.decode(&text).unwrap(), obj);
}

#[test]
fn test_encode_to_data_and_back() {
    let replicator = Replicator::new();
    let shared = value!(["s"]);
    let root = value!([shared, shared]);

    let table = replicator.encode_to_data(&root).unwrap();
    let slots = table.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1], Data::Array(vec![Data::from("s")]));

    let back = replicator.decode_data(table).unwrap();
    assert!(back.at(0).unwrap().same(&back.at(1).unwrap()));
}

/// A linked node with a custom transform whose reduced form can refer to itself.
#[derive(Debug)]
struct Node {
    label: String,
    next: RefCell<Value>,
}

impl CustomValue for Node {
    fn type_name(&self) -> &str {
        "Node"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn for_each_child_mut(&self, visit: &mut dyn FnMut(&mut Value)) {
        visit(&mut self.next.borrow_mut());
    }
}

fn node_transform() -> Arc<dyn Transform> {
    Arc::new(
        FnTransform::new("Node")
            .matching(|kind, v| kind == Kind::Custom && v.downcast_ref::<Node>().is_some())
            .reduce_with(|v| {
                let node = v
                    .downcast_ref::<Node>()
                    .ok_or_else(|| Error::custom("not a node"))?;
                Ok(Value::array(vec![
                    Value::from(node.label.as_str()),
                    node.next.borrow().clone(),
                ]))
            })
            .reconstruct_with(|d| {
                Ok(Value::custom(Node {
                    label: d.at(0).and_then(|l| l.as_str().map(String::from)).unwrap_or_default(),
                    next: RefCell::new(d.at(1).unwrap_or_default()),
                }))
            }),
    )
}

fn node_next(value: &Value) -> Value {
    value.downcast_ref::<Node>().unwrap().next.borrow().clone()
}

#[test]
fn test_custom_value_referencing_itself() {
    let node = Value::custom(Node {
        label: "head".into(),
        next: RefCell::new(Value::Null),
    });
    if let Some(n) = node.downcast_ref::<Node>() {
        *n.next.borrow_mut() = node.clone();
    }

    let mut replicator = Replicator::new();
    replicator.add_transforms(vec![node_transform()]).unwrap();

    let text = replicator.encode(&node).unwrap();
    assert_eq!(text, r#"[{"@t":"Node","@d":["head",{"@r":0}]}]"#);

    let back = replicator.decode(&text).unwrap();
    assert_eq!(back.downcast_ref::<Node>().unwrap().label, "head");
    let next = node_next(&back);
    assert!(matches!(next, Value::Custom(_)));
    assert!(next.same(&back));

    // break the cycle so the test does not leak
    *back.downcast_ref::<Node>().unwrap().next.borrow_mut() = Value::Null;
    *node.downcast_ref::<Node>().unwrap().next.borrow_mut() = Value::Null;
}

#[test]
fn test_custom_values_in_a_ring() {
    let a = Value::custom(Node { label: "a".into(), next: RefCell::new(Value::Null) });
    let b = Value::custom(Node { label: "b".into(), next: RefCell::new(a.clone()) });
    *a.downcast_ref::<Node>().unwrap().next.borrow_mut() = b.clone();
    let root = value!({ "start": a });

    let mut replicator = Replicator::new();
    replicator.add_transforms(vec![node_transform()]).unwrap();
    let back = replicator.decode(&replicator.encode(&root).unwrap()).unwrap();

    let a2 = back.get("start").unwrap();
    let b2 = node_next(&a2);
    assert_eq!(b2.downcast_ref::<Node>().unwrap().label, "b");
    assert!(node_next(&b2).same(&a2));

    *a.downcast_ref::<Node>().unwrap().next.borrow_mut() = Value::Null;
    *a2.downcast_ref::<Node>().unwrap().next.borrow_mut() = Value::Null;
}

#[test]
fn test_custom_value_without_transform_is_unsupported() {
    let node = Value::custom(Node { label: "x".into(), next: RefCell::new(Value::Null) });
    let err = to_string(&node).unwrap_err();
    assert!(matches!(err, Error::UnsupportedRuntimeType(Kind::Custom)));
}

#[test]
fn test_deeply_nested_graph_round_trip() {
    let root = Value::array(Vec::new());
    let mut tip = root.clone();
    for depth in 0..300 {
        let next = Value::array(vec![Value::from(depth)]);
        tip.push(next.clone());
        tip = next;
    }

    let text = to_string(&root).unwrap();
    assert_eq!(from_str(&text).unwrap(), root);
}
