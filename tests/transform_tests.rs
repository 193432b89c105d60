use chrono::{TimeZone, Utc};
use replicator::builtins::tags;
use replicator::{
    from_str, to_string, value, Capabilities, ElementKind, ErrorObject, ErrorTransform, Pattern,
    Replicator, ReplicatorOptions, TypedArray, Value, ValueMap, ValueSet,
};

fn round_trip(value: &Value) -> Value {
    let text = to_string(value).unwrap();
    println!("Encoded: {}", text);
    from_str(&text).unwrap()
}

fn degraded() -> Replicator {
    Replicator::with_options(ReplicatorOptions::new().with_capabilities(Capabilities::none()))
}

#[test]
fn test_date() {
    let instant = Utc.with_ymd_and_hms(2016, 4, 1, 12, 30, 0).single().unwrap();
    let text = to_string(&Value::date(instant)).unwrap();
    assert_eq!(text, r#"[{"@t":"[[Date]]","@d":1459513800000}]"#);

    match from_str(&text).unwrap() {
        Value::Date(back) => assert_eq!(*back.borrow(), instant),
        other => panic!("Expected date, got {:?}", other),
    }
}

#[test]
fn test_date_before_epoch() {
    let instant = Utc.timestamp_millis_opt(-86_400_001).single().unwrap();
    assert_eq!(round_trip(&Value::date(instant)), Value::date(instant));
}

#[test]
fn test_regexp() {
    let pattern = Pattern::parse(r"^\d+-[a-z]$", "gim").unwrap();
    let text = to_string(&Value::regexp(pattern)).unwrap();
    assert_eq!(
        text,
        r#"[{"@t":"[[RegExp]]","@d":{"source":"^\\d+-[a-z]$","flags":"gim"}}]"#
    );

    match from_str(&text).unwrap() {
        Value::RegExp(back) => {
            let back = back.borrow();
            assert_eq!(back.source(), r"^\d+-[a-z]$");
            assert!(back.flags().global && back.flags().ignore_case && back.flags().multiline);
            assert!(back.is_match("12-X"));
        }
        other => panic!("Expected regexp, got {:?}", other),
    }
}

#[test]
fn test_regexp_bad_flags_rejected() {
    let text = r#"[{"@t":"[[RegExp]]","@d":{"source":"a","flags":"q"}}]"#;
    assert!(matches!(
        from_str(text),
        Err(replicator::Error::Reconstruct { tag, .. }) if tag == tags::REGEXP
    ));
}

#[test]
fn test_errors_keep_name_message_and_stack() {
    let err = ErrorObject::named("RangeError", "out of range").with_stack("at f (x.js:1:1)");
    let back = round_trip(&Value::error(err.clone()));
    match back {
        Value::Error(back) => assert_eq!(*back.borrow(), err),
        other => panic!("Expected error, got {:?}", other),
    }
}

#[test]
fn test_error_with_custom_constructor() {
    let mut replicator = Replicator::new();
    replicator.remove_transform(tags::ERROR);
    replicator
        .add_transform(ErrorTransform::standard().with_constructor("HttpError", |message| {
            ErrorObject::named("HttpError", format!("[http] {}", message))
        }))
        .unwrap();

    let text = replicator
        .encode(&Value::error(ErrorObject::named("HttpError", "404")))
        .unwrap();
    match replicator.decode(&text).unwrap() {
        Value::Error(back) => {
            assert_eq!(back.borrow().name, "HttpError");
            assert_eq!(back.borrow().message, "[http] 404");
        }
        other => panic!("Expected error, got {:?}", other),
    }
}

#[test]
fn test_buffer() {
    let bytes = vec![0u8, 1, 127, 128, 255];
    let text = to_string(&Value::buffer(bytes.clone())).unwrap();
    assert_eq!(text, r#"[{"@t":"[[ArrayBuffer]]","@d":[0,1,127,128,255]}]"#);

    match from_str(&text).unwrap() {
        Value::Buffer(back) => assert_eq!(*back.borrow(), bytes),
        other => panic!("Expected buffer, got {:?}", other),
    }
}

#[test]
fn test_typed_arrays_of_every_kind() {
    for kind in ElementKind::ALL {
        let array = TypedArray::from_f64s(kind, &[1.0, 2.0, 100.0]);
        let back = round_trip(&Value::typed_array(array.clone()));
        match back {
            Value::TypedArray(back) => {
                assert_eq!(back.borrow().kind(), kind);
                assert!(back.borrow().same_elements(&array), "{} mismatch", kind);
            }
            other => panic!("Expected {}, got {:?}", kind, other),
        }
    }
}

#[test]
fn test_typed_array_wire_shape() {
    let array = TypedArray::from_f64s(ElementKind::Int16, &[-1.0, 300.0]);
    assert_eq!(
        to_string(&Value::typed_array(array)).unwrap(),
        r#"[{"@t":"[[TypedArray]]","@d":{"kind":"Int16Array","values":[-1,300]}}]"#
    );
}

#[test]
fn test_typed_array_hostile_kind_degrades() {
    // A crafted kind name is never resolved to anything outside the element kinds.
    for kind in ["setTimeout", "Function", "constructor", "__proto__", ""] {
        let text = format!(
            r#"[{{"@t":"[[TypedArray]]","@d":{{"kind":"{}","values":["alert(1)",2]}}}}]"#,
            kind
        );
        let back = from_str(&text).unwrap();
        assert_eq!(back, value!(["alert(1)", 2]));
    }
}

#[test]
fn test_map_preserves_order_and_value_keys() {
    let key = value!({ "id": 1 });
    let mut map = ValueMap::new();
    map.insert(Value::from("b"), Value::from(2));
    map.insert(key.clone(), Value::from("object key"));
    map.insert(Value::from(1), Value::nan());
    let map = Value::map(map);

    let text = to_string(&map).unwrap();
    assert_eq!(
        text,
        r#"[{"@t":"[[Map]]","@d":["b",2,{"id":1},"object key",1,{"@t":"[[NaN]]","@d":""}]}]"#
    );

    let back = from_str(&text).unwrap();
    assert_eq!(back, map);
    match back {
        Value::Map(back) => {
            let back = back.borrow();
            let keys: Vec<Value> = back.keys().cloned().collect();
            assert_eq!(keys, vec![Value::from("b"), key, Value::from(1)]);
            assert!(back.get(&Value::from(1)).unwrap().is_nan());
        }
        other => panic!("Expected map, got {:?}", other),
    }
}

#[test]
fn test_set() {
    let set: ValueSet = vec![Value::from(1), Value::from("two"), Value::nan()]
        .into_iter()
        .collect();
    let set = Value::set(set);

    let back = round_trip(&set);
    assert_eq!(back, set);
    match back {
        Value::Set(back) => {
            assert_eq!(back.borrow().len(), 3);
            assert!(back.borrow().contains(&Value::nan()));
        }
        other => panic!("Expected set, got {:?}", other),
    }
}

#[test]
fn test_map_containing_itself() {
    let map = Value::map(ValueMap::new());
    if let Value::Map(handle) = &map {
        handle.borrow_mut().insert(Value::from("me"), map.clone());
    }

    let text = to_string(&map).unwrap();
    assert_eq!(text, r#"[{"@t":"[[Map]]","@d":["me",{"@r":0}]}]"#);

    let back = from_str(&text).unwrap();
    match &back {
        Value::Map(handle) => {
            let inner = handle.borrow().get(&Value::from("me")).cloned().unwrap();
            assert!(inner.same(&back));
            assert!(matches!(inner, Value::Map(_)));
        }
        other => panic!("Expected map, got {:?}", other),
    }
}

#[test]
fn test_map_keyed_by_itself() {
    let map = Value::map(ValueMap::new());
    if let Value::Map(handle) = &map {
        handle.borrow_mut().insert(map.clone(), Value::from(1));
    }

    let text = to_string(&map).unwrap();
    assert_eq!(text, r#"[{"@t":"[[Map]]","@d":[{"@r":0},1]}]"#);

    let back = from_str(&text).unwrap();
    match &back {
        Value::Map(handle) => {
            let handle = handle.borrow();
            assert_eq!(handle.len(), 1);
            assert_eq!(handle.get(&back), Some(&Value::from(1)));
            assert!(handle.keys().all(|key| key.same(&back)));
        }
        other => panic!("Expected map, got {:?}", other),
    }
}

#[test]
fn test_set_containing_itself() {
    let set = Value::set(ValueSet::new());
    if let Value::Set(handle) = &set {
        let mut handle = handle.borrow_mut();
        handle.insert(Value::from("first"));
        handle.insert(set.clone());
    }

    let text = to_string(&set).unwrap();
    assert_eq!(text, r#"[{"@t":"[[Set]]","@d":["first",{"@r":0}]}]"#);

    let back = from_str(&text).unwrap();
    match &back {
        Value::Set(handle) => {
            let members: Vec<Value> = handle.borrow().iter().cloned().collect();
            assert_eq!(members.len(), 2);
            assert_eq!(members[0], Value::from("first"));
            assert!(members[1].same(&back));
            assert!(handle.borrow().contains(&back));
        }
        other => panic!("Expected set, got {:?}", other),
    }
}

#[test]
fn test_large_set_round_trip() {
    let set: ValueSet = (0..20_000).map(Value::from).collect();
    let back = from_str(&to_string(&Value::set(set)).unwrap()).unwrap();
    match &back {
        Value::Set(handle) => {
            let handle = handle.borrow();
            assert_eq!(handle.len(), 20_000);
            assert!(handle.contains(&Value::from(19_999)));
            assert!(handle.contains(&Value::from(42.0)));
        }
        other => panic!("Expected set, got {:?}", other),
    }
}

#[test]
fn test_shared_date_keeps_identity() {
    let instant = Utc.timestamp_millis_opt(0).single().unwrap();
    let date = Value::date(instant);
    let root = value!([date, date]);

    let text = to_string(&root).unwrap();
    assert_eq!(
        text,
        r#"[[{"@r":1},{"@r":1}],{"@t":"[[Date]]","@d":0}]"#
    );
    let back = from_str(&text).unwrap();
    assert!(back.at(0).unwrap().same(&back.at(1).unwrap()));
}

#[test]
fn test_capabilities_off_degrade_to_arrays() {
    let replicator = Replicator::new();
    let mut map = ValueMap::new();
    map.insert(Value::from("k"), Value::from("v"));
    let root = value!({ "bytes": undefined, "map": undefined, "set": undefined, "typed": undefined });
    root.insert("bytes", Value::buffer(vec![1, 2]));
    root.insert("map", Value::map(map));
    root.insert("set", Value::set(vec![Value::from(1)].into_iter().collect()));
    root.insert(
        "typed",
        Value::typed_array(TypedArray::from_f64s(ElementKind::Float32, &[0.5])),
    );

    let text = replicator.encode(&root).unwrap();
    let back = degraded().decode(&text).unwrap();
    assert_eq!(
        back,
        value!({
            "bytes": [1, 2],
            "map": [["k", "v"]],
            "set": [1],
            "typed": [0.5]
        })
    );
}

#[test]
fn test_builtins_can_be_skipped() {
    let bare = Replicator::with_options(ReplicatorOptions::new().without_builtins());
    let text = bare.encode(&value!([undefined, 1])).unwrap();
    assert_eq!(text, "[[null,1]]");

    let err = bare.encode(&Value::date(Utc::now())).unwrap_err();
    assert!(matches!(err, replicator::Error::UnsupportedRuntimeType(_)));
}
