use speculate2::speculate;
use taskloom::graph::TaskGraph;
use taskloom::models::{Item, Priority, RelationKind, Status};
use taskloom::sync::{
    add_to_set, creation_ops, migrate_graph, remove_from_set, FieldValue, FlowClient,
    ObservedAdds, Operation,
};
use uuid::Uuid;

fn op_id(op: &Operation) -> Uuid {
    match op {
        Operation::AddToSet { op_id, .. } => *op_id,
        other => panic!("expected AddToSet, got {other:?}"),
    }
}

speculate! {
    describe "wire format" {
        it "serializes each variant as a single-key object" {
            let op = Operation::AddItem { item_id: "learn_rust".to_string() };
            let json: serde_json::Value =
                serde_json::from_str(&serde_json::to_string(&op).expect("serialize"))
                    .expect("valid json");
            assert_eq!(json["AddItem"]["item_id"], "learn_rust");
        }

        it "tags scalar values" {
            let op = Operation::SetField {
                item_id: "a".to_string(),
                field: "occlude".to_string(),
                value: FieldValue::Bool(true),
            };
            let json = serde_json::to_value(&op).expect("serialize");
            assert_eq!(json["SetField"]["value"]["Bool"], true);

            let null = serde_json::to_value(FieldValue::null()).expect("serialize");
            assert_eq!(null, serde_json::json!({"Null": null}));

            let string = serde_json::to_value(FieldValue::from("hi")).expect("serialize");
            assert_eq!(string, serde_json::json!({"String": "hi"}));
        }

        it "round-trips through JSON" {
            let op = remove_from_set("a", "tags", "x".into(), &ObservedAdds::default());
            let json = serde_json::to_string(&op).expect("serialize");
            let back: Operation = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, op);
        }
    }

    describe "creation_ops" {
        it "emits AddItem, one SetField per scalar, one AddToSet per element" {
            let item = Item::new("learn_rust", "Learn Rust")
                .with_status(Status::InProgress)
                .with_priority(Priority::High)
                .with_charts(vec!["Programming".to_string()])
                .with_tags(vec!["deep".to_string(), "evening".to_string()])
                .with_relation(RelationKind::Requires, "install_toolchain");

            let ops = creation_ops(&item);

            assert_eq!(
                ops[0],
                Operation::AddItem { item_id: "learn_rust".to_string() }
            );
            let set_fields: Vec<&str> = ops
                .iter()
                .filter_map(|op| match op {
                    Operation::SetField { field, .. } => Some(field.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(
                set_fields,
                vec![
                    "title",
                    "status",
                    "priority",
                    "duration",
                    "user_comment",
                    "auto_comment",
                    "occlude"
                ]
            );

            let adds: Vec<(&str, &FieldValue)> = ops
                .iter()
                .filter_map(|op| match op {
                    Operation::AddToSet { set_name, element, .. } => {
                        Some((set_name.as_str(), element))
                    }
                    _ => None,
                })
                .collect();
            assert_eq!(adds.len(), 4);
            assert!(adds.contains(&("charts", &"Programming".into())));
            assert!(adds.contains(&("tags", &"deep".into())));
            assert!(adds.contains(&("relations/REQUIRES", &"install_toolchain".into())));
        }

        it "encodes status and priority as their canonical names" {
            let ops = creation_ops(&Item::new("a", "A").with_status(Status::Blocked));
            let status = ops.iter().find_map(|op| match op {
                Operation::SetField { field, value, .. } if field == "status" => Some(value),
                _ => None,
            });
            assert_eq!(status, Some(&FieldValue::String("blocked".to_string())));
        }
    }

    describe "informed remove" {
        it "suppresses only the observed addition" {
            let add_one = add_to_set("x", "tags", "a".into());
            let observed = ObservedAdds::from_operations(&[add_one.clone()]);
            let remove = remove_from_set("x", "tags", "a".into(), &observed);

            // A concurrent add the remover never saw.
            let add_two = add_to_set("x", "tags", "a".into());

            let merged = ObservedAdds::from_operations(&[add_one, add_two.clone(), remove]);
            let surviving = merged.observed("x", "tags", &"a".into());
            assert_eq!(surviving, [op_id(&add_two)], "the unobserved add must survive");
            assert!(merged.contains("x", "tags", &"a".into()));
        }

        it "removes the element entirely when every add was observed" {
            let add = add_to_set("x", "tags", "a".into());
            let observed = ObservedAdds::from_operations(&[add.clone()]);
            let remove = remove_from_set("x", "tags", "a".into(), &observed);

            let merged = ObservedAdds::from_operations(&[add, remove]);
            assert!(!merged.contains("x", "tags", &"a".into()));
        }

        it "scopes removal to the element, not the whole set" {
            let add_a = add_to_set("x", "tags", "a".into());
            let add_b = add_to_set("x", "tags", "b".into());
            let observed = ObservedAdds::from_operations(&[add_a.clone(), add_b.clone()]);
            let remove_a = remove_from_set("x", "tags", "a".into(), &observed);

            let merged = ObservedAdds::from_operations(&[add_a, add_b, remove_a]);
            assert!(!merged.contains("x", "tags", &"a".into()));
            assert!(merged.contains("x", "tags", &"b".into()));
        }

        it "forgets an item's sets when the item is removed" {
            let add = add_to_set("x", "tags", "a".into());
            let merged = ObservedAdds::from_operations(&[
                add,
                Operation::RemoveItem { item_id: "x".to_string() },
            ]);
            assert!(!merged.contains("x", "tags", &"a".into()));
        }
    }

    describe "migrate_graph" {
        it "creates targets before the items that reference them" {
            let mut graph = TaskGraph::new();
            graph.insert(Item::new("zz_top", "Depends").with_relation(RelationKind::Requires, "aa_base"));
            graph.insert(Item::new("aa_base", "Base"));

            let ops = migrate_graph(&graph).expect("acyclic");
            let adds: Vec<&str> = ops
                .iter()
                .filter_map(|op| match op {
                    Operation::AddItem { item_id } => Some(item_id.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(adds, vec!["aa_base", "zz_top"]);
        }

        it "refuses to migrate a cyclic graph" {
            let mut graph = TaskGraph::new();
            graph.insert(Item::new("a", "A").with_relation(RelationKind::Requires, "b"));
            graph.insert(Item::new("b", "B").with_relation(RelationKind::Requires, "a"));
            assert!(migrate_graph(&graph).is_err());
        }
    }

    describe "JsonlFlowClient" {
        it "appends one operation per line" {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("operations.jsonl");
            let mut client = taskloom::sync::JsonlFlowClient::new(&path);

            client
                .append(&[Operation::AddItem { item_id: "a".to_string() }])
                .expect("first append");
            client
                .append(&[Operation::RemoveItem { item_id: "a".to_string() }])
                .expect("second append");

            let text = std::fs::read_to_string(&path).expect("read");
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), 2);
            let first: Operation = serde_json::from_str(lines[0]).expect("parse");
            assert_eq!(first, Operation::AddItem { item_id: "a".to_string() });
        }
    }
}
