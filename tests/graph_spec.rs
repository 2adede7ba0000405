use speculate2::speculate;
use taskloom::graph::{GraphError, TaskGraph};
use taskloom::models::{Item, RelationKind};

fn item(id: &str, title: &str) -> Item {
    Item::new(id, title)
}

fn chain() -> TaskGraph {
    // a requires b, b requires c: valid order is c, b, a.
    let mut graph = TaskGraph::new();
    graph.insert(item("a", "Ship it").with_relation(RelationKind::Requires, "b"));
    graph.insert(item("b", "Build it").with_relation(RelationKind::Requires, "c"));
    graph.insert(item("c", "Design it"));
    graph
}

speculate! {
    describe "topological_sort" {
        it "places every dependency before its dependents" {
            let graph = chain();
            let order: Vec<&str> = graph
                .topological_sort()
                .expect("chain is acyclic")
                .iter()
                .map(|i| i.id.as_str())
                .collect();

            let position = |id: &str| order.iter().position(|&o| o == id).expect("present");
            assert!(position("c") < position("b"));
            assert!(position("b") < position("a"));
        }

        it "treats ANYOF edges as dependencies too" {
            let mut graph = TaskGraph::new();
            graph.insert(item("goal", "Goal").with_relation(RelationKind::AnyOf, "option"));
            graph.insert(item("option", "Option"));

            let order: Vec<&str> = graph
                .topological_sort()
                .expect("acyclic")
                .iter()
                .map(|i| i.id.as_str())
                .collect();
            assert_eq!(order, vec!["option", "goal"]);
        }

        it "ignores SUPERCHARGES and other non-dependency relations" {
            let mut graph = TaskGraph::new();
            graph.insert(item("x", "X").with_relation(RelationKind::Supercharges, "y"));
            graph.insert(item("y", "Y").with_relation(RelationKind::Supercharges, "x"));
            assert!(graph.topological_sort().is_ok());
        }

        it "reports cycle members in cycle order" {
            let mut graph = chain();
            let c = graph.get("c").expect("c exists").clone();
            graph.insert(c.with_relation(RelationKind::Requires, "a"));

            let error = graph.topological_sort().expect_err("cycle should fail the sort");
            let GraphError::CycleDetected { members } = error else {
                panic!("expected CycleDetected, got {error:?}");
            };
            assert_eq!(members.len(), 3);
            for (i, id) in members.iter().enumerate() {
                let next = &members[(i + 1) % members.len()];
                assert!(
                    graph
                        .get(id)
                        .expect("member exists")
                        .relation_targets(RelationKind::Requires)
                        .contains(next),
                    "{id} should require {next}"
                );
            }
        }
    }

    describe "insert_between" {
        it "wires the new item into the chain" {
            let mut graph = chain();
            graph
                .insert_between(item("new", "Review it"), "a", "c")
                .expect("insert should succeed");

            assert!(graph
                .get("a")
                .expect("a exists")
                .relation_targets(RelationKind::Requires)
                .contains(&"new".to_string()));
            assert_eq!(
                graph.get("new").expect("new exists").relation_targets(RelationKind::Requires),
                ["c".to_string()]
            );
            assert!(graph.topological_sort().is_ok());
        }

        it "rejects wiring that would create a cycle and restores the graph" {
            let mut graph = chain();
            let before = graph.clone();

            // c -> new -> a would close the loop a -> b -> c -> new -> a.
            let error = graph
                .insert_between(item("new", "Loop"), "c", "a")
                .expect_err("cycle should be rejected");
            assert!(matches!(error, GraphError::CycleDetected { .. }));
            assert_eq!(graph, before, "rejected insert must leave the graph unchanged");
        }

        it "fails cleanly when an endpoint is missing" {
            let mut graph = chain();
            let error = graph
                .insert_between(item("new", "Dangling"), "a", "ghost")
                .expect_err("missing endpoint");
            assert_eq!(error, GraphError::NotFound { id: "ghost".to_string() });
            assert!(graph.get("new").is_none());
        }
    }

    describe "find" {
        it "matches ids and titles case-insensitively" {
            let graph = chain();
            assert_eq!(graph.find("ship").expect("matches title").id, "a");
            assert_eq!(graph.find("b").expect("matches id").id, "b");
        }

        it "returns the first match in map order" {
            let mut graph = TaskGraph::new();
            graph.insert(item("alpha_one", "One"));
            graph.insert(item("alpha_two", "Two"));
            assert_eq!(graph.find("alpha").expect("matches").id, "alpha_one");
        }

        it "reports not-found" {
            let graph = chain();
            assert_eq!(
                graph.find("nothing").expect_err("no match"),
                GraphError::NotFound { id: "nothing".to_string() }
            );
        }
    }

    describe "insert" {
        it "overwrites by id" {
            let mut graph = chain();
            graph.insert(item("a", "Ship it again"));
            assert_eq!(graph.len(), 3);
            assert_eq!(graph.get("a").expect("a exists").title, "Ship it again");
        }
    }

    describe "partitions" {
        it "splits active and occluded views" {
            let mut graph = chain();
            let b = graph.get("b").expect("b exists").clone();
            graph.insert(b.with_occlude(true));

            let active: Vec<&str> = graph.active().map(|i| i.id.as_str()).collect();
            let occluded: Vec<&str> = graph.occluded().map(|i| i.id.as_str()).collect();
            assert_eq!(active, vec!["a", "c"]);
            assert_eq!(occluded, vec!["b"]);
        }
    }
}
