use std::fs;

use chrono::{TimeZone, Utc};
use speculate2::speculate;
use taskloom::models::{Item, LogEntry, RelationKind};
use taskloom::storage::{
    AtomicWriter, BackupManager, Repository, StorageError, Workspace,
};
use taskloom::graph::TaskGraph;

fn graph_fixture() -> TaskGraph {
    let mut graph = TaskGraph::new();
    graph.insert(Item::new("design", "Design the thing"));
    graph.insert(
        Item::new("build", "Build the thing").with_relation(RelationKind::Requires, "design"),
    );
    graph.insert(Item::new("old_idea", "Shelved idea").with_occlude(true));
    graph
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(dir.path());
        let repo = Repository::open(workspace.clone());
    }

    describe "repository" {
        it "loads an untouched workspace as empty" {
            let graph = repo.load().expect("load");
            assert!(graph.is_empty());
        }

        it "round-trips the graph across both partitions" {
            repo.save(&graph_fixture()).expect("save");

            let loaded = repo.load().expect("load");
            assert_eq!(loaded.len(), 3);
            assert!(!loaded.get("design").expect("design").occlude);
            assert!(loaded.get("old_idea").expect("old_idea").occlude);

            let active_text = fs::read_to_string(workspace.items_file()).expect("read active");
            assert!(!active_text.contains("old_idea"));
            let occluded_text =
                fs::read_to_string(workspace.occluded_items_file()).expect("read occluded");
            assert!(occluded_text.contains("old_idea"));
        }

        it "writes requirements before their dependents" {
            repo.save(&graph_fixture()).expect("save");
            let text = fs::read_to_string(workspace.items_file()).expect("read");
            let design = text.find("design").expect("design present");
            let build = text.find("\u{25cb} build").expect("build present");
            assert!(design < build, "dependency should come first:\n{text}");
        }

        it "refuses to save a cyclic graph and leaves the files alone" {
            repo.save(&graph_fixture()).expect("save");
            let before = fs::read_to_string(workspace.items_file()).expect("read");

            let mut graph = repo.load().expect("load");
            let design = graph.get("design").expect("design").clone();
            graph.insert(design.with_relation(RelationKind::Requires, "build"));

            let error = repo.save(&graph).expect_err("cycle should fail the save");
            assert!(matches!(error, StorageError::Unsaveable(_)));
            assert_eq!(
                fs::read_to_string(workspace.items_file()).expect("read"),
                before
            );
        }

        describe "includes" {
            it "merges included files before the file's own items" {
                fs::create_dir_all(dir.path().join("extra")).expect("mkdir");
                fs::write(
                    dir.path().join("extra/more.txt"),
                    "○ shared \"From include\" {}\n○ own_item \"Included version\" {}\n",
                )
                .expect("write include");
                fs::write(
                    workspace.items_file(),
                    "# workspace file\n#include extra/more.txt\n○ own_item \"Own version\" {}\n",
                )
                .expect("write items");

                let graph = repo.load().expect("load");
                assert_eq!(graph.len(), 2);
                assert_eq!(graph.get("shared").expect("shared").title, "From include");
                assert_eq!(
                    graph.get("own_item").expect("own_item").title,
                    "Own version",
                    "the including file should win on id collisions"
                );
            }

            it "stops recognizing directives after the first item line" {
                fs::write(
                    workspace.items_file(),
                    "○ first \"First\" {}\n#include extra/missing.txt\n",
                )
                .expect("write items");

                // The directive after an item line is an ordinary comment,
                // so the missing file is never resolved.
                let graph = repo.load().expect("load");
                assert_eq!(graph.len(), 1);
            }

            it "reports a circular include" {
                fs::write(
                    workspace.items_file(),
                    format!("#include {}\n", dir.path().join("a.txt").display()),
                )
                .expect("write items");
                fs::write(
                    dir.path().join("a.txt"),
                    format!("#include {}\n", dir.path().join("b.txt").display()),
                )
                .expect("write a");
                fs::write(
                    dir.path().join("b.txt"),
                    format!("#include {}\n", dir.path().join("a.txt").display()),
                )
                .expect("write b");

                let error = repo.load().expect_err("cycle should surface");
                assert!(matches!(error, StorageError::CircularInclude { .. }));
            }

            it "errors on a missing included file" {
                fs::write(workspace.items_file(), "#include nowhere.txt\n").expect("write");
                let error = repo.load().expect_err("missing include");
                assert!(matches!(error, StorageError::NotFound { .. }));
            }
        }
    }

    describe "atomic writer" {
        it "rolls everything back when one target cannot be written" {
            let writer = AtomicWriter::default();
            let one = dir.path().join("one.txt");
            let two = dir.path().join("two.txt");
            let three = dir.path().join("three.txt");
            fs::write(&one, "old one").expect("seed one");
            fs::create_dir(&two).expect("a directory where a file should go");
            fs::write(&three, "old three").expect("seed three");

            let result = writer.write_files(&[
                (one.clone(), "new one".to_string()),
                (two.clone(), "new two".to_string()),
                (three.clone(), "new three".to_string()),
            ]);
            assert!(result.is_err(), "writing over a directory should fail");

            assert_eq!(fs::read_to_string(&one).expect("read one"), "old one");
            assert_eq!(fs::read_to_string(&three).expect("read three"), "old three");

            let strays: Vec<String> = fs::read_dir(dir.path())
                .expect("scan")
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".tmp"))
                .collect();
            assert!(strays.is_empty(), "stray temp files: {strays:?}");
        }

        it "keeps exactly the retention count of backups, newest numbers" {
            let writer = AtomicWriter::new(BackupManager::new(3));
            let path = dir.path().join("items.txt");
            for version in 1..=5 {
                writer
                    .write_file(&path, &format!("version {version}"))
                    .expect("write");
            }

            let backups = BackupManager::all_backups(&path);
            let numbers: Vec<u32> = backups.iter().map(|(n, _)| *n).collect();
            assert_eq!(numbers, vec![2, 3, 4], "oldest pruned, contiguous to the highest used");
            assert_eq!(
                fs::read_to_string(&backups.last().expect("newest").1).expect("read"),
                "version 4"
            );
        }

        it "does not accumulate backups for no-op saves" {
            let writer = AtomicWriter::default();
            let path = dir.path().join("items.txt");
            writer.write_file(&path, "same content").expect("first write");
            writer.write_file(&path, "same content").expect("second write");
            writer.write_file(&path, "same content").expect("third write");

            assert!(BackupManager::all_backups(&path).is_empty());
        }
    }

    describe "log persistence" {
        it "round-trips both partitions" {
            let mut book = taskloom::logbook::LogBook::new();
            let noon = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
            book.insert(LogEntry::new("sprint", noon, "started the build"));
            book.insert(
                LogEntry::new("old_sprint", noon, "archived note").with_occlude(true),
            );
            repo.save_logs(&book).expect("save");

            let loaded = repo.load_logs().expect("load");
            assert_eq!(loaded.len(), 2);
            assert_eq!(loaded.active().count(), 1);
            assert_eq!(loaded.occluded().count(), 1);
        }

        it "skips malformed log lines with a warning" {
            fs::write(
                workspace.logs_file(),
                "{\"s\":\"sprint\",\"t\":\"2026-08-01T12:00:00Z\",\"m\":\"good line\"}\n\
                 {\"missing\":\"required keys\"}\n\
                 not json at all\n",
            )
            .expect("write logs");

            let loaded = repo.load_logs().expect("load");
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded.entries()[0].message, "good line");
        }
    }

    describe "workspace detection" {
        it "recognizes a workspace by its four files" {
            assert!(!workspace.is_present());
            repo.save(&graph_fixture()).expect("save items");
            repo.save_logs(&taskloom::logbook::LogBook::new()).expect("save logs");
            assert!(workspace.is_present());
        }
    }
}
