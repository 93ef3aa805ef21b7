//! End-to-end tests: config file, file store, rewriter process and template
//! directory wired together through `component_graphs::init` / `open`.
#![cfg(unix)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use component_graphs::{ComponentId, GraphError, GraphId};
use tempfile::{tempdir, TempDir};

const LABELLER: &str = r#"
case "$2" in
  *service_id=*) printf '%s\n' "$2" ;;
  *bad*) echo "parse error near 'bad'" >&2; exit 1 ;;
  *) printf '%s{service_id="%s"}\n' "$2" "$4" ;;
esac
"#;

/// A workspace with graphs.toml, a rewriter script and a template directory.
fn workspace() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("rewrite.sh"), LABELLER).unwrap();

    let templates = dir.path().join("templates");
    fs::create_dir(&templates).unwrap();
    fs::write(
        templates.join("jvm.json"),
        r#"[
            {"title": "heap", "promql": "jvm_memory_bytes_used"},
            {"title": "broken", "promql": "bad("},
            {"title": "gc", "promql": "rate(jvm_gc_collection_seconds_sum[1m])"}
        ]"#,
    )
    .unwrap();

    let config = dir.path().join("graphs.toml");
    fs::write(
        &config,
        format!(
            r#"
[store]
root = "data"

[rewriter]
program = "/bin/sh"
args = ["{}"]
timeout_ms = 5000

[templates]
dir = "templates"
"#,
            dir.path().join("rewrite.sh").display()
        ),
    )
    .unwrap();

    (dir, config)
}

fn sequences(service: &component_graphs::FsGraphService, component: &ComponentId) -> Vec<u32> {
    service
        .list(component)
        .unwrap()
        .iter()
        .map(|g| g.sequence)
        .collect()
}

fn component_file(dir: &Path, component: &str) -> PathBuf {
    dir.join("data")
        .join("components")
        .join(format!("{component}.json"))
}

#[test]
fn catalog_survives_reopen() {
    let (dir, config) = workspace();
    let component = ComponentId::new("gr1a2b").unwrap();

    let service = component_graphs::init(&config).unwrap();
    let first = service.create(&component, "requests", "up").unwrap();
    let second = service.create(&component, "errors", "errors_total").unwrap();
    assert_eq!(first.query, r#"up{service_id="gr1a2b"}"#);
    service
        .update(&component, &second.graph_id, "errors", &second.query, Some(0))
        .unwrap();
    drop(service);

    let service = component_graphs::open(&config).unwrap();
    let graphs = service.list(&component).unwrap();
    let ids: Vec<&GraphId> = graphs.iter().map(|g| &g.graph_id).collect();
    assert_eq!(ids, vec![&second.graph_id, &first.graph_id]);
    assert_eq!(sequences(&service, &component), vec![0, 1]);
    assert!(component_file(dir.path(), "gr1a2b").exists());
}

#[test]
fn rejected_query_leaves_store_untouched() {
    let (dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let service = component_graphs::init(&config).unwrap();

    let err = service.create(&component, "broken", "bad(").unwrap_err();
    assert!(matches!(err, GraphError::InvalidQuery(_)));
    assert!(service.list(&component).unwrap().is_empty());
    assert!(!component_file(dir.path(), "gr1").exists());
}

#[test]
fn template_import_skips_rejected_definitions() {
    let (_dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let service = component_graphs::init(&config).unwrap();
    service.create(&component, "existing", "up").unwrap();

    assert_eq!(service.list_templates(), vec!["jvm"]);
    let imported = service.import_template(&component, "jvm").unwrap();

    let titles: Vec<&str> = imported.iter().map(|g| g.title.as_str()).collect();
    assert_eq!(titles, vec!["heap", "gc"]);
    assert_eq!(sequences(&service, &component), vec![0, 1, 2]);

    assert!(matches!(
        service.import_template(&component, "redis"),
        Err(GraphError::TemplateNotFound(_))
    ));
}

#[test]
fn concurrent_creates_get_distinct_contiguous_sequences() {
    let (_dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let service = component_graphs::init(&config).unwrap();

    thread::scope(|scope| {
        for worker in 0..4 {
            let service = &service;
            let component = &component;
            scope.spawn(move || {
                for n in 0..3 {
                    service
                        .create(component, &format!("w{worker}-{n}"), "up")
                        .unwrap();
                }
            });
        }
    });

    let graphs = service.list(&component).unwrap();
    assert_eq!(sequences(&service, &component), (0..12).collect::<Vec<u32>>());
    let ids: HashSet<&GraphId> = graphs.iter().map(|g| &g.graph_id).collect();
    assert_eq!(ids.len(), 12);
}

#[test]
fn concurrent_deletes_and_creates_stay_contiguous() {
    let (_dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let service = component_graphs::init(&config).unwrap();

    let seeded: Vec<GraphId> = (0..6)
        .map(|n| {
            service
                .create(&component, &format!("seed-{n}"), "up")
                .unwrap()
                .graph_id
        })
        .collect();

    thread::scope(|scope| {
        for chunk in seeded.chunks(2) {
            let service = &service;
            let component = &component;
            scope.spawn(move || {
                for graph_id in chunk {
                    service.delete(component, graph_id).unwrap();
                }
                service.create(component, "late", "up").unwrap();
            });
        }
    });

    assert_eq!(sequences(&service, &component), vec![0, 1, 2]);
}

#[test]
fn delete_by_component_is_scoped() {
    let (dir, config) = workspace();
    let kept = ComponentId::new("gr-kept").unwrap();
    let purged = ComponentId::new("gr-purged").unwrap();
    let service = component_graphs::init(&config).unwrap();

    service.create(&kept, "a", "up").unwrap();
    service.create(&purged, "a", "up").unwrap();
    service.create(&purged, "b", "up").unwrap();

    assert_eq!(service.delete_by_component(&purged).unwrap(), 2);
    assert!(service.list(&purged).unwrap().is_empty());
    assert_eq!(service.list(&kept).unwrap().len(), 1);
    assert!(!component_file(dir.path(), "gr-purged").exists());

    let index = fs::read_to_string(dir.path().join("data").join("index.json")).unwrap();
    let index: serde_json::Value = serde_json::from_str(&index).unwrap();
    assert!(index["components"].get("gr-purged").is_none());
    assert_eq!(index["components"]["gr-kept"]["graphs"], 1);
}

#[test]
fn services_sharing_a_root_do_not_lose_creates() {
    let (_dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let first = component_graphs::init(&config).unwrap();
    let second = component_graphs::open(&config).unwrap();

    thread::scope(|scope| {
        for service in [&first, &second] {
            let component = &component;
            scope.spawn(move || {
                for n in 0..3 {
                    service.create(component, &format!("g{n}"), "up").unwrap();
                }
            });
        }
    });

    assert_eq!(sequences(&first, &component), (0..6).collect::<Vec<u32>>());
    assert_eq!(second.list(&component).unwrap().len(), 6);
}

#[test]
fn failed_create_persists_nothing() {
    let (dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let service = component_graphs::init(&config).unwrap();
    fs::write(dir.path().join("data").join("index.json"), "not json").unwrap();

    let err = service.create(&component, "a", "up").unwrap_err();
    assert!(matches!(err, GraphError::Store(_)));
    assert!(service.list(&component).unwrap().is_empty());
    assert!(!component_file(dir.path(), "gr1").exists());
}

#[test]
fn deleted_graph_ids_are_not_reused() {
    let (dir, config) = workspace();
    let component = ComponentId::new("gr1").unwrap();
    let service = component_graphs::init(&config).unwrap();

    let graph = service.create(&component, "a", "up").unwrap();
    service.delete(&component, &graph.graph_id).unwrap();

    let index = fs::read_to_string(dir.path().join("data").join("index.json")).unwrap();
    let index: serde_json::Value = serde_json::from_str(&index).unwrap();
    let retired: Vec<&str> = index["ids"]["retired"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|id| id.as_str())
        .collect();
    assert_eq!(retired, vec![graph.graph_id.as_str()]);
}
