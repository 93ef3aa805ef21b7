//! Property-based tests for the sequence invariant.
//!
//! Random sequences of create / update / delete / bulk-import calls must
//! always leave each component's sequences exactly `0..n`.

use proptest::prelude::*;

use component_graphs::{
    ComponentId, GraphDefinition, GraphError, GraphService, MemoryStore, QueryRewriter,
    RewriteError, StaticTemplates,
};

/// Appends a component label; rejects queries containing "bad".
struct Labeller;

impl QueryRewriter for Labeller {
    fn rewrite(&self, component_id: &ComponentId, query: &str) -> Result<String, RewriteError> {
        if query.contains("bad") {
            return Err(RewriteError::Invalid(query.to_string()));
        }
        if query.contains("service_id=") {
            return Ok(query.to_string());
        }
        Ok(format!("{query}{{service_id=\"{component_id}\"}}"))
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create { component: usize, valid: bool },
    Import { component: usize, valid: Vec<bool> },
    Move { component: usize, pick: usize, to: usize },
    Delete { component: usize, pick: usize },
    Purge { component: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..2usize, any::<bool>()).prop_map(|(component, valid)| Op::Create { component, valid }),
        2 => (0..2usize, prop::collection::vec(any::<bool>(), 0..6))
            .prop_map(|(component, valid)| Op::Import { component, valid }),
        4 => (0..2usize, any::<usize>(), any::<usize>())
            .prop_map(|(component, pick, to)| Op::Move { component, pick, to }),
        3 => (0..2usize, any::<usize>()).prop_map(|(component, pick)| Op::Delete { component, pick }),
        1 => (0..2usize).prop_map(|component| Op::Purge { component }),
    ]
}

fn query(valid: bool) -> &'static str {
    if valid {
        "up"
    } else {
        "bad("
    }
}

type Service = GraphService<MemoryStore, Labeller, StaticTemplates>;

fn apply(service: &Service, components: &[ComponentId], op: &Op) {
    match op {
        Op::Create { component, valid } => {
            let result = service.create(&components[*component], "g", query(*valid));
            assert_eq!(result.is_ok(), *valid);
        }
        Op::Import { component, valid } => {
            let definitions: Vec<GraphDefinition> = valid
                .iter()
                .map(|v| GraphDefinition::new("g", query(*v)))
                .collect();
            let before = service.list(&components[*component]).unwrap().len() as u32;
            let imported = service
                .bulk_import(&components[*component], &definitions)
                .unwrap();
            let expected: Vec<u32> = (before..before + imported.len() as u32).collect();
            let got: Vec<u32> = imported.iter().map(|g| g.sequence).collect();
            assert_eq!(got, expected);
            assert_eq!(imported.len(), valid.iter().filter(|v| **v).count());
        }
        Op::Move {
            component,
            pick,
            to,
        } => {
            let graphs = service.list(&components[*component]).unwrap();
            if graphs.is_empty() {
                return;
            }
            let target = &graphs[pick % graphs.len()];
            let to = (to % graphs.len()) as u32;
            let moved = service
                .update(
                    &components[*component],
                    &target.graph_id,
                    &target.title,
                    &target.query,
                    Some(to),
                )
                .unwrap();
            assert_eq!(moved.sequence, to);

            // everyone else keeps their relative order
            let before: Vec<_> = graphs
                .iter()
                .filter(|g| g.graph_id != target.graph_id)
                .map(|g| g.graph_id.clone())
                .collect();
            let after: Vec<_> = service
                .list(&components[*component])
                .unwrap()
                .into_iter()
                .filter(|g| g.graph_id != target.graph_id)
                .map(|g| g.graph_id)
                .collect();
            assert_eq!(before, after);
        }
        Op::Delete { component, pick } => {
            let graphs = service.list(&components[*component]).unwrap();
            if graphs.is_empty() {
                return;
            }
            let target = &graphs[pick % graphs.len()];
            service
                .delete(&components[*component], &target.graph_id)
                .unwrap();
        }
        Op::Purge { component } => {
            service.delete_by_component(&components[*component]).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn sequences_stay_contiguous(ops in prop::collection::vec(op(), 1..40)) {
        let service = GraphService::new(MemoryStore::new(), Labeller, StaticTemplates::new());
        let components = [
            ComponentId::new("gr-a").unwrap(),
            ComponentId::new("gr-b").unwrap(),
        ];

        for op in &ops {
            apply(&service, &components, op);
            for component in &components {
                let sequences: Vec<u32> = service
                    .list(component)
                    .unwrap()
                    .iter()
                    .map(|g| g.sequence)
                    .collect();
                let expected: Vec<u32> = (0..sequences.len() as u32).collect();
                prop_assert_eq!(sequences, expected);
            }
        }
    }

    #[test]
    fn out_of_range_moves_are_rejected(count in 1..6usize, extra in 0..4u32) {
        let service = GraphService::new(MemoryStore::new(), Labeller, StaticTemplates::new());
        let component = ComponentId::new("gr-a").unwrap();
        let graphs: Vec<_> = (0..count)
            .map(|_| service.create(&component, "g", "up").unwrap())
            .collect();

        let requested = count as u32 + extra;
        let err = service
            .update(&component, &graphs[0].graph_id, "g", "up", Some(requested))
            .unwrap_err();
        let is_invalid_sequence = matches!(err, GraphError::InvalidSequence { .. });
        prop_assert!(is_invalid_sequence);
        prop_assert_eq!(service.list(&component).unwrap(), graphs);
    }
}
