use pretty_assertions::assert_eq;
use procflow_codec::{decode_snapshot, encode_snapshot, ArtifactEntry, InstanceSnapshot, SnapshotHeader};
use procflow_core::{decode_instance, CoreError, ProcessExecutionService};
use procflow_tests::{answer, form, registry, service};

fn path(service: &ProcessExecutionService, instance_id: &str) -> Vec<String> {
    service
        .resolve_path(instance_id)
        .unwrap()
        .into_iter()
        .map(|activity| activity.id.to_string())
        .collect()
}

#[test]
fn test_resolve_path_is_idempotent() {
    let service = service();
    let id = service.create_instance("fork-join", "idempotent", None).unwrap().id;
    service.save_artifact(id.as_str(), "p1", form("p1")).unwrap();

    let first = path(&service, id.as_str());
    let second = path(&service, id.as_str());
    assert_eq!(first, second);
    assert_eq!(first, vec!["f", "p1", "p2", "j"]);
}

#[test]
fn test_linear_path() {
    let service = service();
    let id = service.create_instance("linear", "linear", None).unwrap().id;
    service.commit_activity(id.as_str(), "a", form("a")).unwrap();

    assert_eq!(path(&service, id.as_str()), vec!["a", "b"]);
}

#[test]
fn test_conditional_branch_and_rollback() {
    let service = service();
    let id = service.create_instance("conditional", "branch", None).unwrap().id;
    let id = id.as_str();

    service.commit_activity(id, "c", answer(true)).unwrap();
    assert_eq!(service.get_instance(id).unwrap().current_activity_id.as_str(), "t");
    assert_eq!(path(&service, id), vec!["c", "t"]);

    let instance = service.save_artifact(id, "c", answer(false)).unwrap();
    assert_eq!(instance.current_activity_id.as_str(), "c");
    assert_eq!(path(&service, id), vec!["c"]);
}

#[test]
fn test_fork_join_readiness() {
    let service = service();
    let id = service.create_instance("fork-join", "parallel", None).unwrap().id;
    let id = id.as_str();
    assert_eq!(service.get_instance(id).unwrap().current_activity_id.as_str(), "j");

    service.save_artifact(id, "p1", form("p1")).unwrap();
    match service.next_activity(id) {
        Err(CoreError::ParallelPathsIncomplete { missing, .. }) => assert_eq!(missing, vec!["p2"]),
        other => panic!("Expected ParallelPathsIncomplete, got {:?}", other),
    }

    service.save_artifact(id, "p2", form("p2")).unwrap();
    assert_eq!(service.next_activity(id).unwrap().id.as_str(), "done");
}

#[test]
fn test_commit_ordering() {
    let service = service();
    let id = service.create_instance("linear", "ordering", None).unwrap().id;
    service.commit_activity(id.as_str(), "a", form("a")).unwrap();
    let before = service.artifacts(id.as_str()).unwrap();

    let err = service.commit_activity(id.as_str(), "a", form("a-again")).unwrap_err();
    assert!(matches!(err, CoreError::NotCurrent { .. }));
    assert_eq!(service.artifacts(id.as_str()).unwrap(), before);
}

#[test]
fn test_snapshot_round_trip() {
    let service = service();
    let id = service.create_instance("linear", "round-trip", None).unwrap().id;
    service
        .commit_activity(id.as_str(), "a", form("a").with_share("rack", "R-12"))
        .unwrap();
    service.save_artifact(id.as_str(), "b", form("b")).unwrap();

    let registry = registry();
    let graph = registry.get("linear").unwrap();
    let bytes = service.encode_instance(id.as_str()).unwrap();
    let restored = decode_instance(&graph, &bytes);

    assert!(restored.skipped.is_empty());
    assert_eq!(restored.artifacts, service.artifacts(id.as_str()).unwrap());
}

#[test]
fn test_malformed_entry_tolerance() {
    let service = service();
    let id = service.create_instance("linear", "tolerance", None).unwrap().id;
    service.commit_activity(id.as_str(), "a", form("a")).unwrap();
    service.save_artifact(id.as_str(), "b", form("b")).unwrap();
    let bytes = service.encode_instance(id.as_str()).unwrap();

    // Splice a third valid entry and one with an unreadable date into the snapshot
    let mut decoded = decode_snapshot(&bytes);
    decoded.entries.push(ArtifactEntry {
        artifact_definition_id: "done".to_string(),
        artifact: form("done"),
        interrupted: false,
    });
    let valid = encode_snapshot(&InstanceSnapshot {
        header: decoded.header.clone().unwrap_or_else(|| SnapshotHeader {
            instance_id: id.to_string(),
            process_definition_id: "linear".to_string(),
            current_activity_id: "b".to_string(),
        }),
        entries: decoded.entries,
    })
    .unwrap();
    let text = String::from_utf8(valid).unwrap();
    let corrupted = text.replacen(
        "<artifact ",
        "<artifact id=\"x\" name=\"x\" contentType=\"x\" artifactDefinitionId=\"b-form\" creationDate=\"yesterday\" commitDate=\"0\"><content/></artifact><artifact ",
        1,
    );

    let registry = registry();
    let graph = registry.get("linear").unwrap();
    let restored = decode_instance(&graph, corrupted.as_bytes());

    assert_eq!(restored.skipped.len(), 1);
    assert_eq!(restored.skipped[0].index, 0);
    assert_eq!(restored.artifacts.len(), 3);
    assert_eq!(restored.artifacts.get("b"), Some(&service.artifact_for_activity(id.as_str(), "b").unwrap()));
}
