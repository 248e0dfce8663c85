use procflow_dsl::{
    error_codes, parse_and_validate_process_definition, ActivityKind, DslError, SequenceFlow,
};

#[test]
fn test_parse_and_validate_full_process() {
    let dsl_string = r#"
    dsl_version: "1.0"
    process:
      name: site-provisioning
      description: "Survey a site, install equipment in parallel, then sign off"
      version: "3"
      start_activity: start
      actors:
        - id: surveyor
          name: Field surveyor
          kind: role
        - id: installer
          name: Installer
      activities:
        - id: start
          kind: start
          next: survey
        - id: survey
          kind: normal
          name: Site survey
          actor: surveyor
          idling: true
          next: feasible
          artifact:
            id: survey-form
            type: form
            definition: "<form><field name='site'/></form>"
            preconditions: "true"
        - id: feasible
          kind: conditional
          name: Is the site feasible?
          confirm: true
          next_if_true: install
          next_if_false: done
          artifact:
            id: feasible-answer
            type: conditional
          information_artifact:
            id: feasibility-notes
            type: attachment
        - id: install
          kind: parallel
          sequence_flow: fork
          paths: [power, rack]
          incoming_sequence_flow_id: installed
        - id: power
          kind: normal
          actor: installer
          next: installed
          artifact: { id: power-form, type: form }
        - id: rack
          kind: normal
          actor: installer
          next: installed
          artifact: { id: rack-form, type: form, printable_template: rack-sheet }
        - id: installed
          kind: parallel
          sequence_flow: join
          paths: [signoff]
          outgoing_sequence_flow_id: install
        - id: signoff
          kind: normal
          next: done
          artifact: { id: signoff-form, type: form }
        - id: done
          kind: end
      metadata:
        owner: network-ops
    "#;

    let document = parse_and_validate_process_definition(dsl_string)
        .unwrap_or_else(|err| panic!("Expected valid document, got {}", err));

    let process = &document.process;
    assert_eq!(process.name, "site-provisioning");
    assert_eq!(process.version.as_deref(), Some("3"));
    assert_eq!(process.activities.len(), 9);
    assert_eq!(process.start_activity_id(), Some("start"));

    let feasible = process.activity("feasible").unwrap();
    assert_eq!(feasible.kind, ActivityKind::Conditional);
    assert!(feasible.confirm);
    assert_eq!(
        feasible.information_artifact.as_ref().map(|a| a.artifact_type.as_str()),
        Some("attachment")
    );

    let join = process.activity("installed").unwrap();
    assert_eq!(join.sequence_flow, Some(SequenceFlow::Join));
    assert!(join.is_join());
    assert_eq!(join.successor_ids(), vec!["signoff"]);

    let rack = process.activity("rack").unwrap();
    assert_eq!(
        rack.artifact.as_ref().and_then(|a| a.printable_template.as_deref()),
        Some("rack-sheet")
    );
    assert_eq!(process.metadata["owner"], serde_json::json!("network-ops"));
}

#[test]
fn test_invalid_reference_in_fork_paths() {
    let dsl_string = r#"
    dsl_version: "1.0"
    process:
      name: broken-fork
      activities:
        - { id: start, kind: start, next: fork }
        - { id: fork, kind: parallel, sequence_flow: fork, paths: [a, missing-branch] }
        - { id: a, kind: normal, next: done }
        - { id: done, kind: end }
    "#;

    let err = parse_and_validate_process_definition(dsl_string).unwrap_err();
    assert_eq!(err.error_code(), error_codes::INVALID_REFERENCE);
    match err {
        DslError::ValidationError(validation) => {
            assert_eq!(validation.path.as_deref(), Some("process.activities[1].paths[1]"));
            assert!(validation.message.contains("missing-branch"));
        }
        other => panic!("Expected single validation error, got {:?}", other),
    }
}

#[test]
fn test_unsupported_version_is_not_validated() {
    let dsl_string = r#"
    dsl_version: "0.9"
    process:
      name: old
    "#;

    let err = parse_and_validate_process_definition(dsl_string).unwrap_err();
    assert_eq!(err.error_code(), "ERR_DSL_UNSUPPORTED_VERSION");
}

#[test]
fn test_error_display_lists_every_issue() {
    let dsl_string = r#"
    dsl_version: "1.0"
    process:
      name: many-problems
      activities:
        - { id: start, kind: start }
        - { id: c, kind: conditional, next_if_true: done }
    "#;

    let err = parse_and_validate_process_definition(dsl_string).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.starts_with("Multiple validation errors"));
    assert!(rendered.contains(error_codes::MISSING_END));
    assert!(rendered.contains("process.activities[0].next"));
    assert!(rendered.contains("process.activities[1].next_if_false"));
}
