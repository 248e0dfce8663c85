use procflow_core::{CoreError, ProcessExecutionService};
use procflow_tests::{form, service};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_on_one_instance() -> anyhow::Result<()> {
    let service: Arc<ProcessExecutionService> = Arc::new(service());
    let id = service.create_instance("linear", "contended", None)?.id;

    // Every writer races to commit the same current activity; exactly one wins
    let mut handles = Vec::new();
    for writer in 0..8 {
        let service = Arc::clone(&service);
        let id = id.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            service.commit_activity(id.as_str(), "a", form(&format!("a-{}", writer)))
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => committed += 1,
            Err(CoreError::NotCurrent { .. }) => {}
            Err(other) => anyhow::bail!("unexpected error: {}", other),
        }
    }

    assert_eq!(committed, 1);
    let instance = service.get_instance(id.as_str())?;
    assert_eq!(instance.current_activity_id.as_str(), "b");
    assert_eq!(service.artifacts(id.as_str())?.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_writers_on_different_instances_all_progress() -> anyhow::Result<()> {
    let service: Arc<ProcessExecutionService> = Arc::new(service());

    let mut handles = Vec::new();
    for n in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::task::spawn_blocking(move || -> Result<String, CoreError> {
            let id = service.create_instance("linear", format!("site-{}", n), None)?.id;
            service.commit_activity(id.as_str(), "a", form("a"))?;
            service.commit_activity(id.as_str(), "b", form("b"))?;
            service.commit_activity(id.as_str(), "done", form("done"))?;
            Ok(id.to_string())
        }));
    }

    for handle in handles {
        let id = handle.await??;
        assert!(service.get_instance(&id)?.is_completed());
    }
    assert_eq!(service.instances_for_definition("linear")?.len(), 16);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_records_during_writes() -> anyhow::Result<()> {
    let service: Arc<ProcessExecutionService> = Arc::new(service());
    let id = service.create_instance("fork-join", "readers", None)?.id;

    let writer = {
        let service = Arc::clone(&service);
        let id = id.clone();
        tokio::task::spawn_blocking(move || -> Result<(), CoreError> {
            for round in 0..50 {
                let branch = if round % 2 == 0 { "p1" } else { "p2" };
                service.save_artifact(id.as_str(), branch, form(&format!("{}-{}", branch, round)))?;
            }
            Ok(())
        })
    };

    let reader = {
        let service = Arc::clone(&service);
        let id = id.clone();
        tokio::task::spawn_blocking(move || -> Result<(), CoreError> {
            for _ in 0..50 {
                let path = service.resolve_path(id.as_str())?;
                assert_eq!(path.len(), 4);
                assert_eq!(path[3].id.as_str(), "j");
            }
            Ok(())
        })
    };

    writer.await??;
    reader.await??;
    assert_eq!(service.next_activity(id.as_str())?.id.as_str(), "done");
    Ok(())
}
