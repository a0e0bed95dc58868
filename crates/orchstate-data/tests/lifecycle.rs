//! Entity relationships and cross-version resource queries.
//!
//! Run with:
//!   cargo test -p orchstate-data --test lifecycle

use chrono::Utc;
use orchstate_data::entity::{
    self, Agent, AgentInstance, AgentProcess, ConfigurationModel, Environment, LogLine, Project,
    Resource, ResourceAction, Snapshot,
};
use orchstate_data::{
    DataError, Document, Filter, ResourceActionKind, ResourceState, Value,
};
use orchstate_store::MemoryDriver;
use serde_json::json;
use tracing::Level;
use uuid::Uuid;

async fn driver() -> MemoryDriver {
    let driver = MemoryDriver::new();
    entity::create_indexes(&driver).await.unwrap();
    driver
}

async fn model(driver: &MemoryDriver, env: Uuid, version: i64, released: bool, deployed: bool) {
    let mut cm = Document::<ConfigurationModel>::new([
        ("environment", Value::Uuid(env)),
        ("version", Value::Int(version)),
        ("date", Value::DateTime(Utc::now())),
        ("released", Value::Bool(released)),
        ("deployed", Value::Bool(deployed)),
    ])
    .unwrap();
    cm.insert(driver).await.unwrap();
}

async fn resource(
    driver: &MemoryDriver,
    env: Uuid,
    id: &str,
    status: ResourceState,
    purged: bool,
) -> Document<Resource> {
    let attributes = Value::from(json!({
        "path": "/etc/motd",
        "purge_on_delete": true,
        "purged": purged,
    }));
    let mut res = Document::<Resource>::new_versioned(
        env,
        id,
        [("status", Value::from(status)), ("attributes", attributes)],
    )
    .unwrap();
    res.insert(driver).await.unwrap();
    res
}

async fn environment(driver: &MemoryDriver) -> (Document<Project>, Document<Environment>) {
    let mut project = Document::<Project>::new([("name", "test")]).unwrap();
    project.insert(driver).await.unwrap();

    let mut env = Document::<Environment>::new([
        ("name", Value::from("dev")),
        ("project", Value::Uuid(project.id().unwrap())),
        ("repo_url", Value::from("")),
        ("repo_branch", Value::from("")),
    ])
    .unwrap();
    env.insert(driver).await.unwrap();
    (project, env)
}

// =============================================================================
// Projects and environments
// =============================================================================

#[tokio::test]
async fn project_lookup() {
    let driver = driver().await;
    let mut project = Document::<Project>::new([("name", "test")]).unwrap();
    project.insert(&driver).await.unwrap();

    let projects = Document::<Project>::get_list(&driver, Filter::new().eq("name", "test"))
        .await
        .unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id(), project.id());

    let by_name = Document::<Project>::get_by_name(&driver, "test").await.unwrap();
    assert_eq!(by_name.and_then(|p| p.id()), project.id());
}

#[tokio::test]
async fn project_name_is_unique() {
    let driver = driver().await;
    Document::<Project>::new([("name", "test")])
        .unwrap()
        .insert(&driver)
        .await
        .unwrap();

    let err = Document::<Project>::new([("name", "test")])
        .unwrap()
        .insert(&driver)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::UniqueConstraintViolation { ref collection, .. } if collection == "Project"));

    Document::<Project>::new([("name", "other")])
        .unwrap()
        .insert(&driver)
        .await
        .unwrap();
}

#[tokio::test]
async fn project_delete_cascades() {
    let driver = driver().await;
    let (project, env) = environment(&driver).await;
    let env_id = env.id().unwrap();
    assert_eq!(env.uuid_field("project"), project.id());

    model(&driver, env_id, 1, true, true).await;
    resource(&driver, env_id, "std::File[agent1,path=/etc/motd],v=1", ResourceState::Deployed, false).await;
    let mut snap = Document::<Snapshot>::new([
        ("environment", Value::Uuid(env_id)),
        ("model", Value::Int(1)),
        ("name", Value::from("a")),
        ("started", Value::DateTime(Utc::now())),
    ])
    .unwrap();
    snap.insert(&driver).await.unwrap();

    // an unrelated environment must survive
    let other_env = Uuid::new_v4();
    model(&driver, other_env, 1, false, false).await;

    let owned = Document::<Environment>::get_for_project(&driver, project.id().unwrap())
        .await
        .unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id(), Some(env_id));

    project.delete_cascade(&driver).await.unwrap();

    assert!(Document::<Project>::get_list(&driver, Filter::new()).await.unwrap().is_empty());
    assert!(Document::<Environment>::get_for_project(&driver, project.id().unwrap())
        .await
        .unwrap()
        .is_empty());
    assert!(Document::<Environment>::get_list(&driver, Filter::new()).await.unwrap().is_empty());
    assert!(Document::<Resource>::get_list(&driver, Filter::new()).await.unwrap().is_empty());
    assert!(Document::<Snapshot>::get_list(&driver, Filter::new()).await.unwrap().is_empty());
    let models = Document::<ConfigurationModel>::get_list(&driver, Filter::new())
        .await
        .unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].environment(), Some(other_env));
}

// =============================================================================
// Agents
// =============================================================================

#[tokio::test]
async fn agent_primary_lookup() {
    let driver = driver().await;
    let (_, env) = environment(&driver).await;
    let env_id = env.id().unwrap();

    let mut agent_proc = Document::<AgentProcess>::new([
        ("hostname", Value::from("testhost")),
        ("environment", Value::Uuid(env_id)),
        ("first_seen", Value::DateTime(Utc::now())),
        ("last_seen", Value::DateTime(Utc::now())),
        ("sid", Value::Uuid(Uuid::new_v4())),
    ])
    .unwrap();
    agent_proc.insert(&driver).await.unwrap();

    let mut instances = Vec::new();
    for name in ["agi1", "agi2"] {
        let mut agi = Document::<AgentInstance>::new([
            ("process", Value::Uuid(agent_proc.id().unwrap())),
            ("name", Value::from(name)),
            ("tid", Value::Uuid(env_id)),
        ])
        .unwrap();
        agi.insert(&driver).await.unwrap();
        instances.push(agi);
    }

    let mut agent = Document::<Agent>::new([
        ("environment", Value::Uuid(env_id)),
        ("name", Value::from("agi1")),
        ("last_failover", Value::DateTime(Utc::now())),
        ("paused", Value::Bool(false)),
        ("primary", Value::Uuid(instances[0].id().unwrap())),
    ])
    .unwrap();
    agent.insert(&driver).await.unwrap();

    let agents = Document::<Agent>::get_list(&driver, Filter::new()).await.unwrap();
    assert_eq!(agents.len(), 1);
    assert!(!agents[0].is_paused());

    let primary = agents[0].primary_instance(&driver).await.unwrap().unwrap();
    let process = primary.process(&driver).await.unwrap().unwrap();
    assert_eq!(process.id(), agent_proc.id());

    let by_name = Document::<Agent>::get_by_name(&driver, env_id, "agi1")
        .await
        .unwrap();
    assert!(by_name.is_some());

    let active = Document::<AgentInstance>::get_active(&driver, env_id, "agi2")
        .await
        .unwrap();
    assert_eq!(active.len(), 1);

    // deleting the process removes its instances but not the agent
    agent_proc.delete_cascade(&driver).await.unwrap();
    assert!(Document::<AgentInstance>::get_list(&driver, Filter::new()).await.unwrap().is_empty());
    assert_eq!(Document::<Agent>::count(&driver, Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn agent_process_lookups() {
    let driver = driver().await;
    let env_a = Uuid::new_v4();
    let env_b = Uuid::new_v4();

    let mut processes = Vec::new();
    for (env, expired) in [(env_a, false), (env_a, true), (env_b, false)] {
        let mut agent_proc = Document::<AgentProcess>::new([
            ("hostname", Value::from("testhost")),
            ("environment", Value::Uuid(env)),
            ("sid", Value::Uuid(Uuid::new_v4())),
        ])
        .unwrap();
        if expired {
            agent_proc.set("expired", Value::DateTime(Utc::now())).unwrap();
        }
        agent_proc.insert(&driver).await.unwrap();
        processes.push(agent_proc);
    }

    let sid = processes[1].uuid_field("sid").unwrap();
    let by_sid = Document::<AgentProcess>::get_by_sid(&driver, sid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_sid.id(), processes[1].id());
    assert!(Document::<AgentProcess>::get_by_sid(&driver, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());

    let live_a = Document::<AgentProcess>::get_live(&driver, Some(env_a)).await.unwrap();
    assert_eq!(live_a.len(), 1);
    assert_eq!(live_a[0].id(), processes[0].id());

    let live = Document::<AgentProcess>::get_live(&driver, None).await.unwrap();
    assert_eq!(live.len(), 2);
}

// =============================================================================
// Configuration models
// =============================================================================

#[tokio::test]
async fn config_model_agents() {
    let driver = driver().await;
    let (_, env) = environment(&driver).await;
    let env_id = env.id().unwrap();

    let version = 1_700_000_000;
    model(&driver, env_id, version, false, false).await;
    for id in [
        "std::File[agent1,path=/etc/motd]",
        "std::File[agent1,path=/etc/hosts]",
        "std::Service[agent2,name=nginx]",
    ] {
        let mut res =
            Document::<Resource>::new_versioned(env_id, &format!("{id},v={version}"), [("attributes", json!({}))])
                .unwrap();
        res.insert(&driver).await.unwrap();
    }

    let agents = Document::<ConfigurationModel>::get_agents(&driver, env_id, version)
        .await
        .unwrap();
    assert_eq!(agents.into_iter().collect::<Vec<_>>(), vec!["agent1", "agent2"]);
}

#[tokio::test]
async fn model_list_paging() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    for version in 1..20 {
        model(&driver, env, version, false, false).await;
    }

    let versions = Document::<ConfigurationModel>::get_versions(&driver, env, 0, Some(1))
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version(), 19);

    let versions = Document::<ConfigurationModel>::get_versions(&driver, env, 1, Some(1))
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version(), 18);

    let versions = Document::<ConfigurationModel>::get_versions(&driver, env, 0, None)
        .await
        .unwrap();
    let numbers: Vec<i64> = versions.iter().map(|m| m.version()).collect();
    assert_eq!(numbers, (1..20).rev().collect::<Vec<_>>());

    let versions = Document::<ConfigurationModel>::get_versions(&driver, env, 10, None)
        .await
        .unwrap();
    assert_eq!(versions.len(), 9);
    assert_eq!(versions[0].version(), 9);
    assert_eq!(versions[8].version(), 1);

    let versions = Document::<ConfigurationModel>::get_versions(&driver, env, 15, Some(100))
        .await
        .unwrap();
    assert_eq!(versions.len(), 4);
}

#[tokio::test]
async fn version_uniqueness() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    model(&driver, env, 1, false, false).await;
    let err = Document::<ConfigurationModel>::new([
        ("environment", Value::Uuid(env)),
        ("version", Value::Int(1)),
    ])
    .unwrap()
    .insert(&driver)
    .await
    .unwrap_err();
    assert!(matches!(err, DataError::UniqueConstraintViolation { .. }));
}

#[tokio::test]
async fn done_count_and_latest_released() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    model(&driver, env, 1, true, true).await;
    model(&driver, env, 2, true, false).await;
    model(&driver, env, 3, false, false).await;

    resource(&driver, env, "std::File[a,path=/1],v=2", ResourceState::Deployed, false).await;
    resource(&driver, env, "std::File[a,path=/2],v=2", ResourceState::Failed, false).await;
    resource(&driver, env, "std::File[a,path=/3],v=2", ResourceState::Deploying, false).await;

    let latest = Document::<ConfigurationModel>::get_latest_released(&driver, env)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version(), 2);
    assert_eq!(latest.done_count(&driver).await.unwrap(), 2);

    let before = Document::<ConfigurationModel>::last_deployed_before(&driver, env, 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.version(), 1);

    let v3 = Document::<ConfigurationModel>::get_version(&driver, env, 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(v3.version(), 3);
    assert!(!v3.is_released());
    assert!(Document::<ConfigurationModel>::get_version(&driver, env, 4)
        .await
        .unwrap()
        .is_none());
    assert!(Document::<ConfigurationModel>::get_version(&driver, Uuid::new_v4(), 3)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn malformed_stored_identifier_is_corrupt() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    model(&driver, env, 1, false, false).await;
    let mut res = Document::<Resource>::new([
        ("environment", Value::Uuid(env)),
        ("model", Value::Int(1)),
        ("resource_id", Value::from("std::File[agent1,path=/x]")),
        ("resource_type", Value::from("std::File")),
        ("agent", Value::from("agent1")),
        ("id_attribute_name", Value::from("path")),
        ("id_attribute_value", Value::from("/x")),
        ("resource_version_id", Value::from("not an identifier")),
    ])
    .unwrap();
    res.insert(&driver).await.unwrap();

    let err = Document::<ConfigurationModel>::get_agents(&driver, env, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::CorruptRecord { ref collection, ref field, .. }
            if collection == "Resource" && field == "resource_version_id"
    ));
}

#[tokio::test]
async fn purge_versions_keeps_latest_released() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    model(&driver, env, 1, false, false).await;
    model(&driver, env, 2, true, true).await;
    for version in 3..=5 {
        model(&driver, env, version, false, false).await;
    }
    resource(&driver, env, "std::File[a,path=/x],v=1", ResourceState::Available, false).await;
    resource(&driver, env, "std::File[a,path=/x],v=2", ResourceState::Deployed, false).await;

    let deleted = Document::<ConfigurationModel>::purge_versions(&driver, env, 2)
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let left: Vec<i64> = Document::<ConfigurationModel>::get_versions(&driver, env, 0, None)
        .await
        .unwrap()
        .iter()
        .map(|m| m.version())
        .collect();
    assert_eq!(left, vec![5, 4, 2]);

    let resources = Document::<Resource>::get_list(&driver, Filter::new()).await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].model(), 2);
}

// =============================================================================
// Resources
// =============================================================================

#[test]
fn resource_derived_fields() {
    let env = Uuid::new_v4();
    let res = Document::<Resource>::new_versioned(
        env,
        "std::File[agent1,path=/etc/motd],v=7",
        Vec::<(&str, Value)>::new(),
    )
    .unwrap();
    assert_eq!(res.model(), 7);
    assert_eq!(res.resource_id(), "std::File[agent1,path=/etc/motd]");
    assert_eq!(res.str_field("resource_type"), Some("std::File"));
    assert_eq!(res.str_field("agent"), Some("agent1"));
    assert_eq!(res.str_field("id_attribute_name"), Some("path"));
    assert_eq!(res.str_field("id_attribute_value"), Some("/etc/motd"));
    assert_eq!(res.status(), Some(ResourceState::Available));

    let err = Document::<Resource>::new_versioned(env, "std::File[agent1,path=/x]", Vec::<(&str, Value)>::new())
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidResourceId(_)));
}

#[tokio::test]
async fn resource_purge_on_delete() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    let mut version = 1;

    model(&driver, env, version, true, true).await;
    resource(&driver, env, "std::File[agent1,path=/etc/motd],v=1", ResourceState::Deployed, false).await;
    resource(&driver, env, "std::File[agent2,path=/etc/motd],v=1", ResourceState::Deployed, true).await;

    // intervening versions that were never released or deployed
    while version < 10 {
        version += 1;
        model(&driver, env, version, false, false).await;
        resource(
            &driver,
            env,
            &format!("std::File[agent5,path=/etc/motd],v={version}"),
            ResourceState::Available,
            false,
        )
        .await;
    }

    version += 1;
    model(&driver, env, version, false, false).await;

    let to_purge = Document::<Resource>::get_deleted_resources(&driver, env, version)
        .await
        .unwrap();
    assert_eq!(to_purge.len(), 1);
    assert_eq!(to_purge[0].model(), 1);
    assert_eq!(to_purge[0].resource_id(), "std::File[agent1,path=/etc/motd]");
}

#[tokio::test]
async fn undeployed_version_is_not_evidence_of_presence() {
    let driver = driver().await;
    let env = Uuid::new_v4();

    model(&driver, env, 1, true, true).await;
    resource(&driver, env, "std::File[agent1,path=/etc/motd],v=1", ResourceState::Deployed, false).await;

    model(&driver, env, 2, false, false).await;
    resource(&driver, env, "std::File[agent1,path=/etc/motd],v=2", ResourceState::Available, false).await;

    model(&driver, env, 3, false, false).await;

    let to_purge = Document::<Resource>::get_deleted_resources(&driver, env, 3)
        .await
        .unwrap();
    assert_eq!(to_purge.len(), 1);
    assert_eq!(to_purge[0].model(), 1);
    assert_eq!(to_purge[0].resource_id(), "std::File[agent1,path=/etc/motd]");
}

#[tokio::test]
async fn resource_still_present_is_not_purged() {
    let driver = driver().await;
    let env = Uuid::new_v4();

    model(&driver, env, 1, true, true).await;
    resource(&driver, env, "std::File[agent1,path=/etc/motd],v=1", ResourceState::Deployed, false).await;
    model(&driver, env, 2, false, false).await;
    resource(&driver, env, "std::File[agent1,path=/etc/motd],v=2", ResourceState::Available, false).await;

    let to_purge = Document::<Resource>::get_deleted_resources(&driver, env, 2)
        .await
        .unwrap();
    assert!(to_purge.is_empty());

    // nothing deployed before the first version
    let none = Document::<Resource>::get_deleted_resources(&driver, env, 1)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn purge_uses_latest_deployed_version() {
    let driver = driver().await;
    let env = Uuid::new_v4();

    model(&driver, env, 1, true, true).await;
    resource(&driver, env, "std::File[a1,path=/x],v=1", ResourceState::Deployed, false).await;
    model(&driver, env, 2, true, true).await;
    resource(&driver, env, "std::File[a1,path=/y],v=2", ResourceState::Deployed, false).await;
    model(&driver, env, 3, false, false).await;

    // /x left the desired state at version 2, which already handled it
    let to_purge = Document::<Resource>::get_deleted_resources(&driver, env, 3)
        .await
        .unwrap();
    assert_eq!(to_purge.len(), 1);
    assert_eq!(to_purge[0].model(), 2);
    assert_eq!(to_purge[0].resource_version_id(), "std::File[a1,path=/y],v=2");
}

#[tokio::test]
async fn non_deployed_status_is_not_purged() {
    let driver = driver().await;
    let env = Uuid::new_v4();

    model(&driver, env, 1, true, true).await;
    resource(&driver, env, "std::File[a1,path=/a],v=1", ResourceState::Deployed, false).await;
    resource(&driver, env, "std::File[a1,path=/b],v=1", ResourceState::Failed, false).await;
    resource(&driver, env, "std::File[a1,path=/c],v=1", ResourceState::Available, false).await;
    resource(&driver, env, "std::File[a1,path=/d],v=1", ResourceState::Skipped, false).await;
    model(&driver, env, 2, false, false).await;

    let to_purge = Document::<Resource>::get_deleted_resources(&driver, env, 2)
        .await
        .unwrap();
    assert_eq!(to_purge.len(), 1);
    assert_eq!(to_purge[0].resource_id(), "std::File[a1,path=/a]");
}

#[tokio::test]
async fn get_latest_resource() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    let key = "std::File[agent1,path=/etc/motd]";
    resource(&driver, env, &format!("{key},v=1"), ResourceState::Deployed, false).await;
    resource(&driver, env, &format!("{key},v=2"), ResourceState::Deployed, true).await;

    let res = Document::<Resource>::get_latest_version(&driver, env, key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res.model(), 2);

    let missing = Document::<Resource>::get_latest_version(&driver, env, "std::File[agent1,path=/none]")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn get_resources_omits_unknown() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    let mut ids = Vec::new();
    for i in 1..=10 {
        let res = resource(
            &driver,
            env,
            &format!("std::File[agent1,path=/tmp/file{i}],v=1"),
            ResourceState::Deployed,
            false,
        )
        .await;
        ids.push(res.resource_version_id().to_string());
    }

    let resources = Document::<Resource>::get_resources(&driver, env, &ids).await.unwrap();
    let mut found: Vec<String> = resources
        .iter()
        .map(|r| r.resource_version_id().to_string())
        .collect();
    found.sort();
    ids.sort();
    assert_eq!(found, ids);

    let partial = Document::<Resource>::get_resources(&driver, env, &[ids[0].as_str(), "abcd"])
        .await
        .unwrap();
    assert_eq!(partial.len(), 1);
}

#[tokio::test]
async fn escaped_resource_attributes() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    let routes = json!({"8.0.0.0/8": "1.2.3.4", "0.0.0.0/0": "127.0.0.1"});
    let mut res = Document::<Resource>::new_versioned(
        env,
        "std::File[agent1,name=router],v=1",
        [
            ("status", Value::from(ResourceState::Deployed)),
            (
                "attributes",
                Value::from(json!({"name": "router", "purge_on_delete": true, "purged": false, "routes": routes})),
            ),
        ],
    )
    .unwrap();
    res.insert(&driver).await.unwrap();

    let resources = Document::<Resource>::get_resources(&driver, env, &[res.resource_version_id()])
        .await
        .unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].attributes().unwrap()["routes"], Value::from(routes));
}

// =============================================================================
// Snapshots and actions
// =============================================================================

#[tokio::test]
async fn snapshot_progress() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    let mut snap = Document::<Snapshot>::new([
        ("environment", Value::Uuid(env)),
        ("model", Value::Int(1)),
        ("name", Value::from("a")),
        ("started", Value::DateTime(Utc::now())),
        ("resources_todo", Value::Int(1)),
    ])
    .unwrap();
    snap.insert(&driver).await.unwrap();

    let mut s = Document::<Snapshot>::get_by_id(&driver, snap.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(!s.is_finished());
    s.resource_updated(&driver, 10).await.unwrap();
    assert_eq!(s.int_field("resources_todo"), Some(0));
    assert_eq!(s.int_field("total_size"), Some(10));
    assert!(s.is_finished());

    let s = Document::<Snapshot>::get_by_id(&driver, snap.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(s.int_field("resources_todo"), Some(0));
    assert_eq!(s.int_field("total_size"), Some(10));
    assert!(s.is_finished());

    s.delete_cascade(&driver).await.unwrap();
    assert!(Document::<Snapshot>::get_list(&driver, Filter::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn action_log_with_log_lines() {
    let driver = driver().await;
    let env = Uuid::new_v4();
    let rvid = "std::File[agent1,path=/etc/motd],v=2";

    let mut action_ids = Vec::new();
    for (kind, minutes) in [(ResourceActionKind::Store, 0), (ResourceActionKind::Deploy, 5)] {
        let action_id = Uuid::new_v4();
        action_ids.push(action_id);
        let started = Utc::now() + chrono::Duration::minutes(minutes);
        let line = LogLine::log(
            Level::INFO,
            "Successfully stored version {version}",
            [("version", Value::Int(2))],
        );
        let mut ra = Document::<ResourceAction>::new([
            ("environment", Value::Uuid(env)),
            ("resource_version_ids", Value::List(vec![Value::from(rvid)])),
            ("action_id", Value::Uuid(action_id)),
            ("action", Value::from(kind)),
            ("started", Value::DateTime(started)),
            ("finished", Value::DateTime(started)),
            ("messages", Value::List(vec![line.into()])),
        ])
        .unwrap();
        ra.insert(&driver).await.unwrap();
    }

    let log = Document::<ResourceAction>::get_log(&driver, env, rvid, None, 10)
        .await
        .unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(
        log[0].enum_field::<ResourceActionKind>("action"),
        Some(ResourceActionKind::Deploy)
    );
    let message = &log[0].list_field("messages").unwrap()[0];
    assert_eq!(
        message.get("msg"),
        Some(&Value::from("Successfully stored version 2"))
    );

    let stores = Document::<ResourceAction>::get_log(
        &driver,
        env,
        rvid,
        Some(ResourceActionKind::Store),
        10,
    )
    .await
    .unwrap();
    assert_eq!(stores.len(), 1);

    let deploy = Document::<ResourceAction>::get_by_action_id(&driver, action_ids[1])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        deploy.enum_field::<ResourceActionKind>("action"),
        Some(ResourceActionKind::Deploy)
    );
    assert!(Document::<ResourceAction>::get_by_action_id(&driver, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}
