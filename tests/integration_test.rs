use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use resource_framework::ModelError;
use serde_json::{json, Value};
use tower::ServiceExt;
use virt_api::host::stats::{Counters, MemoryInfo};
use virt_api::host::{
    Clock, CounterSource, ManualClock, MemoryPackageManager, PackageManager, PartitionTable,
    HostPower, PowerAction, RecordingPower, StaticDevices,
};
use virt_api::model::{Device, HostInfo, PackageUpdate};
use virt_api::{Config, HostServices, HostSystem};

// --- Harness ---

struct FakeCounters {
    counters: Mutex<Counters>,
}

impl CounterSource for FakeCounters {
    fn read(&self) -> Result<Counters, ModelError> {
        Ok(*self.counters.lock().unwrap())
    }

    fn uptime(&self) -> Result<Duration, ModelError> {
        Ok(Duration::from_secs(10))
    }
}

fn update(name: &str) -> PackageUpdate {
    PackageUpdate {
        package_name: name.to_string(),
        arch: "noarch".to_string(),
        version: "2.0".to_string(),
        repository: "updates".to_string(),
    }
}

fn device(name: &str, capability: &str, adapter_type: &str) -> Device {
    Device {
        name: name.to_string(),
        adapter_type: adapter_type.to_string(),
        wwnn: String::new(),
        wwpn: String::new(),
        capability: capability.to_string(),
    }
}

struct Fixture {
    system: HostSystem,
    router: Router,
    packages: Arc<dyn PackageManager>,
    power: Arc<RecordingPower>,
}

fn fixture() -> Fixture {
    let counters = Arc::new(FakeCounters {
        counters: Mutex::new(Counters {
            memory: MemoryInfo {
                total: 8 << 30,
                free: 2 << 30,
                cached: 1 << 30,
                buffers: 1 << 20,
                avail: 4 << 30,
            },
            net_recv_bytes: 1000,
            ..Counters::default()
        }),
    });
    let packages: Arc<dyn PackageManager> =
        Arc::new(MemoryPackageManager::new([update("bash"), update("vim")]));
    let power = Arc::new(RecordingPower::default());
    let services = HostServices {
        info: HostInfo {
            cpu: "Fake CPU @ 3.00GHz".into(),
            memory: 8 << 30,
            os_distro: "Fedora".into(),
            os_version: "40".into(),
            os_codename: "".into(),
        },
        counters: counters as Arc<dyn CounterSource>,
        clock: Arc::new(ManualClock::default()) as Arc<dyn Clock>,
        packages: Arc::clone(&packages),
        partitions: PartitionTable::from_path("/nonexistent/partitions"),
        devices: Arc::new(StaticDevices::new([
            device("scsi_host0", "scsi_host", ""),
            device("scsi_host2", "scsi_host", "fc_host"),
            device("net_eth0", "net", ""),
        ])),
        power: Arc::clone(&power) as Arc<dyn HostPower>,
    };
    let config = Config {
        volume_alloc_delay_ms: 20,
        ..Config::default()
    };
    let system = HostSystem::with_services(&config, services);
    Fixture {
        router: system.router(),
        system,
        packages,
        power,
    }
}

async fn send_raw(
    router: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, HeaderMap, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        request = request.header(CONTENT_TYPE, content_type);
    }
    if !body.is_empty() {
        request = request.header(CONTENT_LENGTH, body.len());
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
    match body {
        Some(body) => {
            send_raw(router, method, uri, Some("application/json"), &body.to_string()).await
        }
        None => send_raw(router, method, uri, None, "").await,
    }
}

async fn poll_task(router: &Router, location: &str) -> Value {
    for _ in 0..200 {
        let (status, _, task) = send(router, Method::GET, location, None).await;
        assert_eq!(status, StatusCode::OK);
        if task["status"] != "running" {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{location} never completed");
}

// --- VMs ---

#[tokio::test]
async fn vm_lifecycle() {
    let f = fixture();
    let r = &f.router;

    let (status, headers, vm) = send(r, Method::POST, "/vms", Some(json!({"name": "v1", "cpus": 2}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[LOCATION], "/vms/v1");
    assert_eq!(vm, json!({"name": "v1", "state": "shutoff", "memory": 1024, "cpus": 2}));

    let (status, _, vm) = send(r, Method::POST, "/vms/v1/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vm["state"], "running");

    let (status, _, err) = send(r, Method::DELETE, "/vms/v1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "vm 'v1' must be shut off before it can be deleted");

    send(r, Method::POST, "/vms/v1/stop", None).await;
    let (status, _, vm) = send(r, Method::PUT, "/vms/v1", Some(json!({"name": "v2"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vm["name"], "v2");

    let (status, _, list) = send(r, Method::GET, "/vms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([{"name": "v2", "state": "shutoff", "memory": 1024, "cpus": 2}]));

    let (status, _, _) = send(r, Method::DELETE, "/vms/v2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(r, Method::GET, "/vms/v2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn vm_create_without_name_names_the_parameter() {
    let f = fixture();
    let (status, _, err) = send(&f.router, Method::POST, "/vms", Some(json!({"memory": 512}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "missing parameter: 'name'");
}

// --- Storage ---

#[tokio::test]
async fn volume_creation_runs_as_a_task() {
    let f = fixture();
    let r = &f.router;

    let pool = json!({"name": "default", "path": "/var/lib/libvirt/images", "type": "dir"});
    let (status, _, _) = send(r, Method::POST, "/storagepools", Some(pool)).await;
    assert_eq!(status, StatusCode::CREATED);

    let volume = json!({"name": "disk.img", "capacity": 4096});
    let (status, _, err) = send(
        r,
        Method::POST,
        "/storagepools/default/storagevolumes",
        Some(volume.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "storage pool 'default' is not active");

    let (_, _, pool) = send(r, Method::POST, "/storagepools/default/activate", None).await;
    assert_eq!(pool["state"], "active");

    let (status, headers, task) =
        send(r, Method::POST, "/storagepools/default/storagevolumes", Some(volume)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let location = headers[LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, format!("/tasks/{}", task["id"]));
    assert_eq!(task["target_uri"], "/storagepools/default/storagevolumes/disk.img");

    let task = poll_task(r, &location).await;
    assert_eq!(task["status"], "finished");

    let (status, _, vol) =
        send(r, Method::GET, "/storagepools/default/storagevolumes/disk.img", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vol["path"], "/var/lib/libvirt/images/disk.img");
    assert_eq!(vol["capacity"], 4096);

    let (_, _, pool) = send(r, Method::GET, "/storagepools/default", None).await;
    assert_eq!(pool["nr_volumes"], 1);
}

#[tokio::test]
async fn unknown_volume_is_404() {
    let f = fixture();
    let (status, _, _) = send(
        &f.router,
        Method::GET,
        "/storagepools/ghost/storagevolumes/v",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Networks ---

#[tokio::test]
async fn network_create_and_activate() {
    let f = fixture();
    let r = &f.router;

    let (status, headers, net) = send(
        r,
        Method::POST,
        "/networks",
        Some(json!({"name": "lan", "connection": "nat"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[LOCATION], "/networks/lan");
    assert_eq!(net["subnet"], "192.168.122.0/24");

    let (_, _, net) = send(r, Method::POST, "/networks/lan/activate", None).await;
    assert_eq!(net["state"], "active");
    let (status, _, _) = send(r, Method::DELETE, "/networks/lan", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// --- Host ---

#[tokio::test]
async fn host_info_and_stats() {
    let f = fixture();
    let r = &f.router;

    let (status, _, host) = send(r, Method::GET, "/host", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(host["cpu"], "Fake CPU @ 3.00GHz");
    assert_eq!(host["os_version"], "40");

    let (status, _, stats) = send(r, Method::GET, "/host/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["memory"]["total"], 8u64 << 30);
    assert_eq!(stats["net_recv_rate"], 100);

    let (status, _, _) = send(r, Method::DELETE, "/host", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _, err) = send(r, Method::GET, "/host/partitions", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["code"], "OPERATION_FAILED");

    f.system.shutdown().await;
}

#[tokio::test]
async fn host_power_waits_for_running_guests() {
    let f = fixture();
    let r = &f.router;

    send(r, Method::POST, "/vms", Some(json!({"name": "web"}))).await;
    send(r, Method::POST, "/vms/web/start", None).await;

    let (status, _, err) = send(r, Method::POST, "/host/shutdown", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["code"], "OPERATION_FAILED");
    let (status, _, _) = send(r, Method::POST, "/host/reboot", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(f.power.requests().is_empty());

    send(r, Method::POST, "/vms/web/stop", None).await;
    let (status, _, host) = send(r, Method::POST, "/host/reboot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(host["cpu"], "Fake CPU @ 3.00GHz");
    assert_eq!(f.power.requests(), vec![PowerAction::Reboot]);
}

#[tokio::test]
async fn devices_filter_by_capability() {
    let f = fixture();
    let r = &f.router;

    let (status, _, all) = send(r, Method::GET, "/host/devices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(3));

    let (status, _, fc) = send(r, Method::GET, "/host/devices?_cap=fc_host", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        fc,
        json!([{"name": "scsi_host2", "adapter_type": "fc_host", "wwnn": "", "wwpn": ""}])
    );

    let (status, _, _) = send(r, Method::GET, "/host/devices/scsi_host9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Plain query keys filter on the served fields.
    let (_, _, named) = send(r, Method::GET, "/host/devices?name=net_eth0", None).await;
    assert_eq!(named.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn swupdate_drains_pending_updates() {
    let f = fixture();
    let r = &f.router;

    let (status, _, list) = send(r, Method::GET, "/host/packagesupdate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(2));
    let (_, _, vim) = send(r, Method::GET, "/host/packagesupdate/vim", None).await;
    assert_eq!(vim["version"], "2.0");

    let (status, headers, _) = send(r, Method::POST, "/host/swupdate", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task = poll_task(r, headers[LOCATION].to_str().unwrap()).await;
    assert_eq!(task["status"], "finished");
    assert_eq!(task["message"], "2 packages updated");
    assert!(f.packages.updates().unwrap().is_empty());

    let (status, _, err) = send(r, Method::POST, "/host/swupdate", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["message"], "no packages marked for update");
}

#[tokio::test]
async fn repositories_round_trip_through_the_store() {
    let f = fixture();
    let r = &f.router;

    let repo = json!({"repo_id": "epel", "baseurl": "http://mirror.example/epel"});
    let (status, headers, created) = send(r, Method::POST, "/host/repositories", Some(repo.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[LOCATION], "/host/repositories/epel");
    assert_eq!(created["enabled"], true);

    let (status, _, _) = send(r, Method::POST, "/host/repositories", Some(repo)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, disabled) = send(r, Method::POST, "/host/repositories/epel/disable", None).await;
    assert_eq!(disabled["enabled"], false);
    assert_eq!(
        f.system.store.get("repository", "epel").unwrap().map(|v| v["enabled"].clone()),
        Some(json!(false))
    );

    let (status, _, _) = send(r, Method::DELETE, "/host/repositories/epel", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, _, list) = send(r, Method::GET, "/host/repositories", None).await;
    assert_eq!(list, json!([]));
}

// --- Negotiation ---

#[tokio::test]
async fn xml_body_is_415_and_unknown_root_is_404() {
    let f = fixture();
    let (status, _, err) = send_raw(
        &f.router,
        Method::POST,
        "/vms",
        Some("text/xml"),
        "<vm><name>v1</name></vm>",
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(err["code"], "UNSUPPORTED_MEDIA_TYPE");

    let (status, _, _) = send(&f.router, Method::GET, "/templates", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
