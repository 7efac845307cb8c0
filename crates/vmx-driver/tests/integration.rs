//! Integration tests for vmx-driver.
//!
//! These tests require:
//! - VMware Workstation, Player or Fusion with `vmrun` installed
//! - A template VM with a snapshot named by `VMX_TEMPLATE_SNAPSHOT`
//!
//! Run with: `cargo test -p vmx-driver -- --ignored`

use std::path::{Path, PathBuf};
use std::time::Duration;
use vmx_driver::{CloneMode, DriverConfig, DriverRegistry, HypervisorDriver, OpContext};

struct Template {
    vmx: PathBuf,
    snapshot: String,
}

fn template() -> Option<Template> {
    let vmx = std::env::var("VMX_TEMPLATE").ok()?;
    let snapshot = std::env::var("VMX_TEMPLATE_SNAPSHOT").unwrap_or_else(|_| "clean".to_string());
    if !Path::new(&vmx).exists() {
        eprintln!("Skipping test: template {vmx} not found");
        return None;
    }
    Some(Template {
        vmx: PathBuf::from(vmx),
        snapshot,
    })
}

/// Clone -> start -> snapshot listing -> stop -> remove
#[tokio::test]
#[ignore = "requires VMware + vmrun + template VM"]
async fn test_linked_clone_lifecycle() {
    let Some(template) = template() else {
        eprintln!("Set VMX_TEMPLATE and VMX_TEMPLATE_SNAPSHOT environment variables");
        return;
    };
    let driver = DriverRegistry::builtin()
        .select(&DriverConfig::from_env())
        .expect("No driver available");
    let ctx = OpContext::new();

    let work = tempfile::tempdir().expect("Failed to create work dir");
    let target = work.path().join("clone").join("it").join("it.vmx");

    driver
        .clone_vm(&ctx, &template.vmx, &target, &template.snapshot, CloneMode::Linked)
        .await
        .expect("Failed to clone");
    assert!(target.exists());

    driver
        .clear_cdrom(&ctx, &target)
        .await
        .expect("Failed to clear CD-ROM");
    driver.start(&ctx, &target, false).await.expect("Failed to start");
    assert!(driver.is_running(&ctx, &target).await.unwrap());

    driver
        .create_snapshot(&ctx, &target, "it-snap")
        .await
        .expect("Failed to snapshot");
    let snapshots = driver.list_snapshots(&ctx, &target).await.unwrap();
    assert!(snapshots.iter().any(|s| s == "it-snap"));

    driver.stop(&ctx, &target, true).await.expect("Failed to stop");
    driver.remove(&ctx, &target).await.expect("Failed to remove");
    assert!(!work.path().join("clone").exists());
}

/// Guest tooling becomes ready after power-on
#[tokio::test]
#[ignore = "requires VMware + vmrun + template VM with guest tools"]
async fn test_guest_ready_after_start() {
    let Some(template) = template() else {
        return;
    };
    let driver = DriverRegistry::builtin()
        .select(&DriverConfig::from_env())
        .expect("No driver available");
    let ctx = OpContext::new().with_timeout(Duration::from_secs(600));

    let work = tempfile::tempdir().expect("Failed to create work dir");
    let target = work.path().join("ready").join("it").join("it.vmx");

    driver
        .clone_vm(&ctx, &template.vmx, &target, &template.snapshot, CloneMode::Linked)
        .await
        .expect("Failed to clone");
    driver.start(&ctx, &target, false).await.expect("Failed to start");

    let ready = driver
        .wait_for_guest_ready(&ctx, &target, Duration::from_secs(300))
        .await;

    driver.stop(&ctx, &target, true).await.ok();
    driver.remove(&ctx, &target).await.ok();
    ready.expect("Guest tools never became ready");
}
