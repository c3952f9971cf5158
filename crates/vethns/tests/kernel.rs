//! Tests against the live kernel.
//!
//! Run as root with iproute2 installed:
//! `cargo test -p vethns --features integration --test kernel`
#![cfg(feature = "integration")]

use std::error::Error;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use vethns::{LINK_NOT_FOUND, NO_SUCH_PROCESS, VethManager};

type TestResult = Result<(), Box<dyn Error>>;

/// Deletes the host side (and with it the peer) when dropped.
struct VethCleanup(String);

impl Drop for VethCleanup {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["link", "delete", &format!("{}0", self.0)])
            .output();
    }
}

/// A named network namespace with a `sleep` process running inside it.
struct TestNamespace {
    name: String,
    child: Child,
}

impl TestNamespace {
    fn start(name: &str) -> Result<Self, Box<dyn Error>> {
        let status = Command::new("ip").args(["netns", "add", name]).status()?;
        if !status.success() {
            return Err(format!("ip netns add {name} failed: {status}").into());
        }

        // `ip netns exec` switches namespace and then execs, so the child pid
        // ends up being the sleep process itself.
        let child = Command::new("ip")
            .args(["netns", "exec", name, "sleep", "1000"])
            .spawn()?;
        let namespace = Self {
            name: name.to_string(),
            child,
        };
        namespace.wait_for_exec()?;
        Ok(namespace)
    }

    fn pid(&self) -> i32 {
        i32::try_from(self.child.id()).expect("pid fits in i32")
    }

    fn wait_for_exec(&self) -> Result<(), Box<dyn Error>> {
        let comm = format!("/proc/{}/comm", self.child.id());
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if std::fs::read_to_string(&comm)?.trim() == "sleep" {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Err("process never entered the test namespace".into())
    }

    fn link_visible(&self, name: &str) -> Result<bool, Box<dyn Error>> {
        let output = Command::new("ip")
            .args(["netns", "exec", &self.name, "ip", "link", "show", name])
            .output()?;
        Ok(output.status.success())
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = Command::new("ip")
            .args(["netns", "delete", &self.name])
            .output();
    }
}

fn host_link_flags(name: &str) -> Result<Option<Vec<String>>, Box<dyn Error>> {
    let output = Command::new("ip").args(["link", "show", name]).output()?;
    if !output.status.success() {
        return Ok(None);
    }
    let stdout = String::from_utf8(output.stdout)?;
    let flags = stdout
        .split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(flags, _)| flags.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    Ok(Some(flags))
}

#[test_log::test]
fn creates_named_pair_with_host_side_up() -> TestResult {
    let _cleanup = VethCleanup("vnsa".to_string());
    let manager = VethManager::new()?;

    let pair = manager.create("vnsa")?;

    assert_eq!(pair.host.name, "vnsa0");
    assert_eq!(pair.container.name, "vnsa1");
    let flags = host_link_flags("vnsa0")?.expect("host side exists");
    assert!(flags.iter().any(|f| f == "UP"), "{flags:?}");
    assert!(host_link_flags("vnsa1")?.is_some());
    Ok(())
}

#[test_log::test]
fn create_is_idempotent() -> TestResult {
    let _cleanup = VethCleanup("vnsb".to_string());
    let manager = VethManager::new()?;

    let first = manager.create("vnsb")?;
    let second = manager.create("vnsb")?;

    assert_eq!(first.host.name, second.host.name);
    assert_eq!(first.container.name, second.container.name);
    assert_eq!(first.host.index, second.host.index);
    Ok(())
}

#[test_log::test]
fn create_keeps_an_up_link_up() -> TestResult {
    let _cleanup = VethCleanup("vnsc".to_string());
    let manager = VethManager::new()?;
    manager.create("vnsc")?;
    Command::new("ip")
        .args(["link", "set", "vnsc0", "up"])
        .status()?;

    let pair = manager.create("vnsc")?;

    assert_eq!(pair.host.name, "vnsc0");
    let flags = host_link_flags("vnsc0")?.expect("host side exists");
    assert!(flags.iter().any(|f| f == "UP"), "{flags:?}");
    Ok(())
}

#[test_log::test]
fn moves_container_side_into_process_namespace() -> TestResult {
    let _cleanup = VethCleanup("vnsd".to_string());
    let namespace = TestNamespace::start("vethns-test-move")?;
    let manager = VethManager::new()?;
    let (_, container) = manager.create("vnsd")?.into_parts();

    manager.move_to_namespace(&container, namespace.pid())?;

    assert!(host_link_flags("vnsd1")?.is_none());
    assert!(namespace.link_visible("vnsd1")?);
    Ok(())
}

#[test_log::test]
fn moving_a_missing_link_is_descriptive() -> TestResult {
    let namespace = TestNamespace::start("vethns-test-nolink")?;
    let manager = VethManager::new()?;

    let err = manager
        .move_to_namespace("nonexistentVeth", namespace.pid())
        .unwrap_err();

    assert!(err.to_string().contains(LINK_NOT_FOUND), "{err}");
    Ok(())
}

#[test_log::test]
fn moving_to_a_missing_process_is_descriptive() -> TestResult {
    let _cleanup = VethCleanup("vnse".to_string());
    let manager = VethManager::new()?;
    let (_, container) = manager.create("vnse")?.into_parts();

    let err = manager.move_to_namespace(&container, -1).unwrap_err();

    assert!(err.to_string().contains(NO_SUCH_PROCESS), "{err}");
    Ok(())
}
