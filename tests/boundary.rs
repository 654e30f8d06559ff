mod common;

use common::MODULE;
use runt_host::{
    boundary::{Arg, Boundary, BoundaryOptions, Isolation, IsolationPolicy},
    errors::HostError,
    framework::{AssemblyInfo, RemoteExecutor, RemoteFramework},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

fn boundaries(drops: &Arc<AtomicUsize>) -> Vec<Boundary> {
    vec![
        Boundary::in_domain(common::registry(drops)).unwrap(),
        Boundary::direct(common::registry(drops)),
    ]
}

fn framework(boundary: &Boundary) -> Result<RemoteFramework, HostError> {
    boundary.create_object(MODULE, "TestFramework", vec![Arg::from("math.bin")])
}

fn assembly() -> AssemblyInfo {
    AssemblyInfo {
        name: "math".to_string(),
        path: "math.bin".to_string(),
    }
}

#[test]
fn objects_must_implement_the_requested_interface() {
    let drops = Arc::new(AtomicUsize::new(0));
    for boundary in boundaries(&drops) {
        let err = boundary
            .create_object::<RemoteExecutor>(MODULE, "TestFramework", vec![Arg::from("math.bin")])
            .unwrap_err();
        assert!(matches!(err, HostError::Boundary(_)), "{}", err);

        let err = boundary
            .create_object::<RemoteFramework>(MODULE, "Missing", vec![])
            .unwrap_err();
        assert!(matches!(err, HostError::Boundary(_)), "{}", err);
        assert_eq!(boundary.live_objects(), 0);
    }
}

#[test]
fn constructor_argument_errors_come_back_typed() {
    let drops = Arc::new(AtomicUsize::new(0));
    for boundary in boundaries(&drops) {
        let err = boundary
            .create_object::<RemoteFramework>(MODULE, "TestFramework", vec![Arg::Int(7)])
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidArgument(_)), "{}", err);
    }
}

#[test]
fn handles_from_another_boundary_are_rejected() {
    let drops = Arc::new(AtomicUsize::new(0));
    let domain = Boundary::in_domain(common::registry(&drops)).unwrap();
    let direct = Boundary::direct(common::registry(&drops));
    let foreign = framework(&domain).unwrap();

    let err = direct
        .create_object::<RemoteFramework>(MODULE, "TestFramework", vec![Arg::from(&foreign)])
        .unwrap_err();
    assert!(matches!(err, HostError::InvalidArgument(_)), "{}", err);
}

#[test]
fn released_objects_cannot_be_used() {
    let drops = Arc::new(AtomicUsize::new(0));
    for boundary in boundaries(&drops) {
        let before = drops.load(Ordering::SeqCst);
        let framework = framework(&boundary).unwrap();
        framework.release().unwrap();
        framework.release().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), before + 1);

        assert!(matches!(
            framework.info(),
            Err(HostError::InvalidArgument(_))
        ));
        let err = boundary
            .create_object::<RemoteFramework>(MODULE, "TestFramework", vec![Arg::from(&framework)])
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidArgument(_)), "{}", err);
    }
}

#[test]
fn dispose_releases_every_object_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    for boundary in boundaries(&drops) {
        let before = drops.load(Ordering::SeqCst);
        let framework = framework(&boundary).unwrap();
        let discoverer = framework.discoverer(&assembly()).unwrap();
        assert_eq!(boundary.live_objects(), 2);

        boundary.dispose();
        assert!(boundary.is_disposed());
        assert_eq!(boundary.live_objects(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), before + 2);

        boundary.dispose();
        discoverer.release().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), before + 2);

        assert!(matches!(framework.info(), Err(HostError::Disposed)));
        assert!(matches!(
            self::framework(&boundary),
            Err(HostError::Disposed)
        ));
    }
}

#[test]
fn disabled_isolation_loads_in_process() {
    let drops = Arc::new(AtomicUsize::new(0));
    let options = BoundaryOptions::isolated("unused").with_policy(IsolationPolicy::Denied);
    let boundary = Boundary::create(&options, common::registry(&drops)).unwrap();
    assert_eq!(boundary.isolation(), Isolation::Direct);
    assert_eq!(framework(&boundary).unwrap().info().unwrap().version, common::VERSION);
}

#[test]
fn missing_host_falls_back_unless_isolation_is_required() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dir = tempfile::tempdir().unwrap();
    let options = BoundaryOptions::isolated(dir.path().join("no-such-host"));

    let boundary = Boundary::create(&options, common::registry(&drops)).unwrap();
    assert_eq!(boundary.isolation(), Isolation::Direct);
    assert!(framework(&boundary).is_ok());

    let required = options.with_policy(IsolationPolicy::Required);
    match Boundary::create(&required, common::registry(&drops)) {
        Err(HostError::Boundary(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("required isolation must not fall back"),
    }
}

#[cfg(unix)]
#[test]
fn hosts_that_exit_without_greeting_are_boundary_errors() {
    let host = std::path::Path::new("/bin/true");
    if !host.is_file() {
        return;
    }
    let drops = Arc::new(AtomicUsize::new(0));
    let shadow = tempfile::tempdir().unwrap();
    let options = BoundaryOptions {
        shadow_copy: true,
        shadow_copy_folder: Some(shadow.path().to_path_buf()),
        ..BoundaryOptions::isolated(host)
    }
    .with_policy(IsolationPolicy::Required);

    match Boundary::create(&options, common::registry(&drops)) {
        Err(HostError::Boundary(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("/bin/true cannot host a framework"),
    }
    assert_eq!(std::fs::read_dir(shadow.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[test]
fn hosts_that_do_not_speak_the_protocol_are_rejected() {
    let host = std::path::Path::new("/bin/echo");
    if !host.is_file() {
        return;
    }
    let drops = Arc::new(AtomicUsize::new(0));
    match Boundary::create(&BoundaryOptions::isolated(host), common::registry(&drops)) {
        Err(HostError::Protocol(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("/bin/echo cannot host a framework"),
    }
}
