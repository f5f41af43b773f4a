//! Unbound-thread access must take the process down.
//!
//! The failing case runs in a child process: this test binary re-executes
//! itself with a marker variable set so only the probe test does any work.

use std::process::{Command, Output};
use std::sync::Arc;

use shell_context::{
    bind, current_output_stream, current_session, current_terminal_device, Session, SessionConfig,
    SessionId, TermSize, TerminalDevice,
};

const PROBE_ENV: &str = "SHELL_CONTEXT_FATAL_PROBE";

fn run_probe(probe: &str) -> Output {
    let exe = std::env::current_exe().unwrap();
    Command::new(exe)
        .args(["fatal_probe", "--exact", "--nocapture", "--test-threads=1"])
        .env(PROBE_ENV, probe)
        .output()
        .unwrap()
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn resume_if_panicked(handle: std::thread::JoinHandle<()>) {
    if let Err(payload) = handle.join() {
        std::panic::resume_unwind(payload);
    }
}

/// Child-side entry. A no-op unless launched by one of the harness tests.
#[test]
fn fatal_probe() {
    let Ok(probe) = std::env::var(PROBE_ENV) else {
        return;
    };

    let handle = std::thread::Builder::new()
        .name("probe-worker".to_string())
        .spawn(move || match probe.as_str() {
            "session" => {
                current_session();
            }
            "device" => {
                current_terminal_device();
            }
            "stdout" => {
                current_output_stream();
            }
            "double-bind" => {
                let make = || {
                    Arc::new(Session::new(
                        SessionId::new(),
                        SessionConfig::default(),
                        TerminalDevice::detached(TermSize::default()),
                    ))
                };
                let (first, second) = (make(), make());
                bind(&first);
                bind(&second);
            }
            other => panic!("unknown probe {}", other),
        })
        .unwrap();
    resume_if_panicked(handle);
}

#[test]
fn test_current_session_unbound_is_fatal() {
    let output = run_probe("session");
    assert!(!output.status.success());
    let text = combined(&output);
    assert!(text.contains("no session bound to thread"), "{}", text);
    assert!(text.contains("probe-worker"), "{}", text);
}

#[test]
fn test_terminal_device_unbound_is_fatal() {
    let output = run_probe("device");
    assert!(!output.status.success());
    assert!(combined(&output).contains("no session bound"));
}

#[test]
fn test_output_stream_without_sink_is_fatal() {
    let output = run_probe("stdout");
    assert!(!output.status.success());
    assert!(combined(&output).contains("no stdout sink"));
}

#[test]
fn test_double_bind_is_fatal() {
    let output = run_probe("double-bind");
    assert!(!output.status.success());
    assert!(combined(&output).contains("already bound"));
}
