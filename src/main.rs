//! shell-context binary entry point.

use std::ffi::{c_char, c_int};
use std::io::Write;
use std::process::ExitCode;

use shell_context::cli::{self, Args};
use shell_context::config::Config;
use shell_context::{
    current_session, current_terminal_device, decode_raw, logging, session_println, CaptureBuffer,
    SessionConfig, SessionIo, SessionStore, TermSize, TerminalDevice, WorkerHandle,
};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'shell-context --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _ = logging::init_with_filter(config.log_filter());
    info!("shell-context v{}", env!("CARGO_PKG_VERSION"));

    match run(&config, &args) {
        Ok(code) => code,
        Err(e) => {
            error!("run failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config, args: &Args) -> shell_context::Result<ExitCode> {
    let command = if args.command.is_empty() {
        vec!["echo".to_string()]
    } else {
        args.command.clone()
    };

    let encoder = config.encoder();
    let dispatcher = config.dispatcher();
    let store = SessionStore::new();

    let mut workers = Vec::with_capacity(args.sessions);
    for n in 1..=args.sessions {
        let session = store.create(
            SessionConfig::named(format!("demo-{}", n)),
            TerminalDevice::detached(TermSize::default()),
        )?;
        let output = CaptureBuffer::new();
        let command = command.clone();

        let handle = dispatcher.spawn(
            session,
            SessionIo::captured(&output),
            move || -> shell_context::Result<c_int> {
                let buffer = encoder.encode(&command)?;
                // SAFETY: echo_main only reads its arguments.
                Ok(unsafe { buffer.invoke(echo_main) })
            },
        )?;
        workers.push((handle, output));
    }
    info!(sessions = workers.len(), "session workers started");

    let stdout = std::io::stdout();
    let outcome = report_workers(workers, &mut stdout.lock());

    let removed = store.remove_finished()?;
    info!(removed, "finished sessions cleaned up");

    Ok(if outcome? {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Join every worker and print its captured output, tagged with the session ID.
///
/// Returns whether any command exited non-zero, or the first worker error once
/// all workers have been joined.
fn report_workers<W: Write>(
    workers: Vec<(WorkerHandle<shell_context::Result<c_int>>, CaptureBuffer)>,
    out: &mut W,
) -> shell_context::Result<bool> {
    let mut failed = false;
    let mut first_error = None;
    for (handle, output) in workers {
        let id = handle.session_id();
        let outcome = handle.join().and_then(|status| status);
        for line in output.text().lines() {
            writeln!(out, "[{}] {}", id, line)?;
        }
        match outcome {
            Ok(status) => failed |= status != 0,
            Err(e) => {
                warn!(session = %id, error = %e, "session failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(failed),
    }
}

/// Built-in entry point: prints its arguments to the session's stdout.
unsafe extern "C" fn echo_main(argc: c_int, argv: *mut *mut c_char) -> c_int {
    let args = decode_raw(argv as *const *const c_char, argc);
    let session = current_session();
    let size = current_terminal_device().size();

    session_println!(
        "{} on {}x{} tty, argc={}",
        session.name().unwrap_or("unnamed"),
        size.cols,
        size.rows,
        argc
    );
    for (i, arg) in args.iter().enumerate() {
        session_println!("argv[{}] = {:?}", i, arg);
    }
    0
}
