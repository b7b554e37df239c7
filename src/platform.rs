use anyhow::Result;
use crossbeam_channel::Sender;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, consts::SIGUSR1, iterator::Signals};

#[cfg(all(
    unix,
    any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )
))]
use signal_hook::consts::SIGINFO;

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Exit code of the signal that requested shutdown, 0 while none arrived
static TERMINATION_CODE: AtomicI32 = AtomicI32::new(0);

/// Control messages sent by the signal handler to running scans
#[derive(Debug, Clone)]
pub enum Ctrl {
    Shutdown { immediate: bool },
    PrintStats,
}

/// Signal handler for graceful shutdown
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

fn request_shutdown(sender: &Sender<Ctrl>, code: ExitCode, shutdown_count: &mut usize) {
    TERMINATION_CODE.store(code as i32, Ordering::Relaxed);
    *shutdown_count += 1;
    let immediate = *shutdown_count > 1;
    let _ = sender.send(Ctrl::Shutdown { immediate });
    // A second signal means the user does not want to wait
    if immediate {
        code.exit();
    }
}

impl SignalHandler {
    pub fn new(ctrl_sender: Sender<Ctrl>) -> Result<Self> {
        #[cfg(unix)]
        {
            #[allow(unused_mut)]
            let mut signals_to_handle = vec![SIGINT, SIGTERM, SIGUSR1];

            // CTRL-T on BSD-like systems including macOS
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly"
            ))]
            signals_to_handle.push(SIGINFO);

            let mut signals = Signals::new(&signals_to_handle)?;

            let sender = ctrl_sender.clone();
            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    match sig {
                        SIGINT => request_shutdown(&sender, ExitCode::SignalInt, &mut shutdown_count),
                        SIGTERM => {
                            eprintln!(
                                "{}",
                                crate::config::format_warning_message_auto(
                                    "Received SIGTERM, stopping scan..."
                                )
                            );
                            request_shutdown(&sender, ExitCode::SignalTerm, &mut shutdown_count);
                        }
                        SIGUSR1 => {
                            let _ = sender.send(Ctrl::PrintStats);
                        }
                        #[cfg(any(
                            target_os = "macos",
                            target_os = "freebsd",
                            target_os = "openbsd",
                            target_os = "netbsd",
                            target_os = "dragonfly"
                        ))]
                        SIGINFO => {
                            let _ = sender.send(Ctrl::PrintStats);
                        }
                        _ => {}
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let term_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let sender = ctrl_sender.clone();
            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        request_shutdown(&sender, ExitCode::SignalInt, &mut shutdown_count);
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }

    /// Exit code matching the signal that requested shutdown, if any
    pub fn termination_exit_code() -> Option<ExitCode> {
        match TERMINATION_CODE.load(Ordering::Relaxed) {
            130 => Some(ExitCode::SignalInt),
            143 => Some(ExitCode::SignalTerm),
            _ => None,
        }
    }
}

/// Safe wrapper for writing to stdout that handles broken pipes and other I/O errors
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }

    /// Write a line to stdout, exiting quietly if the reader went away
    pub fn writeln(&mut self, data: &str) -> Result<()> {
        match writeln!(self.stdout, "{}", data) {
            Ok(()) => Ok(()),
            Err(e) if Self::is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {}", e)),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self.stdout.flush() {
            Ok(()) => Ok(()),
            Err(e) if Self::is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to flush stdout: {}", e)),
        }
    }

    fn is_broken_pipe(e: &io::Error) -> bool {
        #[cfg(unix)]
        {
            e.kind() == io::ErrorKind::BrokenPipe
        }
        #[cfg(windows)]
        {
            e.kind() == io::ErrorKind::BrokenPipe
                || e.raw_os_error() == Some(232) // ERROR_NO_DATA
                || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
        }
    }
}
