use std::process::ExitCode;

use hw_affinity::{ logical_processors, run, sys, Notifier, CANDIDATES };

#[cfg(windows)]
fn notifier() -> impl Notifier {
    sys::MessageBoxNotifier
}

#[cfg(not(windows))]
fn notifier() -> impl Notifier {
    hw_affinity::TerminalNotifier::stdio()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut notifier = notifier();
    match
        run(
            &sys::HostPrivilege,
            &sys::HostProcesses,
            &mut notifier,
            CANDIDATES,
            logical_processors()
        )
    {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            log::error!("{}", err);
            ExitCode::from(2)
        }
    }
}
