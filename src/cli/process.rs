use std::{env, path::Path, process::Stdio};

use anyhow::Result;
use sysinfo::{get_current_pid, Signal, System};

/// Terminates every other process running this executable. SIGTERM first so
/// the daemon can finish its current write.
pub fn kill_previous_servers(name: &Path) {
    let system = System::new_all();
    let current_id = get_current_pid().unwrap();
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
}

/// Intended for shutting down a previous daemon and starting a new one. For
/// simplicity sake it operates using a detached process running the `serve`
/// command.
pub fn restart_server() -> Result<()> {
    // The executable that is currently running is reused. It's not the best
    // option but it will do the job in most cases.
    let process_name = env::current_exe().expect("Can't operate without an executable");
    kill_previous_servers(&process_name);
    let mut command = std::process::Command::new(process_name);
    command.args(["serve"]);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    println!("Spawning");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}
