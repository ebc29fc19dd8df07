//! Process-level setup: privilege drop, PID file, daemonization, titles.
use crate::http_error::StartupError;
use nix::unistd::{dup2, fork, setgid, setsid, setuid, ForkResult, Gid, Group, Uid, User};
use std::ffi::CString;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::Path;

/// Switches group, then user, each given as a numeric id or a name.
/// Runs after the sockets are bound and before any traffic is served, so a
/// server started as root can listen on a privileged port and still handle
/// requests unprivileged.
///
/// # Errors
/// Returns an error when the name does not exist or the switch fails.
pub fn drop_privileges(
    user: Option<&str>,
    group: Option<&str>,
) -> Result<(), StartupError> {
    if let Some(group) = group {
        let gid = match group.parse::<u32>() {
            Ok(id) => Gid::from_raw(id),
            Err(..) => Group::from_name(group)
                .map_err(|e| StartupError::PrivilegeDrop(format!("group {group:?}: {e}")))?
                .ok_or_else(|| StartupError::PrivilegeDrop(format!("unknown group {group:?}")))?
                .gid,
        };
        setgid(gid).map_err(|e| StartupError::PrivilegeDrop(format!("setgid {gid}: {e}")))?;
        crate::log::info("switched group", crate::log::tag("group", group.to_string()));
    }
    if let Some(user) = user {
        let uid = match user.parse::<u32>() {
            Ok(id) => Uid::from_raw(id),
            Err(..) => User::from_name(user)
                .map_err(|e| StartupError::PrivilegeDrop(format!("user {user:?}: {e}")))?
                .ok_or_else(|| StartupError::PrivilegeDrop(format!("unknown user {user:?}")))?
                .uid,
        };
        setuid(uid).map_err(|e| StartupError::PrivilegeDrop(format!("setuid {uid}: {e}")))?;
        crate::log::info("switched user", crate::log::tag("user", user.to_string()));
    }
    Ok(())
}

/// Writes the process id as decimal text. Written once at startup.
///
/// # Errors
/// Returns an error when the file cannot be written.
pub fn write_pid_file(path: &Path) -> Result<(), StartupError> {
    std::fs::write(path, std::process::id().to_string()).map_err(StartupError::PidFile)
}

/// Detaches from the controlling terminal: double fork with `setsid`
/// between, stdin from `/dev/null`, stdout and stderr appended to
/// `error_log` or discarded.
///
/// # Errors
/// Returns an error when a fork fails or the log file cannot be opened.
pub fn daemonize(error_log: Option<&Path>) -> Result<(), StartupError> {
    let fork_err = |e: nix::errno::Errno| StartupError::Daemonize(format!("fork: {e}"));
    match unsafe { fork() }.map_err(fork_err)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }
    setsid().map_err(|e| StartupError::Daemonize(format!("setsid: {e}")))?;
    match unsafe { fork() }.map_err(fork_err)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }
    let devnull = std::fs::File::open("/dev/null")
        .map_err(|e| StartupError::Daemonize(format!("/dev/null: {e}")))?;
    let out = match error_log {
        Some(path) => std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StartupError::Daemonize(format!("{}: {e}", path.display())))?,
        None => std::fs::OpenOptions::new()
            .write(true)
            .open("/dev/null")
            .map_err(|e| StartupError::Daemonize(format!("/dev/null: {e}")))?,
    };
    let dup_err = |e: nix::errno::Errno| StartupError::Daemonize(format!("dup2: {e}"));
    dup2(devnull.as_raw_fd(), 0).map_err(dup_err)?;
    dup2(out.as_raw_fd(), 1).map_err(dup_err)?;
    dup2(out.as_raw_fd(), 2).map_err(dup_err)?;
    // Leak the originals; fds 0-2 now own the descriptions.
    let _ = devnull.into_raw_fd();
    let _ = out.into_raw_fd();
    Ok(())
}

/// Labels the process in `ps` output, like `prefork master`.
/// Failures are ignored; the title is cosmetic.
pub fn set_proc_title(role: &str) {
    if let Ok(name) = CString::new(format!("prefork {role}")) {
        let _ignored = nix::sys::prctl::set_name(&name);
    }
}
