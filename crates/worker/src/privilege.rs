// SPDX-License-Identifier: MIT

//! Privilege drop (spec.md §4.3 step 5, §7 no-root-after-drop invariant).

use nix::sys::stat::{umask, Mode};
use nix::unistd::{getgid, getuid, setgid, setuid, Gid, Uid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("failed to drop group privileges: {0}")]
    SetGid(#[source] nix::Error),
    #[error("failed to drop user privileges: {0}")]
    SetUid(#[source] nix::Error),
    #[error("privilege drop did not take effect: running as uid={actual_uid} gid={actual_gid}, expected uid={expected_uid} gid={expected_gid}")]
    NotDropped { expected_uid: u32, expected_gid: u32, actual_uid: u32, actual_gid: u32 },
}

/// Drop to `uid`/`gid`, unless this is the `(0, 0)` superuser-passthrough
/// sentinel used for local development. Group is dropped before user: once
/// `setuid` succeeds the process can no longer call `setgid`. Verifies the
/// drop actually took effect afterward rather than trusting the syscalls'
/// success alone (spec.md §7 no-root-after-drop invariant).
pub fn drop_privileges(uid: u32, gid: u32) -> Result<(), PrivilegeError> {
    if uid == 0 && gid == 0 {
        tracing::warn!("running with superuser passthrough, privilege drop skipped");
        return Ok(());
    }
    setgid(Gid::from_raw(gid)).map_err(PrivilegeError::SetGid)?;
    setuid(Uid::from_raw(uid)).map_err(PrivilegeError::SetUid)?;
    umask(Mode::from_bits_truncate(0o022));

    let actual_uid = getuid().as_raw();
    let actual_gid = getgid().as_raw();
    if actual_uid != uid || actual_gid != gid {
        return Err(PrivilegeError::NotDropped { expected_uid: uid, expected_gid: gid, actual_uid, actual_gid });
    }
    Ok(())
}

#[cfg(test)]
#[path = "privilege_tests.rs"]
mod tests;
