// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn socket_path_includes_workspace_key_and_random_suffix() {
    let dir = PathBuf::from("/tmp/pool/sockets");
    let ws: WorkspaceKey = "tenant-42".into();
    let a = socket_path_for(&dir, &ws);
    let b = socket_path_for(&dir, &ws);

    assert!(a.starts_with(&dir));
    assert!(a.to_string_lossy().contains("tenant-42-"));
    assert_ne!(a, b, "two calls must not collide on the same socket name");
}

#[tokio::test]
async fn process_spawner_launches_a_real_child_and_sets_the_contract_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("echo_env.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\nprintf '%s\\n' \"$WORKER_SOCKET_PATH\" \"$WORKER_WORKSPACE_KEY\" \"$WORKER_SESSIONS_BASE_DIR\"\n",
    )
    .expect("write script");
    let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
    std::fs::set_permissions(&script, perms).expect("chmod");

    let spawner = ProcessSpawner { worker_entry_path: script, sessions_base_dir: dir.path().join("sessions") };
    let credentials = WorkspaceCredentials {
        uid: 0,
        gid: 0,
        cwd: dir.path().to_path_buf(),
        workspace_key: "ws".into(),
    };
    let socket_path = dir.path().join("ws.sock");
    let spawned = spawner.spawn(&credentials, &socket_path).await.expect("spawn");
    assert!(spawned.pid > 0);

    let mut child = spawned.child;
    let status = child.wait().await.expect("wait");
    assert!(status.success());
}
