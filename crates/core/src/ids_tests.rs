// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn request_ids_are_unique() {
    let a = RequestId::new();
    let b = RequestId::new();
    assert_ne!(a, b);
}

#[test]
fn request_id_displays_as_uuid() {
    let id = RequestId::new();
    assert_eq!(id.to_string(), id.0.to_string());
}

#[test]
fn owner_key_compares_against_str() {
    let key = OwnerKey::new("user-42");
    assert_eq!(key, "user-42");
    assert_eq!(key, *"user-42".to_string());
}

#[test]
fn workspace_key_borrows_as_str_for_map_lookup() {
    use std::collections::HashMap;
    let mut map: HashMap<WorkspaceKey, u32> = HashMap::new();
    map.insert(WorkspaceKey::new("acme/web"), 1);
    assert_eq!(map.get("acme/web"), Some(&1));
}
