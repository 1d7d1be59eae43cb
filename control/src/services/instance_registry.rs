use anyhow::Result;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::db::kv;
use crate::types::Instance;

/// Global list of instance records.
pub const INSTANCES_KEY: &str = "instances";

pub fn instance_key(instance_id: &str) -> String {
    format!("{}_instance", instance_id)
}

pub fn user_instances_key(user_id: &str) -> String {
    format!("{}_instances", user_id)
}

/// List all instances
pub fn list_instances(conn: &Connection) -> Result<Vec<Instance>> {
    kv::get_list(conn, INSTANCES_KEY)
}

/// Number of instances placed on each listed node.
///
/// Every id in `node_ids` gets an entry, zero included. Instances pointing
/// at unlisted nodes are not counted anywhere.
pub fn instance_counts(node_ids: &[String], instances: &[Instance]) -> BTreeMap<String, usize> {
    node_ids
        .iter()
        .map(|id| {
            let count = instances.iter().filter(|i| &i.node.id == id).count();
            (id.clone(), count)
        })
        .collect()
}

/// Remove every instance placed on `node_id` from the global list, returning
/// the removed records.
pub fn take_node_instances(conn: &mut Connection, node_id: &str) -> Result<Vec<Instance>> {
    kv::list_remove(conn, INSTANCES_KEY, |i: &Instance| i.node.id == node_id)
}

/// Delete the standalone `<id>_instance` record
pub fn delete_instance_record(conn: &Connection, instance_id: &str) -> Result<bool> {
    kv::delete(conn, &instance_key(instance_id))
}

/// Drop an instance from its owner's index. Returns whether it was present.
///
/// Index entries are opaque records owned by the deployment side; only their
/// `Id` is inspected.
pub fn remove_from_user_index(
    conn: &mut Connection,
    user_id: &str,
    instance_id: &str,
) -> Result<bool> {
    let removed = kv::list_remove(conn, &user_instances_key(user_id), |entry: &Value| {
        entry.get("Id").and_then(Value::as_str) == Some(instance_id)
    })?;
    Ok(!removed.is_empty())
}
