use anyhow::{Context, Result};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::kv;
use crate::types::{Node, NodeSpec, NodeStatus};

/// Global list of node ids.
pub const NODES_KEY: &str = "nodes";

pub fn node_key(node_id: &str) -> String {
    format!("{}_node", node_id)
}

/// Create a node record in `Unconfigured` state and add it to the node list.
pub fn create_node(conn: &mut Connection, spec: &NodeSpec) -> Result<Node> {
    let node = Node {
        id: Uuid::new_v4().to_string(),
        name: spec.name.clone(),
        tags: spec.tags.clone(),
        ram: spec.ram,
        disk: spec.disk,
        processor: spec.processor,
        address: spec.address.clone(),
        port: spec.port,
        api_key: None,
        configure_key: Some(Uuid::new_v4().to_string()),
        status: NodeStatus::Unconfigured,
        version_family: None,
        version_release: None,
        remote: None,
    };

    kv::transaction(conn, |tx| {
        kv::set(tx, &node_key(&node.id), &node)?;
        let mut ids: Vec<String> = kv::get_list(tx, NODES_KEY)?;
        ids.push(node.id.clone());
        kv::set(tx, NODES_KEY, &ids)
    })
    .context("Failed to insert node")?;

    Ok(node)
}

/// Get a node record by ID
pub fn get_node(conn: &Connection, node_id: &str) -> Result<Option<Node>> {
    kv::get(conn, &node_key(node_id))
}

/// List all node ids in creation order
pub fn list_node_ids(conn: &Connection) -> Result<Vec<String>> {
    kv::get_list(conn, NODES_KEY)
}

/// Load the record of every listed node, in list order.
///
/// A listed id without a record means the store is inconsistent; that is
/// reported as an error rather than silently skipped.
pub fn load_nodes(conn: &Connection, node_ids: &[String]) -> Result<Vec<Node>> {
    node_ids
        .iter()
        .map(|id| {
            get_node(conn, id)?
                .with_context(|| format!("Node {} is listed but has no record", id))
        })
        .collect()
}

/// Resolve a node that is both listed and stored.
pub fn find_listed_node(conn: &Connection, node_id: &str) -> Result<Option<Node>> {
    if !list_node_ids(conn)?.iter().any(|id| id == node_id) {
        return Ok(None);
    }
    get_node(conn, node_id)
}

/// Replace a node wholesale from an edit form.
///
/// Returns `None` when no record exists under `node_id`. The new record keeps
/// only the id; its status is reset to `Unknown` until the next probe.
pub fn replace_node(
    conn: &mut Connection,
    node_id: &str,
    spec: &NodeSpec,
    api_key: Option<String>,
) -> Result<Option<Node>> {
    kv::transaction(conn, |tx| {
        if get_node(tx, node_id)?.is_none() {
            return Ok(None);
        }

        let node = Node {
            id: node_id.to_string(),
            name: spec.name.clone(),
            tags: spec.tags.clone(),
            ram: spec.ram,
            disk: spec.disk,
            processor: spec.processor,
            address: spec.address.clone(),
            port: spec.port,
            api_key,
            configure_key: None,
            status: NodeStatus::Unknown,
            version_family: None,
            version_release: None,
            remote: None,
        };
        kv::set(tx, &node_key(node_id), &node)?;
        Ok(Some(node))
    })
}

/// Write probe-derived fields onto the stored record.
///
/// Only `status`, `versionFamily`, `versionRelease` and `remote` are taken
/// from `probed`, so an edit that landed while the probe was in flight is not
/// overwritten. A record deleted in the meantime stays deleted; `probed` is
/// then returned as is.
pub fn store_probe_result(conn: &mut Connection, probed: &Node) -> Result<Node> {
    kv::transaction(conn, |tx| {
        let key = node_key(&probed.id);
        let Some(mut stored) = kv::get::<Node>(tx, &key)? else {
            return Ok(probed.clone());
        };

        stored.status = probed.status;
        stored.version_family = probed.version_family;
        stored.version_release = probed.version_release.clone();
        stored.remote = probed.remote.clone();
        kv::set(tx, &key, &stored)?;
        Ok(stored)
    })
}

/// Delete a node record and drop its id from the node list
pub fn remove_node(conn: &mut Connection, node_id: &str) -> Result<()> {
    kv::transaction(conn, |tx| {
        kv::delete(tx, &node_key(node_id))?;
        let mut ids: Vec<String> = kv::get_list(tx, NODES_KEY)?;
        ids.retain(|id| id != node_id);
        kv::set(tx, NODES_KEY, &ids)
    })
    .context("Failed to delete node")
}


#[cfg(test)]
mod tests {
    use super::testing::test_spec;
    use super::*;
    use crate::db::testing::temp_pool;

    #[test]
    fn test_create_node_is_unconfigured_and_listed() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();

        let node = create_node(&mut conn, &test_spec("n1")).unwrap();

        assert_eq!(node.status, NodeStatus::Unconfigured);
        assert!(node.api_key.is_none());
        assert!(node.configure_key.is_some());
        assert_ne!(node.configure_key.as_deref(), Some(node.id.as_str()));
        assert_eq!(list_node_ids(&conn).unwrap(), vec![node.id.clone()]);
        assert_eq!(get_node(&conn, &node.id).unwrap(), Some(node));
    }

    #[test]
    fn test_created_ids_are_unique() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();

        let a = create_node(&mut conn, &test_spec("a")).unwrap();
        let b = create_node(&mut conn, &test_spec("b")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(list_node_ids(&conn).unwrap(), vec![a.id, b.id]);
    }

    #[test]
    fn test_load_nodes_fails_on_dangling_id() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();
        let node = create_node(&mut conn, &test_spec("a")).unwrap();
        kv::delete(&conn, &node_key(&node.id)).unwrap();

        let err = load_nodes(&conn, &[node.id.clone()]).unwrap_err();
        assert!(err.to_string().contains("has no record"));
    }

    #[test]
    fn test_find_listed_node_requires_list_membership() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();
        let node = create_node(&mut conn, &test_spec("a")).unwrap();

        kv::set(&conn, NODES_KEY, &Vec::<String>::new()).unwrap();

        assert!(find_listed_node(&conn, &node.id).unwrap().is_none());
        assert!(get_node(&conn, &node.id).unwrap().is_some());
    }

    #[test]
    fn test_replace_node_resets_status_and_drops_configure_key() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();
        let node = create_node(&mut conn, &test_spec("a")).unwrap();

        let mut spec = test_spec("renamed");
        spec.tags = vec!["y".to_string(), "z".to_string()];
        let replaced = replace_node(&mut conn, &node.id, &spec, Some("key".to_string()))
            .unwrap()
            .unwrap();

        assert_eq!(replaced.id, node.id);
        assert_eq!(replaced.name, "renamed");
        assert_eq!(replaced.tags, vec!["y", "z"]);
        assert_eq!(replaced.api_key.as_deref(), Some("key"));
        assert_eq!(replaced.status, NodeStatus::Unknown);
        assert!(replaced.configure_key.is_none());
    }

    #[test]
    fn test_replace_unknown_node_writes_nothing() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();

        let result = replace_node(&mut conn, "ghost", &test_spec("a"), None).unwrap();
        assert!(result.is_none());
        assert!(get_node(&conn, "ghost").unwrap().is_none());
    }

    #[test]
    fn test_store_probe_result_keeps_concurrent_edit() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();
        let node = create_node(&mut conn, &test_spec("a")).unwrap();

        let mut probed = node.clone();
        probed.status = NodeStatus::Online;
        probed.version_family = Some(1);

        replace_node(&mut conn, &node.id, &test_spec("edited"), None).unwrap();
        let stored = store_probe_result(&mut conn, &probed).unwrap();

        assert_eq!(stored.name, "edited");
        assert_eq!(stored.status, NodeStatus::Online);
        assert_eq!(stored.version_family, Some(1));
    }

    #[test]
    fn test_store_probe_result_does_not_resurrect() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();
        let node = create_node(&mut conn, &test_spec("a")).unwrap();
        remove_node(&mut conn, &node.id).unwrap();

        store_probe_result(&mut conn, &node).unwrap();
        assert!(get_node(&conn, &node.id).unwrap().is_none());
    }

    #[test]
    fn test_remove_node_keeps_other_entries() {
        let (pool, _dir) = temp_pool();
        let mut conn = pool.get().unwrap();
        let a = create_node(&mut conn, &test_spec("a")).unwrap();
        let b = create_node(&mut conn, &test_spec("b")).unwrap();

        remove_node(&mut conn, &a.id).unwrap();

        assert!(get_node(&conn, &a.id).unwrap().is_none());
        assert_eq!(list_node_ids(&conn).unwrap(), vec![b.id]);
    }
}
