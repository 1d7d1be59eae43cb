use anyhow::{Context, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::db::{execute_async, kv, DbPool};
use crate::types::{Actor, AuditEntry};

/// Append-only list of audit entries.
pub const AUDITS_KEY: &str = "audits";

pub const NODE_CREATE: &str = "node:create";
pub const NODE_DELETE: &str = "node:delete";

fn entry(actor: &Actor, action: &str) -> Result<AuditEntry> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("Failed to format audit timestamp")?;

    Ok(AuditEntry {
        user_id: actor.user_id.clone(),
        username: actor.username.clone(),
        action: action.to_string(),
        ip: actor.ip.clone(),
        timestamp,
    })
}

/// Record an admin action. Failing to store the entry is logged, never
/// propagated: the action itself has already happened.
pub async fn record(db: &DbPool, actor: &Actor, action: &str) {
    info!(
        target: "audit",
        user_id = %actor.user_id,
        username = %actor.username,
        ip = %actor.ip,
        "{}",
        action
    );

    let result = match entry(actor, action) {
        Ok(entry) => {
            execute_async(db, move |conn| kv::list_push(conn, AUDITS_KEY, entry)).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!("Failed to store audit entry {}: {:#}", action, e);
    }
}
