use anyhow::Result;
use rusqlite::Connection;
use serde_json::Value;

use crate::db::kv;
use crate::types::PanelInfo;

pub const NAME_KEY: &str = "name";
pub const LOGO_KEY: &str = "logo";

/// Panel branding, falling back to `default_name` and no logo.
pub fn panel_info(conn: &Connection, default_name: &str) -> Result<PanelInfo> {
    let name: Option<String> = kv::get(conn, NAME_KEY)?;
    let logo: Option<Value> = kv::get(conn, LOGO_KEY)?;

    Ok(PanelInfo {
        name: name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name.to_string()),
        logo: logo.unwrap_or(Value::Bool(false)),
    })
}
