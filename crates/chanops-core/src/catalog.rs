//! Catalog of the gateway's known tables.
//!
//! Drives the cleaner's grouping, presets and confirmation strength.

use chanops_types::table::{Importance, TableCategory, TableInfo};

pub const TABLE_CATALOG: &[TableInfo] = &[
    TableInfo {
        name: "channels",
        description: "API channel configuration",
        function: "Upstream provider credentials, endpoints and model routing",
        importance: Importance::Critical,
        category: TableCategory::Core,
        impact: "Every relayed AI request fails until channels are configured again",
        fields: &["id", "name", "type", "key", "status", "models", "base_url"],
    },
    TableInfo {
        name: "users",
        description: "User accounts",
        function: "User identities, credentials, roles and quota balances",
        importance: Importance::Critical,
        category: TableCategory::Core,
        impact: "All users lose access and their remaining balance",
        fields: &["id", "username", "password", "role", "quota", "status"],
    },
    TableInfo {
        name: "tokens",
        description: "API access tokens",
        function: "Tokens clients present when calling the gateway",
        importance: Importance::High,
        category: TableCategory::Core,
        impact: "Every client needs a newly issued token",
        fields: &["id", "user_id", "key", "name", "remain_quota", "status"],
    },
    TableInfo {
        name: "abilities",
        description: "Channel abilities",
        function: "Maps group and model pairs to the channels serving them",
        importance: Importance::High,
        category: TableCategory::Business,
        impact: "Model routing breaks until abilities are rebuilt from channels",
        fields: &["group", "model", "channel_id", "enabled", "priority"],
    },
    TableInfo {
        name: "redemptions",
        description: "Redemption codes",
        function: "Top-up codes and their redemption state",
        importance: Importance::Medium,
        category: TableCategory::Business,
        impact: "Unredeemed codes are lost",
        fields: &["id", "user_id", "key", "status", "quota"],
    },
    TableInfo {
        name: "topups",
        description: "Top-up records",
        function: "Online payment and recharge history",
        importance: Importance::Medium,
        category: TableCategory::Business,
        impact: "Payment history is lost",
        fields: &["id", "user_id", "amount", "money", "trade_no", "status"],
    },
    TableInfo {
        name: "logs",
        description: "Usage logs",
        function: "Per-request consumption records",
        importance: Importance::Low,
        category: TableCategory::Logs,
        impact: "Usage history and statistics are lost",
        fields: &["id", "user_id", "created_at", "type", "content", "model_name", "quota"],
    },
    TableInfo {
        name: "quota_data",
        description: "Quota statistics",
        function: "Usage aggregated per user and model",
        importance: Importance::Low,
        category: TableCategory::Logs,
        impact: "Usage charts start from zero",
        fields: &["id", "user_id", "model_name", "created_at", "count", "quota"],
    },
    TableInfo {
        name: "midjourneys",
        description: "Midjourney tasks",
        function: "Image generation task records",
        importance: Importance::Low,
        category: TableCategory::Logs,
        impact: "Image task history is lost",
        fields: &["id", "user_id", "mj_id", "action", "status", "progress"],
    },
    TableInfo {
        name: "tasks",
        description: "Asynchronous tasks",
        function: "Long-running generation jobs such as music and video",
        importance: Importance::Medium,
        category: TableCategory::Logs,
        impact: "In-flight tasks lose their state",
        fields: &["id", "task_id", "platform", "user_id", "status", "progress"],
    },
    TableInfo {
        name: "options",
        description: "System options",
        function: "Key/value system settings",
        importance: Importance::High,
        category: TableCategory::System,
        impact: "All settings revert to their defaults",
        fields: &["key", "value"],
    },
    TableInfo {
        name: "setups",
        description: "Setup state",
        function: "Records whether first-run setup has completed",
        importance: Importance::Critical,
        category: TableCategory::System,
        impact: "The gateway re-enters first-run setup",
        fields: &["id", "version", "initialized_at"],
    },
];

/// Log-like tables that are safe to empty.
pub const LOG_TABLES: &[&str] = &["logs", "quota_data", "midjourneys", "tasks"];

/// Log tables plus transactional business records.
pub const BUSINESS_TABLES: &[&str] = &[
    "logs",
    "quota_data",
    "midjourneys",
    "tasks",
    "redemptions",
    "topups",
];

pub fn lookup(table: &str) -> Option<&'static TableInfo> {
    TABLE_CATALOG.iter().find(|info| info.name == table)
}

pub fn importance_of(table: &str) -> Importance {
    lookup(table).map_or(Importance::Unknown, |info| info.importance)
}

pub fn category_of(table: &str) -> TableCategory {
    lookup(table).map_or(TableCategory::Unknown, |info| info.category)
}

/// Follow-up advice printed after a table has been emptied.
pub fn post_clean_note(table: &str) -> Option<&'static str> {
    match table {
        "users" => Some("User accounts were removed; create a new administrator before logging in."),
        "channels" => Some("Channels were removed; configure providers again or restore a channel backup."),
        "tokens" => Some("Tokens were removed; clients need newly issued API tokens."),
        "options" => Some("System options were removed; settings are back to their defaults."),
        "abilities" => Some("Abilities were removed; they are rebuilt when channels are saved again."),
        _ => None,
    }
}
