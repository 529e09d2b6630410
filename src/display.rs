//! Terminal tables for the `chainpulse` binary

use crate::cache::CacheStats;
use crate::rpc::EndpointStatus;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).add_attribute(Attribute::Bold))
        .collect()
}

pub fn endpoint_table(statuses: &[EndpointStatus]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&[
            "Endpoint",
            "Priority",
            "Health",
            "Failures",
            "Avg latency",
            "Last check",
            "URL",
        ]));

    for status in statuses {
        let health = if status.is_healthy {
            Cell::new("healthy").fg(Color::Green)
        } else {
            Cell::new("unhealthy").fg(Color::Red)
        };
        let last_check = status
            .last_health_check_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&status.name),
            Cell::new(status.priority.as_str()),
            health,
            Cell::new(status.failure_count),
            Cell::new(format!("{:.1}ms", status.avg_response_time_ms)),
            Cell::new(last_check),
            Cell::new(&status.url),
        ]);
    }

    table
}

pub fn cache_table(stats: &[CacheStats]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&[
            "Namespace",
            "Keys",
            "Hits",
            "Misses",
            "Hit rate",
            "Evictions",
            "TTL",
        ]));

    for s in stats {
        table.add_row(vec![
            Cell::new(&s.namespace),
            Cell::new(s.key_count),
            Cell::new(s.hit_count),
            Cell::new(s.miss_count),
            Cell::new(format!("{:.1}%", s.hit_rate() * 100.0)),
            Cell::new(s.eviction_count),
            Cell::new(format!("{}s", s.ttl_seconds)),
        ]);
    }

    table
}
