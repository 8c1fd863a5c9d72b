//! Prometheus text exposition of the current status.
//!
//! Renders a [`StatusSnapshot`] so the status page itself can be scraped and
//! alerted on.

use crate::snapshot::StatusSnapshot;

/// Escape a label value per the exposition format.
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render a snapshot into Prometheus text format.
///
/// Before the first poll cycle completes `statusgrid_ready` is 0 and the
/// snapshot age is omitted rather than reported as zero.
pub fn render_prometheus(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# HELP statusgrid_ready Whether a poll cycle has completed (1) or not (0).\n");
    out.push_str("# TYPE statusgrid_ready gauge\n");
    out.push_str(&format!("statusgrid_ready {}\n", u8::from(snapshot.is_ready())));

    out.push_str("# HELP statusgrid_service_up Whether the service is passing (1) or not (0).\n");
    out.push_str("# TYPE statusgrid_service_up gauge\n");
    for r in snapshot.results.iter() {
        out.push_str(&format!(
            "statusgrid_service_up{{service=\"{}\",group=\"{}\"}} {}\n",
            escape_label(r.name()),
            escape_label(r.group_name()),
            u8::from(r.status)
        ));
    }

    out.push_str("# HELP statusgrid_service_value Last value returned by the service's query.\n");
    out.push_str("# TYPE statusgrid_service_value gauge\n");
    for r in snapshot.results.iter() {
        if let Some(value) = r.value {
            out.push_str(&format!(
                "statusgrid_service_value{{service=\"{}\",group=\"{}\"}} {}\n",
                escape_label(r.name()),
                escape_label(r.group_name()),
                format_value(value)
            ));
        }
    }

    out.push_str("# HELP statusgrid_outage_level Aggregate outage: 0 none, 1 partial, 2 full.\n");
    out.push_str("# TYPE statusgrid_outage_level gauge\n");
    out.push_str(&format!("statusgrid_outage_level {}\n", snapshot.outage.level()));

    out.push_str("# HELP statusgrid_services_total Number of configured services.\n");
    out.push_str("# TYPE statusgrid_services_total gauge\n");
    out.push_str(&format!("statusgrid_services_total {}\n", snapshot.results.len()));

    out.push_str("# HELP statusgrid_services_passing Number of passing services.\n");
    out.push_str("# TYPE statusgrid_services_passing gauge\n");
    out.push_str(&format!("statusgrid_services_passing {}\n", snapshot.passing()));

    out.push_str(
        "# HELP statusgrid_snapshot_age_seconds Seconds since the cached results were captured.\n",
    );
    out.push_str("# TYPE statusgrid_snapshot_age_seconds gauge\n");
    if snapshot.is_ready() {
        out.push_str(&format!(
            "statusgrid_snapshot_age_seconds {}\n",
            snapshot.age.as_secs()
        ));
    }

    out
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}
