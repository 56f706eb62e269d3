//! HTTP file generator - converts failing scenarios to .http format

use crate::report::{RequestSnapshot, ScenarioResult};

/// Generate .http file content for every scenario that carries a request snapshot.
pub fn to_http_file(results: &[ScenarioResult], base_url_var: &str) -> String {
    let with_request: Vec<(&ScenarioResult, &RequestSnapshot)> = results
        .iter()
        .filter_map(|r| r.request.as_ref().map(|req| (r, req)))
        .collect();

    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated reproduction cases ({} scenarios)",
        with_request.len()
    ));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for (idx, (result, request)) in with_request.iter().enumerate() {
        lines.push(format!(
            "### [{idx}] {} - {} expected {}{}",
            result.status,
            result.name,
            result.expected_status,
            result
                .actual_status
                .map(|s| format!(", got {s}"))
                .unwrap_or_default()
        ));

        let url = if request.path.starts_with("http") {
            request.path.clone()
        } else {
            format!("{{{{{base_url_var}}}}}{}", request.path)
        };
        lines.push(format!("{} {}", request.method, url));

        for (key, value) in &request.headers {
            if !matches!(key.to_lowercase().as_str(), "host" | "content-length") {
                lines.push(format!("{key}: {value}"));
            }
        }

        if let Some(body) = &request.body {
            if !request
                .headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case("content-type"))
            {
                lines.push("Content-Type: application/json".to_string());
            }
            lines.push(String::new());
            lines.push(body.clone());
        }

        lines.push(String::new());
        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}
