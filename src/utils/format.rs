//! Short human-readable numbers for log lines

const SCALES: [(f64, &str); 3] = [(1e9, "G"), (1e6, "M"), (1e3, "k")];

/// `n` divided by the largest decimal scale it reaches, with its prefix.
fn scaled(n: usize) -> Option<(f64, &'static str)> {
    let n = n as f64;
    SCALES
        .iter()
        .find(|(scale, _)| n >= *scale)
        .map(|(scale, prefix)| (n / scale, *prefix))
}

/// Parameter count: `4.52M`, `1.10k`, `768`
pub fn format_params(n: usize) -> String {
    match scaled(n) {
        Some((v, prefix)) => format!("{:.2}{}", v, prefix),
        None => n.to_string(),
    }
}

/// Byte count: `1.5 MB`, `512 B`
pub fn format_bytes(n: usize) -> String {
    match scaled(n) {
        Some((v, prefix)) => format!("{:.1} {}B", v, prefix),
        None => format!("{} B", n),
    }
}

/// Wall-clock seconds as `h:mm:ss`
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
