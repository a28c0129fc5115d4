// Best-effort guess for artifacts that do not declare their index columns.
// Keyed by the leading header names, with any `-suffix` (e.g. `pedestrianId-PID5`)
// stripped before matching. The longest matching prefix wins.
const KNOWN_PREFIXES: &[(&[&str], usize)] = &[
    (&["timeStep", "pedestrianId"], 2),
    (&["timeStep", "faceId"], 2),
    (&["timeStep", "x", "y"], 3),
    (&["simTime", "pedestrianId"], 2),
    (&["x", "y"], 2),
    (&["timeStep"], 1),
    (&["simTime"], 1),
    (&["pedestrianId"], 1),
    (&["faceId"], 1),
];

/// Number of leading index columns guessed from a header row, defaulting to 1.
pub fn fallback_index_columns<S: AsRef<str>>(header: &[S]) -> usize {
    let names: Vec<&str> = header.iter().map(|name| base_name(name.as_ref())).collect();
    KNOWN_PREFIXES
        .iter()
        .filter(|(prefix, _)| names.len() >= prefix.len() && names.iter().zip(prefix.iter()).all(|(a, b)| a == b))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, count)| *count)
        .unwrap_or(1)
}

fn base_name(column: &str) -> &str {
    column.split('-').next().unwrap_or(column).trim()
}
