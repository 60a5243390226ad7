use crate::message::Segment;

/// Join every NTE-3 line attached to an observation with single spaces.
///
/// Segment and line order are preserved and blank lines are skipped. Returns
/// `None` rather than an empty string when no comment carries text.
pub fn aggregate_comments(comments: &[&Segment]) -> Option<String> {
    let mut joined = String::new();
    for nte in comments {
        let Some(field) = nte.field(3) else {
            continue;
        };
        for line in field.repetitions() {
            let text = line.component(1).unwrap_or("");
            if text.trim().is_empty() {
                continue;
            }
            if !joined.is_empty() {
                joined.push(' ');
            }
            joined.push_str(text);
        }
    }

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
