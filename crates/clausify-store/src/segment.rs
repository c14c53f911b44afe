//! Heuristic segmentation of a full contract into clause-sized chunks.

/// Parts shorter than this (in characters) are treated as headings or noise.
pub const MIN_CLAUSE_CHARS: usize = 40;

/// Split contract text on blank lines.
///
/// Windows line endings are normalized first; every part is trimmed and parts
/// shorter than [`MIN_CLAUSE_CHARS`] are dropped.
pub fn split_into_clauses(full_text: &str) -> Vec<String> {
    if full_text.trim().is_empty() {
        return Vec::new();
    }

    let normalized = full_text.replace("\r\n", "\n");

    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut newlines = 0usize;

    for c in normalized.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines >= 2 {
            push_part(&mut clauses, &current);
            current.clear();
        } else if newlines == 1 {
            current.push('\n');
        }
        newlines = 0;
        current.push(c);
    }
    push_part(&mut clauses, &current);

    clauses
}

fn push_part(clauses: &mut Vec<String>, part: &str) {
    let trimmed = part.trim();
    if trimmed.chars().count() >= MIN_CLAUSE_CHARS {
        clauses.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_A: &str = "Either party may terminate this Agreement upon notice.";
    const LONG_B: &str = "Licensee shall not assign this Agreement without consent.";

    #[test]
    fn splits_on_blank_lines() {
        let text = format!("{LONG_A}\n\n{LONG_B}");
        assert_eq!(split_into_clauses(&text), vec![LONG_A, LONG_B]);
    }

    #[test]
    fn single_line_breaks_stay_inside_a_clause() {
        let text = format!("{LONG_A}\n{LONG_B}");
        assert_eq!(split_into_clauses(&text), vec![format!("{LONG_A}\n{LONG_B}")]);
    }

    #[test]
    fn drops_short_headings() {
        let text = format!("1. TERM\n\n\n{LONG_A}\r\n\r\nSIGNATURES");
        assert_eq!(split_into_clauses(&text), vec![LONG_A]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(split_into_clauses("  \n\n ").is_empty());
        assert!(split_into_clauses("").is_empty());
    }
}
