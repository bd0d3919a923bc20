//! Command-line command handlers for duskshift.
//!
//! Every command except `help` talks to the running daemon: it finds the PID
//! through the lock file and signals it. Each command lives in its own
//! submodule with its handler and help text.

pub mod help;
pub mod invert;
pub mod reload;
pub mod request;
pub mod status;
pub mod stop;

/// Names accepted as the first positional argument.
pub const COMMAND_NAMES: &[&str] = &["invert", "request", "status", "reload", "stop", "help"];

/// Calculate Levenshtein distance between two strings for similarity matching
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len2 = s2_chars.len();

    let mut previous: Vec<usize> = (0..=len2).collect();
    for (i, c1) in s1_chars.iter().enumerate() {
        let mut current = vec![i + 1; len2 + 1];
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            current[j + 1] = (previous[j + 1] + 1) // deletion
                .min(current[j] + 1) // insertion
                .min(previous[j] + cost); // substitution
        }
        previous = current;
    }

    previous[len2]
}

/// Closest known command to `unknown`, if any is within two edits.
pub fn suggest_command(unknown: &str) -> Option<&'static str> {
    let unknown = unknown.to_lowercase();
    COMMAND_NAMES
        .iter()
        .map(|name| (*name, levenshtein_distance(&unknown, name)))
        .filter(|&(_, distance)| distance <= 2)
        .min_by_key(|&(_, distance)| distance)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", "stop"), 4);
        assert_eq!(levenshtein_distance("stop", "stop"), 0);
        assert_eq!(levenshtein_distance("stpo", "stop"), 2);
        assert_eq!(levenshtein_distance("invret", "invert"), 2);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_suggest_command() {
        assert_eq!(suggest_command("inverd"), Some("invert"));
        assert_eq!(suggest_command("STATUS"), Some("status"));
        assert_eq!(suggest_command("relaod"), Some("reload"));
        assert_eq!(suggest_command("geo"), None);
    }
}
