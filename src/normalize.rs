//! Canonical text normalisation shared by every consumer of session data.

use once_cell::sync::Lazy;
use regex::Regex;

static INSTRUCTOR_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",\s*|\s+e\s+").expect("instructor separator pattern is valid")
});

const INSTRUCTOR_ALIASES: &[(&str, &str)] = &[("Peu", "Peu Beck")];

/// Maps free-text times such as `5:00`, `05h` or `14:30` onto an hour bucket (`05h`, `14h`).
pub fn normalize_time(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| *c != 'h' && *c != 'H').collect();
    let hour = stripped.split(':').next().unwrap_or_default().trim();

    let mut bucket = String::with_capacity(3);
    for _ in hour.chars().count()..2 {
        bucket.push('0');
    }
    bucket.push_str(hour);
    bucket.push('h');
    bucket
}

/// Splits an instructor field on commas or the conjunction " e " and resolves known aliases.
pub fn normalize_instructors(raw: &str) -> Vec<String> {
    INSTRUCTOR_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            INSTRUCTOR_ALIASES
                .iter()
                .find(|(alias, _)| *alias == name)
                .map(|(_, canonical)| (*canonical).to_string())
                .unwrap_or_else(|| name.to_string())
        })
        .collect()
}

/// Number of paid instructors for a session; never below one.
pub fn instructor_count(names: &[String]) -> usize {
    names.len().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn time_variants_share_a_bucket() {
        assert_eq!(normalize_time("5:00"), "05h");
        assert_eq!(normalize_time("05h"), "05h");
        assert_eq!(normalize_time("14:30"), "14h");
        assert_eq!(normalize_time("7H"), "07h");
        assert_eq!(normalize_time(" 18h00 "), "1800h");
    }

    #[test]
    fn empty_time_degrades_to_midnight_bucket() {
        assert_eq!(normalize_time(""), "00h");
    }

    #[test]
    fn instructors_split_on_comma_and_conjunction() {
        assert_eq!(
            normalize_instructors("Ana, Bruno e Carla"),
            vec!["Ana", "Bruno", "Carla"]
        );
        assert_eq!(normalize_instructors("Ana,Bruno"), vec!["Ana", "Bruno"]);
    }

    #[test]
    fn alias_resolves_bare_token_only() {
        assert_eq!(normalize_instructors("Peu"), vec!["Peu Beck"]);
        assert_eq!(
            normalize_instructors("Peu e Ana"),
            vec!["Peu Beck", "Ana"]
        );
        assert_eq!(normalize_instructors("Peu Beck"), vec!["Peu Beck"]);
    }

    #[test]
    fn names_containing_e_are_not_split() {
        assert_eq!(normalize_instructors("Rene Eduardo"), vec!["Rene Eduardo"]);
    }

    #[test]
    fn blank_instructor_field_counts_as_one() {
        let names = normalize_instructors("  ,  ");
        assert!(names.is_empty());
        assert_eq!(instructor_count(&names), 1);
        assert_eq!(instructor_count(&normalize_instructors("")), 1);
    }

    proptest! {
        #[test]
        fn time_normalisation_is_idempotent(raw in "[0-9hH: ]{0,8}") {
            let once = normalize_time(&raw);
            prop_assert_eq!(normalize_time(&once), once);
        }

        #[test]
        fn instructor_count_is_positive(raw in "[A-Za-z ,]{0,24}") {
            prop_assert!(instructor_count(&normalize_instructors(&raw)) >= 1);
        }
    }
}
