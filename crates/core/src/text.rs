/// Capitalizes the first letter of every word, leaving the rest untouched.
///
/// Letters, digits and `_` continue a word; anything else starts a new one, so
/// `pdf` becomes `Pdf` and `contact-email` becomes `Contact-Email`.
pub fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut at_word_start = true;

    for ch in input.chars() {
        if at_word_start && ch.is_alphabetic() {
            output.extend(ch.to_uppercase());
        } else {
            output.push(ch);
        }
        at_word_start = !(ch.is_alphanumeric() || ch == '_');
    }

    output
}

/// Case-insensitive substring test against any of the given keywords.
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    let lowered = haystack.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::{contains_any, title_case};

    #[test]
    fn title_case_capitalizes_each_word() {
        assert_eq!(title_case("pdf"), "Pdf");
        assert_eq!(title_case("ticket title"), "Ticket Title");
        assert_eq!(title_case("contact-email"), "Contact-Email");
        assert_eq!(title_case("john DOE"), "John DOE");
    }

    #[test]
    fn title_case_keeps_underscored_names_as_one_word() {
        assert_eq!(title_case("due_date"), "Due_date");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn contains_any_ignores_case() {
        assert!(contains_any("Contact_Email", &["email"]));
        assert!(!contains_any("title", &["amount", "price"]));
    }
}
