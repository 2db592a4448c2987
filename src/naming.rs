//! Naming convention between URL path segments and entity type names.
//!
//! This is a plain string convention, not an inflection engine: the singular
//! form is the plural with every trailing `s` removed. Words like "address" or
//! "glass" do not survive; pick path segments that do.

/// Singular form of a plural path segment. e.g. "albums" -> "album", "media_types" -> "media_type".
pub fn singular(plural: &str) -> String {
    plural.trim_end_matches('s').to_string()
}

/// Capitalize the first letter of each alphabetic run and lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Type name used in messages. e.g. "media_types" -> "MediaType".
pub fn type_name(plural: &str) -> String {
    title_case(&singular(plural)).replace('_', "")
}

/// Display tag used to group endpoints. e.g. "media_types" -> "Media Types".
pub fn tag(plural: &str) -> String {
    title_case(plural).replace('_', " ")
}
