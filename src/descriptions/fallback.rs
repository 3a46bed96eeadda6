//! The last resort: a generic description shaped by the word's category.

/// Generic description for a word, shaped by its category.
///
/// Unknown categories get a bare `a {word}`.
pub fn template_description(word: &str, category: &str) -> String {
    let word = word.trim();
    match category.trim().to_ascii_lowercase().as_str() {
        "everyday_objects" | "food_drink" => word.to_string(),
        "travel" => format!("a {word} travel item or object"),
        "nature_animals" => format!("a {word}"),
        "sports_hobbies" => format!("{word} sport or hobby"),
        "people_roles" => format!("a {word} person"),
        "actions" | "verbs" => format!("a person doing {word} action"),
        "adjectives" => format!("something that looks {word}"),
        "emotions" => format!(
            "a large cartoon human face showing {word} emotion, expressive eyes and mouth"
        ),
        "food" => format!("a {word} food dish on a plate"),
        "business" => format!("a {word} office supply or item"),
        "technology" => format!("a {word} electronic device"),
        "health" => format!("a {word} medical item"),
        "sports" => format!("a {word} sports equipment"),
        "music" => format!("a {word} musical instrument"),
        "entertainment" => format!("a {word} entertainment item"),
        "nature" => format!("a {word} from nature"),
        "shopping" => format!("a {word} product item"),
        "family" => format!("a cartoon {word} person portrait"),
        "education" => format!("a {word} school supply"),
        _ => format!("a {word}"),
    }
}
