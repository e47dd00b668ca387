/// Make a server-reported filename safe to offer in a save dialog
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "converted".to_string()
    } else {
        trimmed.to_string()
    }
}
