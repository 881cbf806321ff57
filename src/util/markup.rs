/// Businessmap renders descriptions and comments as HTML, so plain-text
/// line breaks have to become `<br>`.
pub fn line_breaks_to_markup(text: &str) -> String {
    text.replace("\r\n", "<br>").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_both_line_endings() {
        assert_eq!(line_breaks_to_markup("a\nb\r\nc"), "a<br>b<br>c");
    }

    #[test]
    fn leaves_lone_carriage_returns() {
        assert_eq!(line_breaks_to_markup("a\rb"), "a\rb");
    }
}
