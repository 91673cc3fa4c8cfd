/// Split a reply into paragraphs on blank lines. Empty paragraphs are
/// dropped and each paragraph is trimmed.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                chunks.push(text[s..end].trim());
            }
        } else {
            if start.is_none() {
                start = Some(offset);
            }
            end = offset + line.len();
        }
        offset += line.len();
    }
    if let Some(s) = start {
        chunks.push(text[s..end].trim());
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_paragraph() {
        assert_eq!(split_paragraphs("hello"), vec!["hello"]);
        assert_eq!(split_paragraphs("line one\nline two"), vec!["line one\nline two"]);
    }

    #[test]
    fn test_split_on_blank_lines() {
        let text = "First.\n\nSecond\nstill second.\n\n\n   \nThird.\n";
        assert_eq!(
            split_paragraphs(text),
            vec!["First.", "Second\nstill second.", "Third."]
        );
    }

    #[test]
    fn test_split_crlf_and_edges() {
        let text = "\r\n\r\nA\r\n\r\nB\r\n";
        assert_eq!(split_paragraphs(text), vec!["A", "B"]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs("\n\n  \n").is_empty());
    }

    #[test]
    fn test_split_multibyte() {
        assert_eq!(split_paragraphs("¡Hola! 👋\n\nÇa va?"), vec!["¡Hola! 👋", "Ça va?"]);
    }
}
