use scraper::ElementRef;

/// Rendered text of a cell: all descendant text, `&nbsp;` folded to spaces,
/// whitespace runs collapsed and trimmed.
pub fn extract_text(node: ElementRef) -> String {
    let raw = node.text().collect::<String>().replace('\u{a0}', " ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text nodes that are direct children of `node`, concatenated.
pub fn own_text(node: ElementRef) -> String {
    node.children()
        .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
        .collect()
}

/// Last three characters of an identifier, for log lines.
pub fn redact_identifier(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(3)..].iter().collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn extract_text_collapses_whitespace() {
        let html = Html::parse_fragment("<table><tr><td>  MATH\u{a0}101 <b>\n lab</b> </td></tr></table>");
        let td = Selector::parse("td").unwrap();
        let cell = html.select(&td).next().unwrap();
        assert_eq!(extract_text(cell), "MATH 101 lab");
    }

    #[test]
    fn own_text_skips_nested_elements() {
        let html = Html::parse_fragment("<table><tr><td>Sl.No<span>x</span></td></tr></table>");
        let td = Selector::parse("td").unwrap();
        let cell = html.select(&td).next().unwrap();
        assert_eq!(own_text(cell), "Sl.No");
    }

    #[test]
    fn redact_keeps_tail() {
        assert_eq!(redact_identifier("21L31A0501"), "...501");
        assert_eq!(redact_identifier("ab"), "...ab");
        assert_eq!(redact_identifier(""), "...");
    }
}
