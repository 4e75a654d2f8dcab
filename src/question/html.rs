//! HTML entity decoding for upstream question text.
//!
//! Open Trivia DB returns question and answer text HTML-encoded by default
//! (`Who wrote &quot;Dune&quot;?`). Text is decoded in a single pass over the
//! full HTML5 entity set, so `&amp;quot;` becomes `&quot;` and not `"`.

/// Decode HTML character references. Unknown entities are kept verbatim.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_and_numeric_entities() {
        assert_eq!(
            unescape("Who wrote &quot;Dune&quot;? It&#039;s &eacute;pique &amp; long"),
            "Who wrote \"Dune\"? It's épique & long"
        );
        assert_eq!(unescape("&#x41;&#X42;&#67;"), "ABC");
    }

    #[test]
    fn test_html5_entities() {
        assert_eq!(unescape("&Omega; &alpha; &beta;"), "Ω α β");
        assert_eq!(unescape("Pok&eacute;mon&lrm;"), "Pokémon\u{200e}");
        assert_eq!(unescape("&Omega;&rlm;&oelig;&Scaron;"), "Ω\u{200f}œŠ");
    }

    #[test]
    fn test_single_pass() {
        assert_eq!(unescape("&amp;quot;"), "&quot;");
    }

    #[test]
    fn test_plain_text_kept() {
        assert_eq!(unescape("AT&T"), "AT&T");
        assert_eq!(unescape("Tom &zzfake; Jerry"), "Tom &zzfake; Jerry");
        assert_eq!(unescape("no entities"), "no entities");
    }
}
