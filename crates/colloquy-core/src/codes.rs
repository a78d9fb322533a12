use colloquy_config::ClosingCode;

/// Watches accumulating interviewer text for termination codes.
///
/// Detection is plain substring containment, checked against the full
/// accumulated text before anything is rendered. Codes are mutually
/// exclusive triggers: the first configured code found wins and scanning
/// stops.
pub struct CodeDetector {
    codes: Vec<ClosingCode>,
    max_code_len: usize,
}

impl CodeDetector {
    pub fn new(codes: Vec<ClosingCode>) -> Self {
        let max_code_len = codes.iter().map(|c| c.code.len()).max().unwrap_or(0);
        Self {
            codes,
            max_code_len,
        }
    }

    /// First known code contained in the text, if any.
    pub fn detect(&self, text: &str) -> Option<&ClosingCode> {
        self.codes.iter().find(|c| text.contains(&c.code))
    }

    /// How much of the buffer may be shown without risking a partial code
    /// reveal: everything except a tail one byte shorter than the longest
    /// code, snapped back to a char boundary.
    pub fn safe_emit_len(&self, text: &str) -> usize {
        if self.max_code_len == 0 {
            return text.len();
        }
        let mut safe = text.len().saturating_sub(self.max_code_len - 1);
        while safe > 0 && !text.is_char_boundary(safe) {
            safe -= 1;
        }
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CodeDetector {
        CodeDetector::new(vec![
            ClosingCode {
                code: "5j3k".to_string(),
                message: "problem message".to_string(),
            },
            ClosingCode {
                code: "x7y8".to_string(),
                message: "closing message".to_string(),
            },
        ])
    }

    #[test]
    fn detects_code_anywhere_in_text() {
        let d = detector();
        let hit = d.detect("Thank you for your time. x7y8").unwrap();
        assert_eq!(hit.code, "x7y8");
        assert_eq!(hit.message, "closing message");
    }

    #[test]
    fn no_match_on_clean_text() {
        let d = detector();
        assert!(d.detect("Could you tell me more about that?").is_none());
    }

    #[test]
    fn first_configured_code_wins() {
        let d = detector();
        let hit = d.detect("x7y8 and 5j3k").unwrap();
        assert_eq!(hit.code, "5j3k");
    }

    #[test]
    fn safe_emit_holds_back_a_code_sized_tail() {
        let d = detector();
        // Longest code is 4 bytes, so the last 3 bytes stay held back.
        assert_eq!(d.safe_emit_len("Understood. "), 9);
        assert_eq!(d.safe_emit_len("ab"), 0);
    }

    #[test]
    fn safe_emit_respects_char_boundaries() {
        let d = detector();
        let text = "caf\u{e9}s!"; // 'é' is two bytes
        let safe = d.safe_emit_len(text);
        assert!(text.is_char_boundary(safe));
    }

    #[test]
    fn empty_code_set_emits_everything() {
        let d = CodeDetector::new(Vec::new());
        assert!(d.detect("anything").is_none());
        assert_eq!(d.safe_emit_len("anything"), 8);
    }
}
