//! Language-detection fallback, used only when the provider left `language`
//! unset and the job requested `sourceLanguage == auto`.

/// Classify text by counting Latin letters vs CJK Unified Ideographs.
/// English if Latin dominates (`L/total > 0.5`, or `L > 2C` with `L > 100`);
/// Chinese if CJK dominates (`C/total > 0.3`, or `C > 50`); else English.
pub fn detect_language(text: &str) -> &'static str {
    let mut latin = 0usize;
    let mut cjk = 0usize;
    let mut total = 0usize;

    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        total += 1;
        if ch.is_ascii_alphabetic() {
            latin += 1;
        } else if is_cjk(ch) {
            cjk += 1;
        }
    }

    if total == 0 {
        return "en";
    }

    let latin_ratio = latin as f64 / total as f64;
    let cjk_ratio = cjk as f64 / total as f64;

    if latin_ratio > 0.5 || (latin > 2 * cjk && latin > 100) {
        "en"
    } else if cjk_ratio > 0.3 || cjk > 50 {
        "zh"
    } else {
        "en"
    }
}

fn is_cjk(ch: char) -> bool {
    let c = ch as u32;
    (0x4E00..=0x9FFF).contains(&c)
}
