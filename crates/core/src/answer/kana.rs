//! Romaji and katakana folding into hiragana.
//!
//! Covers Hepburn plus the common Kunrei/Nihon-shiki spellings an IME accepts.
//! Anything that does not form a syllable is passed through unchanged.

const KATAKANA_START: u32 = 0x30A1;
const KATAKANA_END: u32 = 0x30F6;
const KATAKANA_TO_HIRAGANA: u32 = 0x60;

const FULLWIDTH_START: u32 = 0xFF01;
const FULLWIDTH_END: u32 = 0xFF5E;
const FULLWIDTH_TO_ASCII: u32 = 0xFEE0;

/// Map full-width ASCII variants (`Ｔｏｋｙｏ`) to plain ASCII.
pub(crate) fn fold_fullwidth(c: char) -> char {
    let code = u32::from(c);
    if (FULLWIDTH_START..=FULLWIDTH_END).contains(&code) {
        char::from_u32(code - FULLWIDTH_TO_ASCII).unwrap_or(c)
    } else {
        c
    }
}

/// Map katakana to the matching hiragana; `ー` and other marks are kept.
pub(crate) fn fold_katakana(c: char) -> char {
    let code = u32::from(c);
    if (KATAKANA_START..=KATAKANA_END).contains(&code) {
        char::from_u32(code - KATAKANA_TO_HIRAGANA).unwrap_or(c)
    } else {
        c
    }
}

/// Expand a macron vowel to its two-letter long form.
pub(crate) fn expand_macron(c: char) -> Option<&'static str> {
    match c {
        'ā' | 'â' => Some("aa"),
        'ī' | 'î' => Some("ii"),
        'ū' | 'û' => Some("uu"),
        'ē' | 'ê' => Some("ee"),
        'ō' | 'ô' => Some("ou"),
        _ => None,
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'u' | 'e' | 'o')
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_lowercase() && !is_vowel(c)
}

#[allow(clippy::too_many_lines)]
fn syllable(s: &str) -> Option<&'static str> {
    let kana = match s {
        "a" => "あ",
        "i" => "い",
        "u" => "う",
        "e" => "え",
        "o" => "お",

        "ka" => "か",
        "ki" => "き",
        "ku" => "く",
        "ke" => "け",
        "ko" => "こ",
        "kya" => "きゃ",
        "kyu" => "きゅ",
        "kyo" => "きょ",

        "ga" => "が",
        "gi" => "ぎ",
        "gu" => "ぐ",
        "ge" => "げ",
        "go" => "ご",
        "gya" => "ぎゃ",
        "gyu" => "ぎゅ",
        "gyo" => "ぎょ",

        "sa" => "さ",
        "shi" | "si" => "し",
        "su" => "す",
        "se" => "せ",
        "so" => "そ",
        "sha" | "sya" => "しゃ",
        "shu" | "syu" => "しゅ",
        "she" => "しぇ",
        "sho" | "syo" => "しょ",

        "za" => "ざ",
        "ji" | "zi" => "じ",
        "zu" => "ず",
        "ze" => "ぜ",
        "zo" => "ぞ",
        "ja" | "jya" | "zya" => "じゃ",
        "ju" | "jyu" | "zyu" => "じゅ",
        "je" => "じぇ",
        "jo" | "jyo" | "zyo" => "じょ",

        "ta" => "た",
        "chi" | "ti" => "ち",
        "tsu" | "tu" => "つ",
        "te" => "て",
        "to" => "と",
        "cha" | "tya" | "cya" => "ちゃ",
        "chu" | "tyu" | "cyu" => "ちゅ",
        "che" => "ちぇ",
        "cho" | "tyo" | "cyo" => "ちょ",

        "da" => "だ",
        "di" => "ぢ",
        "du" => "づ",
        "de" => "で",
        "do" => "ど",

        "na" => "な",
        "ni" => "に",
        "nu" => "ぬ",
        "ne" => "ね",
        "no" => "の",
        "nya" => "にゃ",
        "nyu" => "にゅ",
        "nyo" => "にょ",

        "ha" => "は",
        "hi" => "ひ",
        "fu" | "hu" => "ふ",
        "he" => "へ",
        "ho" => "ほ",
        "hya" => "ひゃ",
        "hyu" => "ひゅ",
        "hyo" => "ひょ",
        "fa" => "ふぁ",
        "fi" => "ふぃ",
        "fe" => "ふぇ",
        "fo" => "ふぉ",

        "ba" => "ば",
        "bi" => "び",
        "bu" => "ぶ",
        "be" => "べ",
        "bo" => "ぼ",
        "bya" => "びゃ",
        "byu" => "びゅ",
        "byo" => "びょ",

        "pa" => "ぱ",
        "pi" => "ぴ",
        "pu" => "ぷ",
        "pe" => "ぺ",
        "po" => "ぽ",
        "pya" => "ぴゃ",
        "pyu" => "ぴゅ",
        "pyo" => "ぴょ",

        "ma" => "ま",
        "mi" => "み",
        "mu" => "む",
        "me" => "め",
        "mo" => "も",
        "mya" => "みゃ",
        "myu" => "みゅ",
        "myo" => "みょ",

        "ya" => "や",
        "yu" => "ゆ",
        "yo" => "よ",

        "ra" | "la" => "ら",
        "ri" | "li" => "り",
        "ru" | "lu" => "る",
        "re" | "le" => "れ",
        "ro" | "lo" => "ろ",
        "rya" => "りゃ",
        "ryu" => "りゅ",
        "ryo" => "りょ",

        "wa" => "わ",
        "wi" => "ゐ",
        "we" => "ゑ",
        "wo" => "を",

        "va" => "ゔぁ",
        "vi" => "ゔぃ",
        "vu" => "ゔ",
        "ve" => "ゔぇ",
        "vo" => "ゔぉ",

        _ => return None,
    };
    Some(kana)
}

/// Transliterate lowercase romaji into hiragana.
///
/// Doubled consonants (and `tch`) become `っ`; `n` before a consonant, at the
/// end, or followed by `'` becomes `ん`; `-` becomes the long-vowel mark.
pub(crate) fn romaji_to_hiragana(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '-' {
            out.push('ー');
            i += 1;
            continue;
        }

        if !c.is_ascii_lowercase() {
            out.push(c);
            i += 1;
            continue;
        }

        if c == 'n' {
            match next {
                Some('\'') => {
                    out.push('ん');
                    i += 2;
                    continue;
                }
                // IME-style "nn" unless the second n starts a syllable.
                Some('n') if !chars.get(i + 2).is_some_and(|&a| is_vowel(a) || a == 'y') => {
                    out.push('ん');
                    i += 2;
                    continue;
                }
                Some(n) if is_vowel(n) || n == 'y' => {}
                _ => {
                    out.push('ん');
                    i += 1;
                    continue;
                }
            }
        }

        let geminate = match next {
            Some(n) if n == c && is_consonant(c) => true,
            Some('c') => c == 't' && chars.get(i + 2) == Some(&'h'),
            _ => false,
        };
        if geminate {
            out.push('っ');
            i += 1;
            continue;
        }

        let mut matched = false;
        for len in (1..=3).rev() {
            if i + len > chars.len() {
                continue;
            }
            let candidate: String = chars[i..i + len].iter().collect();
            if let Some(kana) = syllable(&candidate) {
                out.push_str(kana);
                i += len;
                matched = true;
                break;
            }
        }

        if !matched {
            out.push(c);
            i += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_words() {
        assert_eq!(romaji_to_hiragana("mizu"), "みず");
        assert_eq!(romaji_to_hiragana("toukyou"), "とうきょう");
        assert_eq!(romaji_to_hiragana("shinbun"), "しんぶん");
        assert_eq!(romaji_to_hiragana("sinbun"), "しんぶん");
    }

    #[test]
    fn syllabic_n_rules() {
        assert_eq!(romaji_to_hiragana("konnichiha"), "こんにちは");
        assert_eq!(romaji_to_hiragana("onna"), "おんな");
        assert_eq!(romaji_to_hiragana("kin'en"), "きんえん");
        assert_eq!(romaji_to_hiragana("kinen"), "きねん");
        assert_eq!(romaji_to_hiragana("hon"), "ほん");
    }

    #[test]
    fn doubled_n_is_a_single_syllabic_n() {
        assert_eq!(romaji_to_hiragana("sennsei"), "せんせい");
        assert_eq!(romaji_to_hiragana("honn"), "ほん");
        assert_eq!(romaji_to_hiragana("konnnichiha"), "こんにちは");
        assert_eq!(romaji_to_hiragana("minnna"), "みんな");
        assert_eq!(romaji_to_hiragana("konnyaku"), "こんにゃく");
    }

    #[test]
    fn geminate_consonants() {
        assert_eq!(romaji_to_hiragana("kitte"), "きって");
        assert_eq!(romaji_to_hiragana("matcha"), "まっちゃ");
        assert_eq!(romaji_to_hiragana("zasshi"), "ざっし");
    }

    #[test]
    fn long_vowel_mark_and_passthrough() {
        assert_eq!(romaji_to_hiragana("ko-hi-"), "こーひー");
        assert_eq!(romaji_to_hiragana("みず"), "みず");
        assert_eq!(romaji_to_hiragana("x"), "x");
    }

    #[test]
    fn katakana_and_fullwidth_folding() {
        let folded: String = "コーヒー".chars().map(fold_katakana).collect();
        assert_eq!(folded, "こーひー");
        let ascii: String = "Ｔｏｋｙｏ".chars().map(fold_fullwidth).collect();
        assert_eq!(ascii, "Tokyo");
    }

    #[test]
    fn macrons_expand() {
        assert_eq!(expand_macron('ō'), Some("ou"));
        assert_eq!(expand_macron('a'), None);
    }
}
