//! Finite-state scanner for numeric claims in free text
//!
//! The scanner first splits text into tokens, then looks at each number
//! together with its neighbourhood: a unit glued or directly after it, a
//! property keyword within a bounded word window, count nouns and
//! narrative cues. Keyword association never crosses a sentence end or a
//! square bracket, so a redaction placeholder or an inline citation left
//! by an earlier pass does not change what later numbers are tied to.

use crate::lexicon;
use attest_domain::{ClaimKind, TextSpan};

/// Words searched on each side of a number for a property keyword
pub const KEYWORD_WINDOW: usize = 6;

/// Words after a number searched for a count noun
const COUNT_NOUN_WINDOW: usize = 2;

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// A signed decimal number
    Number(f64),
    /// Letters, digits and underscores starting with a letter
    Word,
    /// A single punctuation or symbol character
    Punct,
    /// A run of whitespace
    Space,
}

/// A token and where it sits in the text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    /// Lexical class
    pub kind: TokenKind,
    /// Byte range
    pub span: TextSpan,
    /// Source text
    pub text: &'a str,
}

impl Token<'_> {
    fn is_sentence_end(&self) -> bool {
        match self.kind {
            TokenKind::Punct => matches!(self.text, "." | "!" | "?" | ";"),
            TokenKind::Space => self.text.contains('\n'),
            _ => false,
        }
    }

    /// Where a keyword or count-noun window stops
    fn is_window_boundary(&self) -> bool {
        self.is_sentence_end() || (self.kind == TokenKind::Punct && matches!(self.text, "[" | "]"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Space,
    Word,
    Integer,
    Fraction,
    Exponent,
}

fn is_sign(c: char) -> bool {
    matches!(c, '-' | '+' | '\u{2212}')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `text` into tokens
///
/// A sign starts a number only when a digit follows and the sign is not
/// glued to a preceding word or number, so `1-2` and `x-1` keep their
/// hyphen as punctuation. A digit glued to a preceding letter is part of
/// the word (`TiO2`).
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut state = State::Start;
    let mut start = 0;
    let mut i = 0;

    let peek = |index: usize| chars.get(index).map(|(_, c)| *c);
    let offset = |index: usize| chars.get(index).map(|(o, _)| *o).unwrap_or(text.len());

    while i <= chars.len() {
        let current = peek(i);
        match state {
            State::Start => {
                let Some(c) = current else { break };
                start = offset(i);
                let glued = tokens
                    .last()
                    .is_some_and(|t: &Token<'_>| matches!(t.kind, TokenKind::Word | TokenKind::Number(_)));
                state = if c.is_whitespace() {
                    State::Space
                } else if c.is_ascii_digit() {
                    State::Integer
                } else if is_sign(c) && !glued && peek(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                    State::Integer
                } else if is_word_char(c) {
                    State::Word
                } else {
                    tokens.push(make_token(text, TokenKind::Punct, start, offset(i + 1)));
                    i += 1;
                    continue;
                };
                i += 1;
            }
            State::Space => {
                if current.is_some_and(char::is_whitespace) {
                    i += 1;
                } else {
                    tokens.push(make_token(text, TokenKind::Space, start, offset(i)));
                    state = State::Start;
                }
            }
            State::Word => {
                if current.is_some_and(is_word_char) {
                    i += 1;
                } else {
                    tokens.push(make_token(text, TokenKind::Word, start, offset(i)));
                    state = State::Start;
                }
            }
            State::Integer | State::Fraction | State::Exponent => {
                let next = peek(i + 1);
                match current {
                    Some(c) if c.is_ascii_digit() => i += 1,
                    Some('.') if state == State::Integer && next.is_some_and(|n| n.is_ascii_digit()) => {
                        state = State::Fraction;
                        i += 1;
                    }
                    Some('e' | 'E') if state != State::Exponent && exponent_follows(&chars, i + 1) => {
                        state = State::Exponent;
                        i += if next.is_some_and(is_sign) { 2 } else { 1 };
                    }
                    _ => {
                        let end = offset(i);
                        let literal = &text[start..end];
                        let kind = match parse_number(literal) {
                            Some(value) => TokenKind::Number(value),
                            None => TokenKind::Word,
                        };
                        tokens.push(make_token(text, kind, start, end));
                        state = State::Start;
                    }
                }
            }
        }
    }

    tokens
}

fn exponent_follows(chars: &[(usize, char)], index: usize) -> bool {
    let digit_at = |i: usize| chars.get(i).is_some_and(|(_, c)| c.is_ascii_digit());
    match chars.get(index) {
        Some((_, c)) if is_sign(*c) => digit_at(index + 1),
        Some(_) => digit_at(index),
        None => false,
    }
}

fn parse_number(literal: &str) -> Option<f64> {
    let normalized = literal.replace('\u{2212}', "-");
    normalized
        .trim_start_matches('+')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn make_token(text: &str, kind: TokenKind, start: usize, end: usize) -> Token<'_> {
    Token {
        kind,
        span: TextSpan::new(start, end),
        text: &text[start..end],
    }
}

/// A property keyword found near a number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    /// Canonical property the keyword denotes
    pub property: &'static str,
    /// The keyword as written
    pub phrase: String,
}

/// A number the gate has to rule on
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimCandidate {
    /// Number plus unit, as it would be redacted
    pub span: TextSpan,
    /// Parsed value
    pub value: f64,
    /// Canonical unit, if one follows the number
    pub unit: Option<&'static str>,
    /// Nearest property keyword
    pub keyword: Option<KeywordMatch>,
    /// Property assertion or narrative number
    pub kind: ClaimKind,
}

impl ClaimCandidate {
    /// Unit or keyword label for the audit trail
    pub fn unit_or_keyword(&self) -> String {
        match (&self.unit, &self.keyword) {
            (Some(unit), _) => unit.to_string(),
            (None, Some(keyword)) => keyword.phrase.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Find every numeric claim candidate in `text`, in text order
///
/// Numbers with neither a unit, a keyword, a count noun nor a narrative
/// cue are not candidates and pass through untouched. Only a plain
/// non-negative integer can be narrative, and a count noun only makes it
/// one when no property keyword governs the number: a keyword before it,
/// or after it but ahead of the count noun, keeps it a property claim.
///
/// # Examples
///
/// ```
/// use attest_domain::ClaimKind;
/// use attest_gatekeeper::scan;
///
/// let candidates = scan("TiO2 has a formation energy of -6.82 eV/atom.");
/// assert_eq!(candidates.len(), 1);
/// assert_eq!(candidates[0].value, -6.82);
/// assert_eq!(candidates[0].unit, Some("eV/atom"));
/// assert_eq!(candidates[0].kind, ClaimKind::Property);
/// ```
pub fn scan(text: &str) -> Vec<ClaimCandidate> {
    let tokens = tokenize(text);
    let mut candidates = Vec::new();
    // Digits inside a unit spelling (`eV atom^-1`) are not numbers
    let mut consumed = 0;

    for (index, token) in tokens.iter().enumerate() {
        let TokenKind::Number(value) = token.kind else {
            continue;
        };
        if token.span.start < consumed {
            continue;
        }

        let unit = unit_after(text, token.span.end);
        let end = unit.map(|(_, end)| end).unwrap_or(token.span.end);
        consumed = end;
        let span = TextSpan::new(token.span.start, end);

        let before = words_before(&tokens, index, KEYWORD_WINDOW);
        let after = words_after(&tokens, index, end, KEYWORD_WINDOW);
        let keyword_before = nearest_keyword_before(&before);
        let keyword_after = nearest_keyword_after(&after);

        let count_at = after
            .iter()
            .take(COUNT_NOUN_WINDOW)
            .position(|word| lexicon::is_count_noun(word));
        let counted = count_at.is_some_and(|count| {
            keyword_before.is_none() && keyword_after.as_ref().is_none_or(|(_, at)| *at > count)
        });
        let cued = cue_before(&tokens, index);
        let keyword = keyword_before.or(keyword_after.map(|(keyword, _)| keyword));

        let kind = if unit.is_some() {
            ClaimKind::Property
        } else if is_count_literal(token.text) && (counted || cued) {
            ClaimKind::Narrative
        } else if keyword.is_some() {
            ClaimKind::Property
        } else {
            continue;
        };

        candidates.push(ClaimCandidate {
            span,
            value,
            unit: unit.map(|(canonical, _)| canonical),
            keyword,
            kind,
        });
    }

    candidates
}

/// Whether a number is written as a plain non-negative integer
fn is_count_literal(literal: &str) -> bool {
    !literal.is_empty() && literal.chars().all(|c| c.is_ascii_digit())
}

/// Unit directly after a number, allowing spaces but no line break
fn unit_after(text: &str, number_end: usize) -> Option<(&'static str, usize)> {
    let rest = &text[number_end..];
    let gap = rest.len() - rest.trim_start_matches([' ', '\t', '\u{a0}']).len();
    lexicon::match_unit(&rest[gap..]).map(|(canonical, len)| (canonical, number_end + gap + len))
}

/// Up to `limit` words before token `index`, nearest last
fn words_before<'a>(tokens: &[Token<'a>], index: usize, limit: usize) -> Vec<&'a str> {
    let mut words = Vec::new();
    for token in tokens[..index].iter().rev() {
        if token.is_window_boundary() || words.len() == limit {
            break;
        }
        if token.kind == TokenKind::Word {
            words.push(token.text);
        }
    }
    words.reverse();
    words
}

/// Up to `limit` words starting at byte `from` after token `index`, nearest first
fn words_after<'a>(tokens: &[Token<'a>], index: usize, from: usize, limit: usize) -> Vec<&'a str> {
    let mut words = Vec::new();
    for token in tokens[index + 1..].iter().filter(|t| t.span.start >= from) {
        if token.is_window_boundary() || words.len() == limit {
            break;
        }
        if token.kind == TokenKind::Word {
            words.push(token.text);
        }
    }
    words
}

/// Keyword phrases matching `words` at `position`, longest first
fn phrase_at(words: &[&str], position: usize) -> Option<(KeywordMatch, usize)> {
    lexicon::keyword_phrases()
        .filter(|(_, phrase)| {
            position + phrase.len() <= words.len()
                && phrase
                    .iter()
                    .zip(&words[position..])
                    .all(|(expected, word)| word.eq_ignore_ascii_case(expected))
        })
        .max_by_key(|(_, phrase)| phrase.len())
        .map(|(property, phrase)| {
            let written = words[position..position + phrase.len()].join(" ");
            (
                KeywordMatch {
                    property,
                    phrase: written,
                },
                phrase.len(),
            )
        })
}

fn nearest_keyword_before(words: &[&str]) -> Option<KeywordMatch> {
    // Prefer the phrase ending closest to the number, then the longest
    let mut best: Option<(usize, usize, KeywordMatch)> = None;
    for position in 0..words.len() {
        if let Some((keyword, len)) = phrase_at(words, position) {
            let end = position + len;
            let better = best
                .as_ref()
                .is_none_or(|(best_end, best_len, _)| end > *best_end || (end == *best_end && len > *best_len));
            if better {
                best = Some((end, len, keyword));
            }
        }
    }
    best.map(|(_, _, keyword)| keyword)
}

/// First keyword after the number, with the word position it starts at
fn nearest_keyword_after(words: &[&str]) -> Option<(KeywordMatch, usize)> {
    (0..words.len()).find_map(|position| phrase_at(words, position).map(|(keyword, _)| (keyword, position)))
}

/// Whether the number at `index` is directly preceded by a narrative cue
///
/// A single abbreviation dot is skipped, so `Fig. 2` counts.
fn cue_before(tokens: &[Token<'_>], index: usize) -> bool {
    let mut previous = tokens[..index].iter().rev().filter(|t| t.kind != TokenKind::Space);
    match previous.next() {
        Some(token) if token.kind == TokenKind::Word || token.text == "#" => {
            lexicon::is_narrative_cue(token.text)
        }
        Some(token) if token.text == "." => previous
            .next()
            .is_some_and(|word| word.kind == TokenKind::Word && lexicon::is_narrative_cue(word.text)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_numbers() {
        let tokens = tokenize("-6.823 eV");
        assert_eq!(tokens[0].kind, TokenKind::Number(-6.823));
        assert_eq!(tokens[0].text, "-6.823");
        assert_eq!(tokens[1].kind, TokenKind::Space);
        assert_eq!(tokens[2].kind, TokenKind::Word);

        assert_eq!(kinds("1.5e-3"), vec![TokenKind::Number(1.5e-3)]);
        assert_eq!(kinds("\u{2212}2.1"), vec![TokenKind::Number(-2.1)]);
        assert_eq!(kinds("+4"), vec![TokenKind::Number(4.0)]);
    }

    #[test]
    fn test_formula_digits_belong_to_words() {
        let tokens = tokenize("SrTiO3 and TiO2_struct_1");
        let words: Vec<_> = tokens.iter().filter(|t| t.kind == TokenKind::Word).map(|t| t.text).collect();
        assert_eq!(words, vec!["SrTiO3", "and", "TiO2_struct_1"]);
        assert!(tokens.iter().all(|t| !matches!(t.kind, TokenKind::Number(_))));
    }

    #[test]
    fn test_hyphen_between_numbers_is_punctuation() {
        assert_eq!(
            kinds("1-2"),
            vec![TokenKind::Number(1.0), TokenKind::Punct, TokenKind::Number(2.0)]
        );
    }

    #[test]
    fn test_trailing_dot_is_sentence_end() {
        let tokens = tokenize("is 3.");
        assert_eq!(tokens[2].kind, TokenKind::Number(3.0));
        assert_eq!(tokens[3].kind, TokenKind::Punct);
        assert!(tokens[3].is_sentence_end());
    }

    #[test]
    fn test_glued_unit() {
        let candidates = scan("E = -6.82eV/atom");
        assert_eq!(candidates[0].unit, Some("eV/atom"));
        assert_eq!(candidates[0].span, TextSpan::new(4, 16));
    }

    #[test]
    fn test_unit_exponent_is_not_a_number() {
        let candidates = scan("a density of 4.2 g/cm^3 and -6.8 eV atom^-1");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].unit, Some("g/cm^3"));
        assert_eq!(candidates[1].unit, Some("eV/atom"));
        assert_eq!(candidates[1].value, -6.8);
    }

    #[test]
    fn test_unit_synonym_in_text() {
        let candidates = scan("a formation energy of -6.82 eV per atom");
        assert_eq!(candidates[0].unit, Some("eV/atom"));
        assert_eq!(candidates[0].keyword.as_ref().map(|k| k.property), Some("formation_energy"));
    }

    #[test]
    fn test_keyword_without_unit_is_property() {
        let candidates = scan("The band gap is roughly 1.1 here.");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, ClaimKind::Property);
        assert_eq!(candidates[0].unit_or_keyword(), "band gap");
    }

    #[test]
    fn test_keyword_after_number() {
        let candidates = scan("We found 2.9 as the bandgap");
        assert_eq!(candidates[0].keyword.as_ref().map(|k| k.property), Some("band_gap"));
    }

    #[test]
    fn test_keyword_window_stops_at_sentence_end() {
        assert!(scan("The formation energy is unknown. We ran it 3 ways").is_empty());
    }

    #[test]
    fn test_keyword_window_is_bounded() {
        let text = "energy one two three four five six seven 4.2";
        assert!(scan(text).is_empty());
    }

    #[test]
    fn test_count_noun_makes_narrative() {
        let candidates = scan("Generated 5 candidate structures");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, ClaimKind::Narrative);
    }

    #[test]
    fn test_narrative_cue() {
        let candidates = scan("As shown in Fig. 2 the energy trend is flat");
        assert_eq!(candidates[0].kind, ClaimKind::Narrative);
        let candidates = scan("In step 3 the energy drops");
        assert_eq!(candidates[0].kind, ClaimKind::Narrative);
    }

    #[test]
    fn test_unit_beats_count_noun() {
        let candidates = scan("a gap of 1.5 eV across 3 structures");
        assert_eq!(candidates[0].kind, ClaimKind::Property);
        assert_eq!(candidates[1].kind, ClaimKind::Narrative);
    }

    #[test]
    fn test_keyword_before_beats_count_noun() {
        let candidates = scan("TiO2 has a formation energy of -7.50 per atom");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, ClaimKind::Property);

        let candidates = scan("The band gap is 3.4 times per structure");
        assert_eq!(candidates[0].kind, ClaimKind::Property);

        let candidates = scan("The formation energy was computed for 12 structures");
        assert_eq!(candidates[0].kind, ClaimKind::Property);
    }

    #[test]
    fn test_only_plain_integers_count() {
        let candidates = scan("We relaxed 2.5 structures");
        assert!(candidates.is_empty());
        let candidates = scan("We relaxed -3 structures");
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_count_noun_before_later_keyword() {
        let candidates = scan("We screened 5 structures and the formation energy is low");
        assert_eq!(candidates[0].kind, ClaimKind::Narrative);
    }

    #[test]
    fn test_brackets_bound_the_keyword_window() {
        assert!(scan("The formation energy [unverified value] a b c 4.2").is_empty());
        assert!(scan("4.2 [see note] band gap").is_empty());
    }

    #[test]
    fn test_plain_numbers_are_not_candidates() {
        assert!(scan("In 2023 we met 4 times over coffee").iter().all(|c| c.kind == ClaimKind::Narrative));
        assert!(scan("In 2023 we met").is_empty());
    }
}
