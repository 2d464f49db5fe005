use parley_lexer::{ParseError, TokenCursor, TokenKind, Tokenizer};

fn kinds(src: &str) -> Vec<TokenKind> {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens(src, "test.parley").expect("tokenize");
    tokenizer.tokens.into_iter().map(|t| t.kind).collect()
}

#[test]
fn scans_words_strings_and_numbers() {
    let toks = kinds("put \"hi\" into x3\n42 3.14\n");
    assert_eq!(
        toks,
        vec![
            TokenKind::UnquotedString("put".into()),
            TokenKind::QuotedString("hi".into()),
            TokenKind::UnquotedString("into".into()),
            TokenKind::UnquotedString("x3".into()),
            TokenKind::Symbol("\n".into()),
            TokenKind::Integer(42),
            TokenKind::Double(3.14),
            TokenKind::Symbol("\n".into()),
        ]
    );
}

#[test]
fn splits_operator_runs_greedily() {
    let toks = kinds("<= >= && & < ≠");
    assert_eq!(
        toks,
        vec![
            TokenKind::Symbol("<=".into()),
            TokenKind::Symbol(">=".into()),
            TokenKind::Symbol("&&".into()),
            TokenKind::Symbol("&".into()),
            TokenKind::Symbol("<".into()),
            TokenKind::Symbol("≠".into()),
        ]
    );
}

#[test]
fn adjacent_operator_characters_split_longest_first() {
    // "&&&" is the two-character operator followed by the single one
    let toks = kinds("&&&");
    assert_eq!(
        toks,
        vec![TokenKind::Symbol("&&".into()), TokenKind::Symbol("&".into())]
    );
}

#[test]
fn comments_run_to_end_of_line() {
    let toks = kinds("x -- all of this goes away & \"even strings\"\ny");
    assert_eq!(
        toks,
        vec![
            TokenKind::UnquotedString("x".into()),
            TokenKind::Symbol("\n".into()),
            TokenKind::UnquotedString("y".into()),
        ]
    );
}

#[test]
fn quoted_strings_have_no_escapes() {
    // the backslash is just a character; the string ends at the next quote
    let toks = kinds("\"a\\n\"");
    assert_eq!(toks, vec![TokenKind::QuotedString("a\\n".into())]);
}

#[test]
fn unterminated_string_is_an_error() {
    let mut tokenizer = Tokenizer::new();
    let err = tokenizer.add_tokens("put \"oops\n", "test.parley").unwrap_err();
    assert!(matches!(err, ParseError::ExpectedString { .. }));
}

#[test]
fn tokens_carry_byte_offsets_and_file() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("ab \"cd\"", "demo.parley").unwrap();
    assert_eq!(tokenizer.tokens[0].span.start, 0);
    assert_eq!(tokenizer.tokens[1].span.start, 3);
    assert_eq!(&*tokenizer.tokens[0].file, "demo.parley");
}

#[test]
fn cursor_matches_case_insensitively() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("PUT Button INTO kind", "t.parley").unwrap();
    let mut cur = TokenCursor::new(&tokenizer);
    assert!(cur.has_specific_identifier("put", true));
    assert!(cur.has_identifiers(&["button", "into"], true));
    assert_eq!(cur.expect_identifier().unwrap(), "kind");
    assert!(cur.is_at_end());
}

#[test]
fn cursor_peek_does_not_advance() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("one two", "t.parley").unwrap();
    let mut cur = TokenCursor::new(&tokenizer);
    assert_eq!(cur.has_identifier(false), Some("one".into()));
    assert_eq!(cur.has_identifier(true), Some("one".into()));
    assert_eq!(cur.has_identifier(true), Some("two".into()));
    assert_eq!(cur.has_identifier(true), None);
}

#[test]
fn cursor_backtracks_by_position() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("add 1 to x", "t.parley").unwrap();
    let mut cur = TokenCursor::new(&tokenizer);
    let save = cur.position();
    assert!(cur.has_specific_identifier("add", true));
    assert_eq!(cur.has_integer(true), Some(1));
    cur.seek(save);
    assert!(cur.has_specific_identifier("add", false));
}

#[test]
fn multi_word_match_is_atomic() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("end repeat", "t.parley").unwrap();
    let mut cur = TokenCursor::new(&tokenizer);
    // a failed multi-word match leaves the cursor untouched
    assert!(!cur.has_identifiers(&["end", "if"], true));
    assert_eq!(cur.position(), 0);
    assert!(cur.has_identifiers(&["end", "repeat"], true));
    assert!(cur.is_at_end());
}

#[test]
fn expect_reports_the_offending_token() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("banana", "t.parley").unwrap();
    let mut cur = TokenCursor::new(&tokenizer);
    let err = cur.expect_specific_identifier("apple").unwrap_err();
    match err {
        ParseError::ExpectedIdentifier { expected, found } => {
            assert_eq!(expected, "apple");
            let found = found.expect("token");
            assert_eq!(found.kind, TokenKind::UnquotedString("banana".into()));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn skip_line_stops_after_newline() {
    let mut tokenizer = Tokenizer::new();
    tokenizer.add_tokens("junk junk junk\nnext", "t.parley").unwrap();
    let mut cur = TokenCursor::new(&tokenizer);
    cur.skip_line();
    assert!(cur.has_specific_identifier("next", false));
}
