use crate::search_parser::*;

fn text(field: Field, value: &str) -> Predicate {
    Predicate::Field {
        field,
        value: FieldValue::Text(value.to_string()),
    }
}

#[test]
fn test_parse_field_terms() {
    let tree = parse(r#"artist:"No Artist" title:love"#).unwrap();
    assert_eq!(tree.terms, vec![text(Field::Artist, "no artist"), text(Field::Title, "love")]);
}

#[test]
fn test_parse_free_text() {
    let tree = parse("  Miles   \"kind of\" ").unwrap();
    assert_eq!(
        tree.terms,
        vec![Predicate::FreeText("miles".to_string()), Predicate::FreeText("kind of".to_string())]
    );
}

#[test]
fn test_parse_empty_query() {
    assert!(parse("").unwrap().is_empty());
    assert!(parse("   ").unwrap().is_empty());
}

#[test]
fn test_parse_field_aliases() {
    let tree = parse(r#""File Name":intro album_artist:x Length:90 playcount:3"#).unwrap();
    assert_eq!(
        tree.terms,
        vec![
            text(Field::FileName, "intro"),
            text(Field::AlbumArtist, "x"),
            Predicate::Field {
                field: Field::Duration,
                value: FieldValue::Number(90)
            },
            Predicate::Field {
                field: Field::Plays,
                value: FieldValue::Number(3)
            },
        ]
    );
}

#[test]
fn test_parse_value_keeps_later_colons() {
    let tree = parse("comment:a:b").unwrap();
    assert_eq!(tree.terms, vec![text(Field::Comment, "a:b")]);
}

#[test]
fn test_parse_escapes() {
    let tree = parse(r#"title:"say \"hi\" \\ bye""#).unwrap();
    assert_eq!(tree.terms, vec![text(Field::Title, r#"say "hi" \ bye"#)]);
}

#[test]
fn test_parse_folds_values() {
    let tree = parse("ARTIST:Beyoncé ＡＢＣ").unwrap();
    assert_eq!(
        tree.terms,
        vec![text(Field::Artist, "beyoncé"), Predicate::FreeText("abc".to_string())]
    );
}

#[test]
fn test_unknown_field() {
    let err = parse("love mood:happy").unwrap_err();
    assert_eq!(err.index, 5);
    assert!(err.feedback.starts_with("Unknown field mood: must be one of {path, filename, title,"));
}

#[test]
fn test_empty_value() {
    let err = parse("artist: x").unwrap_err();
    assert_eq!(err.index, 7);
    assert_eq!(err.feedback, "Empty value: artist must be followed by a value.");

    let err = parse("title:").unwrap_err();
    assert_eq!(err.index, 6);

    let err = parse(r#"title:"""#).unwrap_err();
    assert_eq!(err.index, 6);
    assert_eq!(err.feedback, "Empty value: title must be followed by a value.");
}

#[test]
fn test_empty_free_text() {
    let err = parse(r#"a "" b"#).unwrap_err();
    assert_eq!(err.index, 2);
    assert_eq!(err.feedback, "Empty search term: remove the empty quotes.");
}

#[test]
fn test_unterminated_quote() {
    let err = parse(r#"artist:"Miles"#).unwrap_err();
    assert_eq!(err.index, 7);
    assert_eq!(err.feedback, "Unterminated quote: add a closing \" to the end of this term.");
}

#[test]
fn test_missing_whitespace_after_quote() {
    let err = parse(r#""kind of"blue"#).unwrap_err();
    assert_eq!(err.index, 9);
    assert_eq!(err.feedback, "Expected whitespace after closing quote.");

    let err = parse(r#"album:"kind of"blue"#).unwrap_err();
    assert_eq!(err.index, 15);
}

#[test]
fn test_numeric_field_requires_number() {
    let err = parse("year:nineties").unwrap_err();
    assert_eq!(err.index, 5);
    assert_eq!(err.feedback, "Invalid value for year: must be a whole number.");
    assert!(parse("year:-1").is_err());
}

#[test]
fn test_error_display() {
    let err = parse("title:").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to parse search query, invalid syntax:\n\n    title:\n          ^\n          Empty value: title must be followed by a value."
    );
}

#[test]
fn test_display_reparses() {
    for query in [r#"artist:"No Artist" title:love"#, r#"year:1959 "kind of" comment:"a \"b\"""#] {
        let tree = parse(query).unwrap();
        assert_eq!(parse(&tree.to_string()).unwrap(), tree);
    }
}
