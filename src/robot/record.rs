//! CSV record parsing for the payload of a robot-mode line.
//!
//! The ripping tool escapes a quote inside a quoted field as `\"` instead of
//! the standard `""`. Callers rewrite the escape with [`normalize_escapes`]
//! before handing the text to [`parse_record`].

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    combinator::{all_consuming, map, opt},
    multi::{many0, separated_list1},
    sequence::delimited,
    Finish, IResult,
};

/// Rewrite backslash-quote escapes to doubled quotes
pub fn normalize_escapes(input: &str) -> String {
    input.replace("\\\"", "\"\"")
}

/// Split one CSV record into its fields
pub fn parse_record(input: &str) -> Result<Vec<String>, String> {
    all_consuming(separated_list1(tag(","), field))(input)
        .finish()
        .map(|(_, fields)| fields)
        .map_err(|e| format!("{:?} at {:?}", e.code, e.input))
}

fn field(input: &str) -> IResult<&str, String> {
    alt((quoted_field, bare_field))(input)
}

/// `"..."` with `""` standing for a literal quote
fn quoted_field(input: &str) -> IResult<&str, String> {
    delimited(
        tag("\""),
        map(
            many0(alt((map(tag("\"\""), |_| "\""), is_not("\"")))),
            |parts: Vec<&str>| parts.concat(),
        ),
        tag("\""),
    )(input)
}

/// Unquoted field; a bare quote inside it is not allowed
fn bare_field(input: &str) -> IResult<&str, String> {
    map(opt(is_not(",\"")), |s: Option<&str>| {
        s.unwrap_or_default().to_string()
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_fields() {
        let fields = parse_record(r#"1005,0,1,"FakeMKV started","%1 started","FakeMKV""#).unwrap();
        assert_eq!(
            fields,
            vec!["1005", "0", "1", "FakeMKV started", "%1 started", "FakeMKV"]
        );
    }

    #[test]
    fn test_parse_empty_fields() {
        let fields = parse_record(r#"0,0,999,0,"BD-RE DRIVE","","""#).unwrap();
        assert_eq!(fields, vec!["0", "0", "999", "0", "BD-RE DRIVE", "", ""]);

        let fields = parse_record("1,,3").unwrap();
        assert_eq!(fields, vec!["1", "", "3"]);
    }

    #[test]
    fn test_quoted_comma_stays_in_field() {
        let fields = parse_record(r#"2,0,"Title, The""#).unwrap();
        assert_eq!(fields, vec!["2", "0", "Title, The"]);
    }

    #[test]
    fn test_backslash_escaped_quotes() {
        let line = normalize_escapes(r#"2,0,"The \"Best\" Disc""#);
        assert_eq!(line, r#"2,0,"The ""Best"" Disc""#);
        let fields = parse_record(&line).unwrap();
        assert_eq!(fields, vec!["2", "0", r#"The "Best" Disc"#]);
    }

    #[test]
    fn test_malformed_records() {
        assert!(parse_record(r#"1,"unterminated"#).is_err());
        assert!(parse_record(r#"1,"closed"trailing"#).is_err());
        assert!(parse_record(r#"1,bare"quote"#).is_err());
    }
}
