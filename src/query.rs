use crate::error::Error;
use crate::value::Value;

/// Substitute `:name` placeholders with SQL literals.
///
/// An occurrence is active only while outside every string literal,
/// judged by the parity of the `'` and `"` counts before it. Active
/// names must exist in `params`; inactive text passes through
/// untouched.
pub(crate) fn substitute_params(query: &str, params: &[(&str, Value)]) -> Result<String, Error> {
    let bytes = query.as_bytes();

    let mut out = String::with_capacity(query.len());
    let mut copied = 0;

    let mut single_quotes = 0_usize;
    let mut double_quotes = 0_usize;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => single_quotes += 1,
            b'"' => double_quotes += 1,

            b':' => {
                let start = i + 1;
                let mut end = start;

                while end < bytes.len() && is_word_byte(bytes[end]) {
                    end += 1;
                }

                if end > start && single_quotes % 2 == 0 && double_quotes % 2 == 0 {
                    let name = &query[start..end];

                    let value = params
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| value)
                        .ok_or_else(|| {
                            Error::InvalidArgument(format!(
                                "no value bound for parameter ':{name}'"
                            ))
                        })?;

                    out.push_str(&query[copied..i]);
                    value.write_literal(&mut out);

                    copied = end;
                    i = end;
                    continue;
                }
            }

            _ => {}
        }

        i += 1;
    }

    out.push_str(&query[copied..]);

    Ok(out)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::substitute_params;
    use crate::value::Value;

    #[test]
    fn substitutes_values() {
        let sql = substitute_params(
            "SELECT * FROM book WHERE id = :id AND title = :title",
            &[
                ("id", Value::Int(7)),
                ("title", Value::Text("Dune".into())),
            ],
        )
        .unwrap();

        assert_eq!(sql, "SELECT * FROM book WHERE id = 7 AND title = 'Dune'");
    }

    #[test]
    fn skips_placeholders_inside_string_literals() {
        let sql = substitute_params(
            "SELECT ':id', \":id\", :id",
            &[("id", Value::Int(1))],
        )
        .unwrap();

        assert_eq!(sql, "SELECT ':id', \":id\", 1");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = substitute_params("SELECT :id", &[("wrong", Value::Int(1))]).unwrap_err();

        assert!(matches!(err, crate::Error::InvalidArgument(_)));
    }

    #[test]
    fn bare_colon_passes_through() {
        let sql = substitute_params("SELECT 'a:b', 1 :: 2", &[]).unwrap();

        assert_eq!(sql, "SELECT 'a:b', 1 :: 2");
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        let sql = substitute_params(
            "INSERT INTO t VALUES (:v)",
            &[("v", Value::Text("O'Brien \\ Co".into()))],
        )
        .unwrap();

        assert_eq!(sql, r"INSERT INTO t VALUES ('O''Brien \\ Co')");
    }

    #[test]
    fn null_bool_and_float_literals() {
        let sql = substitute_params(
            "VALUES (:a, :b, :c)",
            &[
                ("a", Value::Null),
                ("b", Value::Bool(false)),
                ("c", Value::Double(1.5)),
            ],
        )
        .unwrap();

        assert_eq!(sql, "VALUES (NULL, FALSE, 1.5)");
    }

    #[test]
    fn same_name_twice() {
        let sql = substitute_params(
            "SELECT :x + :x",
            &[("x", Value::Int(2))],
        )
        .unwrap();

        assert_eq!(sql, "SELECT 2 + 2");
    }
}
