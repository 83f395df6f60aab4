//! Utility functions shared by the engine
//!
//! This module provides naming helpers for bean properties and the
//! quote-aware string scanning used by the method expression parser.

/// Naming convention utilities for bean properties
pub mod naming {
    /// Converts a PascalCase name to camelCase.
    ///
    /// Used to derive a property name from an accessor, so that
    /// `getName` exposes the property `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use beanbind_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("Name"), "name");
    /// assert_eq!(to_camel_case("FirstName"), "firstName");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Converts a camelCase name to PascalCase.
    ///
    /// # Examples
    ///
    /// ```
    /// use beanbind_core::utils::naming::to_pascal_case;
    ///
    /// assert_eq!(to_pascal_case("name"), "Name");
    /// assert_eq!(to_pascal_case("firstName"), "FirstName");
    /// ```
    pub fn to_pascal_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_uppercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Returns the property name for a getter such as `getName` or `isActive`.
    pub fn getter_property(method: &str) -> Option<String> {
        let rest = method
            .strip_prefix("get")
            .or_else(|| method.strip_prefix("is"))?;
        rest.chars()
            .next()
            .filter(|c| c.is_uppercase())
            .map(|_| to_camel_case(rest))
    }

    /// Returns the property name for a setter such as `setName`.
    pub fn setter_property(method: &str) -> Option<String> {
        let rest = method.strip_prefix("set")?;
        rest.chars()
            .next()
            .filter(|c| c.is_uppercase())
            .map(|_| to_camel_case(rest))
    }
}

/// Quote-aware string scanning
pub mod strings {
    /// Whether `c` may start an identifier (letter, `_` or `$`).
    pub fn is_identifier_start(c: char) -> bool {
        c.is_alphabetic() || c == '_' || c == '$'
    }

    /// Whether `c` may appear after the first character of an identifier.
    pub fn is_identifier_part(c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '$'
    }

    /// Returns the text between the first `open` and its matching `close`,
    /// ignoring brackets that appear inside single or double quotes.
    ///
    /// # Examples
    ///
    /// ```
    /// use beanbind_core::utils::strings::between_outer_pair;
    ///
    /// assert_eq!(between_outer_pair("foo(a, (b))", '(', ')'), Some("a, (b)"));
    /// assert_eq!(between_outer_pair("foo('(', b)", '(', ')'), Some("'(', b"));
    /// assert_eq!(between_outer_pair("foo", '(', ')'), None);
    /// ```
    pub fn between_outer_pair(text: &str, open: char, close: char) -> Option<&str> {
        let mut depth = 0usize;
        let mut start = None;
        let mut quote: Option<char> = None;

        for (i, c) in text.char_indices() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == open => {
                    if depth == 0 {
                        start = Some(i + c.len_utf8());
                    }
                    depth += 1;
                }
                None if c == close => {
                    if depth == 0 {
                        return None;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return start.map(|s| &text[s..i]);
                    }
                }
                None => {}
            }
        }
        None
    }

    /// Counts `open` and `close` outside quotes and reports whether they pair up.
    pub fn is_balanced(text: &str, open: char, close: char) -> bool {
        let mut depth: i64 = 0;
        let mut quote: Option<char> = None;
        for c in text.chars() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == open => depth += 1,
                None if c == close => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                None => {}
            }
        }
        depth == 0
    }

    /// Splits on `separator` at the top level only.
    ///
    /// Separators inside quotes or nested `()`, `[]` and `{}` are kept.
    /// Each part is trimmed.
    ///
    /// # Examples
    ///
    /// ```
    /// use beanbind_core::utils::strings::split_safe_quote;
    ///
    /// assert_eq!(
    ///     split_safe_quote("'a,b', ${header.x}, foo(1, 2)", ','),
    ///     vec!["'a,b'", "${header.x}", "foo(1, 2)"]
    /// );
    /// ```
    pub fn split_safe_quote(text: &str, separator: char) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        for c in text.chars() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    current.push(c);
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        current.push(c);
                    }
                    '(' | '[' | '{' => {
                        depth += 1;
                        current.push(c);
                    }
                    ')' | ']' | '}' => {
                        depth = depth.saturating_sub(1);
                        current.push(c);
                    }
                    c if c == separator && depth == 0 => {
                        parts.push(current.trim().to_string());
                        current.clear();
                    }
                    c => current.push(c),
                },
            }
        }

        if !current.trim().is_empty() || !parts.is_empty() {
            parts.push(current.trim().to_string());
        }
        parts
    }

    /// Whether the text is wrapped in a matching pair of single or double quotes.
    pub fn is_quoted(text: &str) -> bool {
        text.len() >= 2
            && ((text.starts_with('\'') && text.ends_with('\''))
                || (text.starts_with('"') && text.ends_with('"')))
    }

    /// Removes one pair of surrounding quotes, if present.
    pub fn remove_leading_and_ending_quotes(text: &str) -> &str {
        if is_quoted(text) {
            &text[1..text.len() - 1]
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::naming::*;
    use super::strings::*;

    #[test]
    fn test_property_names() {
        assert_eq!(getter_property("getName").as_deref(), Some("name"));
        assert_eq!(getter_property("isActive").as_deref(), Some("active"));
        assert_eq!(getter_property("getter"), None);
        assert_eq!(getter_property("get"), None);
        assert_eq!(setter_property("setName").as_deref(), Some("name"));
        assert_eq!(setter_property("settle"), None);
    }

    #[test]
    fn test_between_outer_pair() {
        assert_eq!(between_outer_pair("concat(${body}, ${header.foo})", '(', ')'), Some("${body}, ${header.foo}"));
        assert_eq!(between_outer_pair("foo()", '(', ')'), Some(""));
        assert_eq!(between_outer_pair("foo(\"a)\")", '(', ')'), Some("\"a)\""));
        assert_eq!(between_outer_pair("foo(a", '(', ')'), None);
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("foo(a, (b))", '(', ')'));
        assert!(is_balanced("foo(')')", '(', ')'));
        assert!(!is_balanced("foo((a)", '(', ')'));
        assert!(!is_balanced("foo(a))", '(', ')'));
    }

    #[test]
    fn test_split_safe_quote() {
        assert_eq!(split_safe_quote("", ','), Vec::<String>::new());
        assert_eq!(split_safe_quote(" a ", ','), vec!["a"]);
        assert_eq!(split_safe_quote("a,,b", ','), vec!["a", "", "b"]);
        assert_eq!(split_safe_quote("\"x, y\", [1, 2], {k, v}", ','), vec!["\"x, y\"", "[1, 2]", "{k, v}"]);
    }

    #[test]
    fn test_quotes() {
        assert_eq!(remove_leading_and_ending_quotes("'Camel'"), "Camel");
        assert_eq!(remove_leading_and_ending_quotes("\"Camel\""), "Camel");
        assert_eq!(remove_leading_and_ending_quotes("'Camel\""), "'Camel\"");
        assert_eq!(remove_leading_and_ending_quotes("'"), "'");
        assert!(is_identifier_start('$'));
        assert!(!is_identifier_start('-'));
        assert!(is_identifier_part('9'));
    }
}
