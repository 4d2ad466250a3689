use std::fmt;

/// API credential wrapper that keeps token material out of debug output.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_the_token() {
        let token = Token::from("super-secret");

        assert_eq!(format!("{token:?}"), "Token(***)");
    }

    #[test]
    fn as_str_returns_the_raw_token() {
        let token = Token::from(String::from("super-secret"));

        assert_eq!(token.as_str(), "super-secret");
    }
}
