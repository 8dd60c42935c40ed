use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for secrets (password hashes, verification codes, PAN numbers)
/// that prints as `********` in `Debug` and `Display`.
///
/// Serialization passes the real value through; only log output is masked.
/// Fields that must never leave the service are skipped at the struct level.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_value() {
        let code = Masked("123456".to_string());
        assert_eq!(format!("{:?}", code), "********");
        assert_eq!(format!("{}", code), "********");
        assert_eq!(code.expose(), "123456");
    }

    #[test]
    fn test_serialize_passes_through() {
        let pan = Masked("ABCDE1234F".to_string());
        assert_eq!(serde_json::to_string(&pan).unwrap(), "\"ABCDE1234F\"");

        let back: Masked<String> = serde_json::from_str("\"ABCDE1234F\"").unwrap();
        assert_eq!(back, pan);
    }
}
