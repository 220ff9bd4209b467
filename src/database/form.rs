use std::str::FromStr;

use super::error::TypeError;

/// Decoded query string, keeping repeated keys in request order.
#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: Vec<(String, String)>,
}

impl Form {
    pub fn from_query(query: &str) -> Result<Self, TypeError> {
        let inner: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|_| TypeError::new("Malformed query string"))?;

        Ok(Self { inner })
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            inner: pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// First non-empty value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.trim())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.trim())
            .collect()
    }

    /// Parsed value for `key`; missing or unparsable values read as absent.
    pub fn get_number<T>(&self, key: &str) -> Option<T>
    where
        T: FromStr,
    {
        self.get_str(key).and_then(|v| v.parse().ok())
    }

    /// Re-encodes the query with `key` set to `value`, dropping previous values of `key`.
    pub fn with_value(&self, key: &str, value: &str) -> String {
        let mut pairs: Vec<(&str, &str)> = self
            .inner
            .iter()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.push((key, value));

        serde_urlencoded::to_string(pairs).unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_str(key)?.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_repeated_keys() {
        let form = Form::from_query("tags=breakfast&tags=lunch&author=3").unwrap();

        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
        assert_eq!(form.get_number::<i32>("author"), Some(3));
    }

    #[test]
    fn unparsable_values_are_absent() {
        let form = Form::from_query("author=abc&is_favorited=maybe&limit=").unwrap();

        assert_eq!(form.get_number::<i32>("author"), None);
        assert_eq!(form.get_bool("is_favorited"), None);
        assert_eq!(form.get_str("limit"), None);
    }

    #[test]
    fn parses_boolean_flags() {
        let form = Form::from_pairs(&[("is_favorited", "1"), ("is_in_shopping_cart", "false")]);

        assert_eq!(form.get_bool("is_favorited"), Some(true));
        assert_eq!(form.get_bool("is_in_shopping_cart"), Some(false));
    }

    #[test]
    fn replaces_single_key_when_re_encoding() {
        let form = Form::from_query("page=2&tags=a&tags=b").unwrap();
        assert_eq!(form.with_value("page", "3"), "tags=a&tags=b&page=3");
    }

    #[test]
    fn decodes_percent_encoding() {
        let form = Form::from_query("name=%D1%81%D0%BE%D0%BB%D1%8C").unwrap();
        assert_eq!(form.get_str("name"), Some("соль"));
    }
}
