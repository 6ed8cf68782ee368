use serde::Deserialize;
use serde_json::error::Category;
use thiserror::Error;

const PERMALINK_BASE: &str = "https://twitter.com";

/// An undecoded text payload as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage(String);

impl RawMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
}

/// One decoded post. Lives only long enough to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: String,
    pub author: Author,
    /// Passed through untouched; never parsed.
    pub created_at: String,
    pub body: String,
}

impl StreamRecord {
    pub fn permalink(&self) -> String {
        format!("{}/{}/status/{}", PERMALINK_BASE, self.author.handle, self.id)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("payload does not match the record schema: {0}")]
    Schema(#[source] serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => DecodeError::Schema(err),
            Category::Io | Category::Syntax | Category::Eof => DecodeError::Syntax(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePost {
    id_str: String,
    text: String,
    created_at: String,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    name: String,
    screen_name: String,
    profile_image_url_https: String,
}

/// Decode one inbound payload. Failure only concerns this message.
pub fn decode(raw: &RawMessage) -> Result<StreamRecord, DecodeError> {
    let post: WirePost = serde_json::from_str(raw.as_str())?;

    Ok(StreamRecord {
        id: post.id_str,
        author: Author {
            display_name: post.user.name,
            handle: post.user.screen_name,
            avatar_url: post.user.profile_image_url_https,
        },
        created_at: post.created_at,
        body: post.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"id_str":"42","text":"hi","created_at":"t","user":{"name":"A","screen_name":"a","profile_image_url_https":"u"}}"#;

    #[test]
    fn test_decode_valid_payload() {
        let record = decode(&RawMessage::from(VALID)).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.body, "hi");
        assert_eq!(record.created_at, "t");
        assert_eq!(record.author.display_name, "A");
        assert_eq!(record.author.handle, "a");
        assert_eq!(record.author.avatar_url, "u");
        assert_eq!(record.permalink(), "https://twitter.com/a/status/42");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let raw = r#"{"id_str":"7","text":"x","created_at":"Mon Jan 01","lang":"en","retweet_count":3,
            "user":{"name":"N","screen_name":"n","profile_image_url_https":"https://img/n.png","followers_count":9}}"#;
        let record = decode(&RawMessage::from(raw)).unwrap();
        assert_eq!(record.permalink(), "https://twitter.com/n/status/7");
        assert_eq!(record.created_at, "Mon Jan 01");
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = decode(&RawMessage::from("{not json")).unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(_)));
    }

    #[test]
    fn test_decode_rejects_each_missing_field() {
        let full: serde_json::Value = serde_json::from_str(VALID).unwrap();
        let top_level = ["id_str", "text", "created_at", "user"];
        let user_level = ["name", "screen_name", "profile_image_url_https"];

        for field in top_level {
            let mut value = full.clone();
            value.as_object_mut().unwrap().remove(field);
            let err = decode(&RawMessage::from(value.to_string())).unwrap_err();
            assert!(matches!(err, DecodeError::Schema(_)), "field {}", field);
        }
        for field in user_level {
            let mut value = full.clone();
            value["user"].as_object_mut().unwrap().remove(field);
            let err = decode(&RawMessage::from(value.to_string())).unwrap_err();
            assert!(matches!(err, DecodeError::Schema(_)), "user.{}", field);
        }
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let raw = r#"{"id_str":42,"text":"hi","created_at":"t","user":{"name":"A","screen_name":"a","profile_image_url_https":"u"}}"#;
        assert!(matches!(
            decode(&RawMessage::from(raw)),
            Err(DecodeError::Schema(_))
        ));
        assert!(decode(&RawMessage::from("[]")).is_err());
    }
}
