use serde::{Deserialize, Serialize};

use crate::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
}

impl Author {
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// `name#1234`, or just the name for accounts without a legacy discriminator.
    pub fn tag(&self) -> String {
        match self.discriminator.as_str() {
            "" | "0" => self.username.clone(),
            disc => format!("{}#{}", self.username, disc),
        }
    }
}

/// One message as returned by the remote store. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub timestamp: String,
    pub author: Author,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
}

impl Message {
    /// Blank text with at least one attachment or embed.
    pub fn is_media_only(&self) -> bool {
        self.content.trim().is_empty() && (!self.attachments.is_empty() || !self.embeds.is_empty())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(content: &str, attachments: usize, embeds: usize) -> Message {
        Message {
            id: Snowflake::parse("1").unwrap(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            author: Author {
                id: "9".to_string(),
                username: "ann".to_string(),
                discriminator: "0".to_string(),
                global_name: None,
            },
            content: content.to_string(),
            attachments: vec![json!({"id": "a"}); attachments],
            embeds: vec![json!({"type": "rich"}); embeds],
        }
    }

    #[test]
    fn media_only_requires_blank_text_and_media() {
        assert!(message("", 1, 0).is_media_only());
        assert!(message("   ", 0, 2).is_media_only());
        assert!(!message("", 0, 0).is_media_only());
        assert!(!message("look", 1, 1).is_media_only());
    }

    #[test]
    fn deserializes_remote_shape_and_ignores_unknown_fields() {
        let raw = json!({
            "id": "1151456287954198578",
            "type": 0,
            "timestamp": "2023-09-13T10:00:00.000000+00:00",
            "author": {"id": "42", "username": "ann", "discriminator": "0", "global_name": "Ann"},
            "content": null,
            "pinned": false
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.id.as_str(), "1151456287954198578");
        assert_eq!(msg.content, "");
        assert!(msg.attachments.is_empty());
        assert_eq!(msg.author.display_name(), "Ann");
        assert_eq!(msg.author.tag(), "ann");
    }

    #[test]
    fn legacy_discriminator_is_kept_in_tag() {
        let mut msg = message("hi", 0, 0);
        msg.author.discriminator = "1234".to_string();
        assert_eq!(msg.author.tag(), "ann#1234");
    }
}
