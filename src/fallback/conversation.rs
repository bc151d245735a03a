use serde_json::{Map, Value, json};

/// Speaker of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Human/user role.
    User,
    /// Assistant role.
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Model that produced an assistant turn. Never sent to the service.
    pub model: Option<String>,
    /// Optional `data:` URL attached to the turn.
    pub image: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model: None,
            image: None,
        }
    }

    pub fn assistant(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            model: Some(model.into()),
            image: None,
        }
    }

    /// Attaches an image data URL to this turn.
    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image = Some(data_url.into());
        self
    }

    /// Serializes this turn to chat-completions JSON.
    ///
    /// A turn carrying an image is sent as a multipart array with an optional
    /// text part followed by the `image_url` part.
    pub fn to_json(&self) -> Value {
        let content = match &self.image {
            None => Value::String(self.content.clone()),
            Some(url) => {
                let mut parts = Vec::with_capacity(2);
                if !self.content.is_empty() {
                    parts.push(json!({ "type": "text", "text": self.content }));
                }
                parts.push(json!({ "type": "image_url", "image_url": { "url": url } }));
                Value::Array(parts)
            }
        };

        let mut map = Map::new();
        map.insert(
            "role".to_string(),
            Value::String(self.role.as_str().to_string()),
        );
        map.insert("content".to_string(), content);
        Value::Object(map)
    }
}

/// Ordered sequence of turns owned by the caller's session.
pub type Conversation = Vec<Turn>;

/// Serializes a whole conversation to the `messages` array.
pub fn to_messages(conversation: &[Turn]) -> Vec<Value> {
    conversation.iter().map(Turn::to_json).collect()
}
