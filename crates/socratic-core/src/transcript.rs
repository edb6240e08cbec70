use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Agent,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::User => f.write_str("user"),
            Origin::Agent => f.write_str("agent"),
        }
    }
}

/// A single entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            origin: Origin::Agent,
            content: content.into(),
        }
    }
}

/// Append-only conversation record. The last element is always the most
/// recent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("what is virtue?"));
        transcript.append(Message::agent("what do you think it is?"));

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().unwrap().origin, Origin::Agent);
        assert_eq!(transcript.messages()[0].content, "what is virtue?");
    }

    #[test]
    fn test_origin_accepts_legacy_tags() {
        let human: Origin = serde_json::from_str("\"human\"").unwrap();
        let ai: Origin = serde_json::from_str("\"ai\"").unwrap();
        assert_eq!(human, Origin::User);
        assert_eq!(ai, Origin::Agent);
        assert_eq!(serde_json::to_string(&Origin::Agent).unwrap(), "\"agent\"");
    }
}
