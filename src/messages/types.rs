use crate::messages::attachment::DataUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }
}

/// A citation returned alongside a grounded response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A finished transcript entry.
///
/// Turns are immutable once appended. The only way to build one with an
/// image or sources is through a user or model constructor, so system
/// notices stay plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    id: Uuid,
    role: Role,
    text: String,
    image: Option<DataUri>,
    sources: Vec<Source>,
    timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, image: Option<DataUri>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            image,
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Model,
            text: text.into(),
            image: None,
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::System,
            text: text.into(),
            image: None,
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image(&self) -> Option<&DataUri> {
        self.image.as_ref()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// The model turn currently being streamed into.
///
/// Starts empty before any response bytes arrive. Text is only ever
/// appended (or replaced wholesale on failure) and sources only grow.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    id: Uuid,
    text: String,
    image: Option<DataUri>,
    sources: Vec<Source>,
    timestamp: DateTime<Utc>,
}

impl PendingTurn {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            text: String::new(),
            image: None,
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn image(&self) -> Option<&DataUri> {
        self.image.as_ref()
    }

    /// Append one increment. Sources already present are not repeated.
    pub fn append(&mut self, delta: &str, sources: &[Source]) {
        self.text.push_str(delta);
        for source in sources {
            if !self.sources.contains(source) {
                self.sources.push(source.clone());
            }
        }
    }

    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_image(&mut self, image: Option<DataUri>) {
        self.image = image;
    }

    /// Render the in-progress state as a turn, keeping the same id.
    pub fn snapshot(&self) -> Turn {
        Turn {
            id: self.id,
            role: Role::Model,
            text: self.text.clone(),
            image: self.image.clone(),
            sources: self.sources.clone(),
            timestamp: self.timestamp,
        }
    }

    pub fn into_turn(self) -> Turn {
        Turn {
            id: self.id,
            role: Role::Model,
            text: self.text,
            image: self.image,
            sources: self.sources,
            timestamp: self.timestamp,
        }
    }
}

impl Default for PendingTurn {
    fn default() -> Self {
        Self::new()
    }
}
