use serde::{Deserialize, Serialize};

/// Key/value pair extracted from an artifact's content for reuse by other activities
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedPair {
    /// Share key (e.g. a form field name)
    pub key: String,

    /// Share value
    pub value: String,
}

impl SharedPair {
    /// Create a new shared pair
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The value recorded for one activity of one process instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// MIME-like content type of `content`
    pub content_type: String,

    /// Opaque payload. Its structure depends on the activity's artifact definition.
    pub content: Vec<u8>,

    /// Ordered pairs shared with other activities
    pub shared_information: Vec<SharedPair>,

    /// Creation time in epoch milliseconds
    pub creation_date: i64,

    /// Commit time in epoch milliseconds (0 while uncommitted)
    pub commit_date: i64,
}

impl Artifact {
    /// Create an artifact with empty metadata around `content`
    pub fn new(id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            content_type: String::new(),
            content: content.into(),
            shared_information: Vec::new(),
            creation_date: 0,
            commit_date: 0,
        }
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Append a shared pair
    pub fn with_share(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.shared_information.push(SharedPair::new(key, value));
        self
    }

    /// Set both dates
    pub fn with_dates(mut self, creation_date: i64, commit_date: i64) -> Self {
        self.creation_date = creation_date;
        self.commit_date = commit_date;
        self
    }

    /// Look up the first shared value for `key`
    pub fn shared_value(&self, key: &str) -> Option<&str> {
        self.shared_information
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }
}
