use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Issue,
    Replacement,
    Rewrite,
    Reference,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Issue => "issue",
            EventCategory::Replacement => "replacement",
            EventCategory::Rewrite => "rewrite",
            EventCategory::Reference => "reference",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured record of something the repair found or did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairEvent {
    pub category: EventCategory,
    pub subject: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub success: bool,
    pub detail: String,
}

impl RepairEvent {
    pub fn new(category: EventCategory, subject: impl Into<String>) -> Self {
        Self {
            category,
            subject: subject.into(),
            before: None,
            after: None,
            success: true,
            detail: String::new(),
        }
    }

    pub fn before(mut self, value: impl ToString) -> Self {
        self.before = Some(value.to_string());
        self
    }

    pub fn after(mut self, value: impl ToString) -> Self {
        self.after = Some(value.to_string());
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}
