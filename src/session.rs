use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::router::Screen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Anything that is not exactly `student` lands on the teacher side.
    pub fn from_tag(tag: &str) -> Role {
        if tag == "student" {
            Role::Student
        } else {
            Role::Teacher
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    pub fn home(&self) -> Screen {
        match self {
            Role::Student => Screen::StudentHome,
            Role::Teacher => Screen::TeacherHome,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("user record is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("user record must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// The server's user object, kept whole. Only a few fields are read for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(map) => Ok(UserRecord(map)),
            Value::Null => Err(RecordError::NotAnObject("null")),
            Value::Bool(_) => Err(RecordError::NotAnObject("a boolean")),
            Value::Number(_) => Err(RecordError::NotAnObject("a number")),
            Value::String(_) => Err(RecordError::NotAnObject("a string")),
            Value::Array(_) => Err(RecordError::NotAnObject("an array")),
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn email(&self) -> Option<&str> {
        self.text("email")
    }

    pub fn display_name(&self) -> &str {
        self.name().or_else(|| self.email()).unwrap_or("there")
    }
}

/// An authenticated identity. Exists only with all three parts present.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub user: UserRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_role_tags_map_to_teacher() {
        assert_eq!(Role::from_tag("student"), Role::Student);
        assert_eq!(Role::from_tag("teacher"), Role::Teacher);
        assert_eq!(Role::from_tag("admin"), Role::Teacher);
        assert_eq!(Role::from_tag("Student"), Role::Teacher);
    }

    #[test]
    fn record_round_trips_through_its_string_form() {
        let record = UserRecord::from_value(json!({"name": "Ana", "id": "u-1"})).unwrap();
        let raw = serde_json::to_string(&record).unwrap();
        assert_eq!(UserRecord::parse(&raw).unwrap(), record);
        assert_eq!(record.display_name(), "Ana");
    }

    #[test]
    fn non_object_records_are_rejected() {
        assert!(matches!(UserRecord::parse("not-json"), Err(RecordError::Malformed(_))));
        assert!(matches!(UserRecord::parse("null"), Err(RecordError::NotAnObject(_))));
        assert!(matches!(UserRecord::parse("[1,2]"), Err(RecordError::NotAnObject(_))));
    }
}
