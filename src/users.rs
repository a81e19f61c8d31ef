use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" | "s" => Ok(Role::Student),
            "teacher" | "t" => Ok(Role::Teacher),
            other => anyhow::bail!("Unknown role '{}'. Use 'student' or 'teacher'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    /// Guard for teacher-only operations
    pub fn require_teacher(&self, action: &str) -> Result<()> {
        if !self.is_teacher() {
            anyhow::bail!(
                "Only teachers can {}. '{}' is a {} profile",
                action,
                self.name,
                self.role
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 1,
            name: "sam".to_string(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_role() {
        assert_eq!("Teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!(" s ".parse::<Role>().unwrap(), Role::Student);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_require_teacher() {
        assert!(user(Role::Teacher).require_teacher("create classes").is_ok());

        let err = user(Role::Student)
            .require_teacher("create classes")
            .unwrap_err();
        assert!(err.to_string().contains("Only teachers can create classes"));
    }
}
