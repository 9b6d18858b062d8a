use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Роль пользователя. Вместо иерархии Admin/Staff/Customer - одна сущность и тег.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Staff,
    Customer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BookSeats,
    ManageBookings,
    ScheduleShows,
}

impl Role {
    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::BookSeats => matches!(self, Role::Customer),
            Capability::ManageBookings => matches!(self, Role::Staff | Role::Admin),
            Capability::ScheduleShows => matches!(self, Role::Admin),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Staff" => Ok(Role::Staff),
            "Customer" => Ok(Role::Customer),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
}

impl User {
    // Найти пользователя по email
    pub async fn find_by_email(email: &str, db: &crate::database::Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role FROM users WHERE email = $1"
        )
        .bind(email)
        .fetch_optional(&db.pool)
        .await
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }

    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}
