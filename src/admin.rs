// 🛡️ Administration
// User overview, cascade deletion and global statistics (admins only)

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{HabitError, Result};
use crate::model::User;
use crate::stats::{admin_stats, AdminStats};
use crate::store::HabitStore;
use crate::tracker::{HabitTracker, HabitView};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub habit_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDetail {
    pub user: User,
    pub habits: Vec<HabitView>,
}

impl<S: HabitStore> HabitTracker<S> {
    /// The acting user, if they are an admin
    fn require_admin(&self, admin_id: &str) -> Result<User> {
        let admin = self.store().get_user(admin_id)?;

        if !admin.is_admin {
            return Err(HabitError::Forbidden("admin access required".into()));
        }

        Ok(admin)
    }

    pub fn admin_list_users(&self, admin_id: &str) -> Result<Vec<UserSummary>> {
        self.require_admin(admin_id)?;

        self.store()
            .list_users()?
            .into_iter()
            .map(|user| -> Result<UserSummary> {
                let habit_count = self.store().count_habits(&user.id)?;
                Ok(UserSummary { user, habit_count })
            })
            .collect()
    }

    pub fn admin_user_detail(&self, admin_id: &str, user_id: &str) -> Result<UserDetail> {
        self.require_admin(admin_id)?;

        let user = self.store().get_user(user_id)?;
        let habits = self.habits(user_id)?;
        Ok(UserDetail { user, habits })
    }

    /// Delete a user with all their habits. Admins cannot delete themselves.
    pub fn admin_delete_user(&self, admin_id: &str, user_id: &str) -> Result<usize> {
        self.require_admin(admin_id)?;

        if admin_id == user_id {
            return Err(HabitError::Forbidden("cannot delete your own account".into()));
        }

        let removed = self.store().delete_user(user_id)?;

        info!(user_id, habits_removed = removed, "user deleted");
        let data = json!({ "habits_removed": removed });
        self.log_event("user_deleted", "user", user_id, data, admin_id);

        Ok(removed)
    }

    pub fn admin_stats(&self, admin_id: &str) -> Result<AdminStats> {
        self.require_admin(admin_id)?;

        let users = self.store().list_users()?;
        let habits = self.store().list_all_habits()?;
        Ok(admin_stats(&users, &habits, self.today()))
    }
}
