use diesel::{Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::subscribers)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscriber {
    pub user_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Subscriber {
    /// Email first, phone as fallback.
    pub fn preferred_contact(&self) -> Option<&str> {
        [self.email.as_deref(), self.phone.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|c| !c.is_empty())
    }
}

#[derive(Insertable, Debug, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = crate::db::schema::subscribers)]
pub struct NewSubscriber {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
