use chrono::NaiveDateTime;
use serde::Serialize;

/// Someone whose calendar can be booked. The timezone is an IANA name
/// ("America/New_York") and governs how working hours map onto real dates.
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub timezone: String,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}
