use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::models::{
    AuthToken, Booking, BookingStatus, DayOfWeek, Provider, Service, TimeOfDay, User,
    WorkingHourWindow,
};

/// Stored instant format. UTC, and lexicographic order matches chronological
/// order, so SQL range and overlap predicates work on the raw strings.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid datetime in database: {s}: {e}"))
}

// ── Users & tokens ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            format_datetime(user.created_at),
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let created_at_str: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1",
        params![email],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_auth_token(conn: &Connection, token: &AuthToken) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO auth_tokens (token, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            token.token,
            token.user_id,
            format_datetime(token.created_at),
            format_datetime(token.expires_at),
        ],
    )?;
    Ok(())
}

/// Resolves a bearer token to its user. Expired tokens resolve to nothing.
pub fn get_user_by_token(
    conn: &Connection,
    token: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT u.id, u.name, u.email, u.password_hash, u.created_at
         FROM auth_tokens t
         JOIN users u ON u.id = t.user_id
         WHERE t.token = ?1 AND t.expires_at > ?2",
        params![token, format_datetime(now)],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Providers ──

pub fn create_provider(conn: &Connection, provider: &Provider) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO providers (id, name, description, timezone, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            provider.id,
            provider.name,
            provider.description,
            provider.timezone,
            provider.created_by,
            format_datetime(provider.created_at),
        ],
    )?;
    Ok(())
}

fn parse_provider_row(row: &rusqlite::Row) -> anyhow::Result<Provider> {
    let created_at_str: String = row.get(5)?;
    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        timezone: row.get(3)?,
        created_by: row.get(4)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

pub fn get_provider(conn: &Connection, id: &str) -> anyhow::Result<Option<Provider>> {
    let result = conn.query_row(
        "SELECT id, name, description, timezone, created_by, created_at
         FROM providers WHERE id = ?1",
        params![id],
        |row| Ok(parse_provider_row(row)),
    );

    match result {
        Ok(provider) => Ok(Some(provider?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_providers(conn: &Connection) -> anyhow::Result<Vec<Provider>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, timezone, created_by, created_at
         FROM providers ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], |row| Ok(parse_provider_row(row)))?;

    let mut providers = vec![];
    for row in rows {
        providers.push(row??);
    }
    Ok(providers)
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, provider_id, name, duration_minutes, price_cents, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id,
            service.provider_id,
            service.name,
            service.duration_minutes,
            service.price_cents,
            format_datetime(service.created_at),
        ],
    )?;
    Ok(())
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let created_at_str: String = row.get(5)?;
    Ok(Service {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        price_cents: row.get(4)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, provider_id, name, duration_minutes, price_cents, created_at
         FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services_for_provider(
    conn: &Connection,
    provider_id: &str,
) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, provider_id, name, duration_minutes, price_cents, created_at
         FROM services WHERE provider_id = ?1 ORDER BY name ASC",
    )?;

    let rows = stmt.query_map(params![provider_id], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

// ── Working hours ──

/// Replaces the provider's whole weekly schedule in one transaction.
pub fn replace_working_hours(
    conn: &Connection,
    provider_id: &str,
    windows: &[WorkingHourWindow],
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "DELETE FROM working_hours WHERE provider_id = ?1",
        params![provider_id],
    )?;

    for window in windows {
        tx.execute(
            "INSERT INTO working_hours (id, provider_id, day_of_week, start_minutes, end_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                window.id,
                window.provider_id,
                window.day_of_week.index(),
                window.start.minutes(),
                window.end.minutes(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn parse_window_row(row: &rusqlite::Row) -> anyhow::Result<WorkingHourWindow> {
    let day: i64 = row.get(2)?;
    let start: i64 = row.get(3)?;
    let end: i64 = row.get(4)?;

    Ok(WorkingHourWindow {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        day_of_week: DayOfWeek::from_index(day)
            .ok_or_else(|| anyhow::anyhow!("invalid day_of_week in database: {day}"))?,
        start: TimeOfDay::from_minutes(start)
            .ok_or_else(|| anyhow::anyhow!("invalid start_minutes in database: {start}"))?,
        end: TimeOfDay::from_minutes(end)
            .ok_or_else(|| anyhow::anyhow!("invalid end_minutes in database: {end}"))?,
    })
}

pub fn list_working_hours(
    conn: &Connection,
    provider_id: &str,
) -> anyhow::Result<Vec<WorkingHourWindow>> {
    let mut stmt = conn.prepare(
        "SELECT id, provider_id, day_of_week, start_minutes, end_minutes
         FROM working_hours WHERE provider_id = ?1
         ORDER BY day_of_week ASC, start_minutes ASC",
    )?;

    let rows = stmt.query_map(params![provider_id], |row| Ok(parse_window_row(row)))?;

    let mut windows = vec![];
    for row in rows {
        windows.push(row??);
    }
    Ok(windows)
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, provider_id, service_id, start_time, end_time,
                               status, cancelled_at, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.user_id,
            booking.provider_id,
            booking.service_id,
            format_datetime(booking.start_time),
            format_datetime(booking.end_time),
            booking.status.as_str(),
            booking.cancelled_at.map(format_datetime),
            booking.notes,
            format_datetime(booking.created_at),
            format_datetime(booking.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let cancelled_at_str: Option<String> = row.get(7)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider_id: row.get(2)?,
        service_id: row.get(3)?,
        start_time: parse_datetime(&start_str)?,
        end_time: parse_datetime(&end_str)?,
        status: BookingStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status in database: {status_str}"))?,
        cancelled_at: cancelled_at_str.map(|s| parse_datetime(&s)).transpose()?,
        notes: row.get(8)?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, user_id, provider_id, service_id, start_time, end_time,
                status, cancelled_at, notes, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, user_id, provider_id, service_id, start_time, end_time,
                    status, cancelled_at, notes, created_at, updated_at
             FROM bookings WHERE user_id = ?1 AND status = ?2
             ORDER BY start_time DESC LIMIT ?3"
                .to_string(),
            vec![
                Box::new(user_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(status.to_string()),
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, user_id, provider_id, service_id, start_time, end_time,
                    status, cancelled_at, notes, created_at, updated_at
             FROM bookings WHERE user_id = ?1
             ORDER BY start_time DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(user_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Active bookings whose [start, end) interval intersects [from, to).
pub fn active_bookings_in_range(
    conn: &Connection,
    provider_id: &str,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, provider_id, service_id, start_time, end_time,
                status, cancelled_at, notes, created_at, updated_at
         FROM bookings
         WHERE provider_id = ?1 AND status = 'booked' AND cancelled_at IS NULL
           AND start_time < ?3 AND end_time > ?2
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(
        params![provider_id, format_datetime(from), format_datetime(to)],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// True when any active booking for the provider overlaps [start, end),
/// half-open: shared endpoints do not count as overlap.
pub fn booking_overlap_exists(
    conn: &Connection,
    provider_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE provider_id = ?1 AND status = 'booked' AND cancelled_at IS NULL
           AND start_time < ?3 AND end_time > ?2
           AND (?4 IS NULL OR id != ?4)",
        params![
            provider_id,
            format_datetime(start),
            format_datetime(end),
            exclude_booking_id,
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_booking_times(
    conn: &Connection,
    id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET start_time = ?2, end_time = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            id,
            format_datetime(start),
            format_datetime(end),
            format_datetime(now),
        ],
    )?;
    Ok(count > 0)
}

pub fn cancel_booking(conn: &Connection, id: &str, now: NaiveDateTime) -> anyhow::Result<bool> {
    let now_str = format_datetime(now);
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'cancelled', cancelled_at = ?2, updated_at = ?2
         WHERE id = ?1 AND status != 'cancelled'",
        params![id, now_str],
    )?;
    Ok(count > 0)
}
