use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{DayOfWeek, Provider, Slot, TimeOfDay, WorkingHourWindow};
use crate::services::conflicts;

/// Computes every bookable slot for a provider over the next `days_ahead`
/// days, starting from the provider-local date of `now_utc`.
///
/// Slots are `slot_minutes` long, or the service's duration when
/// `service_id` is given. A slot survives only if it fits inside a
/// working-hour window, starts strictly after `now_utc`, and overlaps no
/// active booking. Output order is day, then window, then start time;
/// read-only against the database.
pub fn generate_available_slots(
    conn: &Connection,
    now_utc: DateTime<Utc>,
    provider: &Provider,
    days_ahead: i64,
    max_days_ahead: i64,
    slot_minutes: i64,
    service_id: Option<&str>,
) -> Result<Vec<Slot>, AppError> {
    if days_ahead <= 0 {
        return Err(AppError::InvalidArgument(
            "days_ahead must be a positive number of days".to_string(),
        ));
    }
    if days_ahead > max_days_ahead {
        return Err(AppError::InvalidArgument(format!(
            "days_ahead must be at most {max_days_ahead}"
        )));
    }
    if slot_minutes <= 0 {
        return Err(AppError::InvalidArgument(
            "slot_minutes must be a positive number of minutes".to_string(),
        ));
    }

    let duration_minutes = match service_id {
        Some(id) => {
            let service = queries::get_service(conn, id)?
                .filter(|s| s.provider_id == provider.id)
                .ok_or_else(|| AppError::NotFound(format!("service {id} not found")))?;
            service.duration_minutes
        }
        None => slot_minutes,
    };
    // longer than a day never fits a window, and huge values overflow
    // chrono::Duration
    if !(1..=TimeOfDay::END_OF_DAY.minutes()).contains(&duration_minutes) {
        return Err(AppError::InvalidArgument(
            "slot duration must be between 1 and 1440 minutes".to_string(),
        ));
    }
    let duration = Duration::minutes(duration_minutes);

    let tz = resolve_timezone(&provider.timezone)?;
    let today_local = now_utc.with_timezone(&tz).date_naive();

    // One range query covers the whole horizon, padded a day each side so
    // no zone offset can push a relevant booking outside the scan.
    let bookings = queries::active_bookings_in_range(
        conn,
        &provider.id,
        (now_utc - Duration::days(1)).naive_utc(),
        (now_utc + Duration::days(days_ahead + 1)).naive_utc(),
    )?;

    let windows = queries::list_working_hours(conn, &provider.id)?;

    let mut slots = Vec::new();

    for day_offset in 0..days_ahead {
        let date_local = today_local + Duration::days(day_offset);
        let weekday = DayOfWeek::from_weekday(date_local.weekday());

        // windows come back ordered by (day, start), so filtering keeps
        // the within-day order
        for window in windows.iter().filter(|w| w.day_of_week == weekday) {
            let (window_start, window_end) = match window_bounds_utc(tz, date_local, window) {
                Some(bounds) => bounds,
                None => continue,
            };

            let mut slot_start = window_start;
            while slot_start + duration <= window_end {
                let slot_end = slot_start + duration;

                let taken = bookings.iter().any(|b| {
                    conflicts::intervals_overlap(
                        b.start_time,
                        b.end_time,
                        slot_start.naive_utc(),
                        slot_end.naive_utc(),
                    )
                });
                if slot_start > now_utc && !taken {
                    if let Some(slot) = to_local_slot(tz, date_local, slot_start, slot_end) {
                        slots.push(slot);
                    }
                }

                slot_start = slot_end;
            }
        }
    }

    Ok(slots)
}

/// Empty or blank zone names mean UTC; anything else must be a valid IANA
/// name.
pub(crate) fn resolve_timezone(name: &str) -> Result<Tz, AppError> {
    if name.trim().is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse()
        .map_err(|_| AppError::InvalidArgument(format!("unknown timezone: {name}")))
}

/// Resolves a wall-clock time (minutes after local midnight, up to 1440 for
/// end-of-day) on `date` to a UTC instant. A time inside a DST gap resolves
/// to None; a repeated time in a fold takes the earlier instant.
pub(crate) fn local_instant(tz: Tz, date: NaiveDate, minutes_after_midnight: i64) -> Option<DateTime<Utc>> {
    let wall = date.and_hms_opt(0, 0, 0)? + Duration::minutes(minutes_after_midnight);
    tz.from_local_datetime(&wall)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn window_bounds_utc(
    tz: Tz,
    date_local: NaiveDate,
    window: &WorkingHourWindow,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_instant(tz, date_local, window.start.minutes())?;
    let end = local_instant(tz, date_local, window.end.minutes())?;
    if end <= start {
        return None;
    }
    Some((start, end))
}

fn to_local_slot(
    tz: Tz,
    date_local: NaiveDate,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
) -> Option<Slot> {
    let start_local = start_utc.with_timezone(&tz);
    let end_local = end_utc.with_timezone(&tz);

    let start = TimeOfDay::from_hm(start_local.hour(), start_local.minute());
    // an end on the next local midnight renders as 24:00 on this date
    let end = if end_local.date_naive() > date_local {
        TimeOfDay::END_OF_DAY
    } else {
        TimeOfDay::from_hm(end_local.hour(), end_local.minute())
    };

    // A fall-back day repeats wall times, and a reservation resolves a wall
    // time to its earliest instant. A candidate whose rendered labels do not
    // resolve back to its own endpoints would book a different interval than
    // it advertises, so it is not offered.
    if local_instant(tz, date_local, start.minutes()) != Some(start_utc)
        || local_instant(tz, date_local, end.minutes()) != Some(end_utc)
    {
        return None;
    }

    Some(Slot {
        date: date_local,
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, Service, User};
    use chrono::NaiveDateTime;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&dt(s))
    }

    fn seed_provider(conn: &Connection, timezone: &str) -> Provider {
        let created_at = dt("2025-06-01 00:00");
        let user = User {
            id: "user-1".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            created_at,
        };
        queries::create_user(conn, &user).unwrap();

        let provider = Provider {
            id: "prov-1".to_string(),
            name: "Dr. Smith".to_string(),
            description: None,
            timezone: timezone.to_string(),
            created_by: user.id.clone(),
            created_at,
        };
        queries::create_provider(conn, &provider).unwrap();
        provider
    }

    fn seed_service(conn: &Connection, id: &str, provider_id: &str, minutes: i64) -> Service {
        let service = Service {
            id: id.to_string(),
            provider_id: provider_id.to_string(),
            name: format!("Service {minutes}m"),
            duration_minutes: minutes,
            price_cents: None,
            created_at: dt("2025-06-01 00:00"),
        };
        queries::create_service(conn, &service).unwrap();
        service
    }

    fn set_windows(conn: &Connection, provider_id: &str, specs: &[(DayOfWeek, &str, &str)]) {
        let windows: Vec<WorkingHourWindow> = specs
            .iter()
            .enumerate()
            .map(|(i, (day, start, end))| WorkingHourWindow {
                id: format!("w-{i}"),
                provider_id: provider_id.to_string(),
                day_of_week: *day,
                start: start.parse().unwrap(),
                end: end.parse().unwrap(),
            })
            .collect();
        queries::replace_working_hours(conn, provider_id, &windows).unwrap();
    }

    fn seed_booking(conn: &Connection, id: &str, start: &str, end: &str, status: BookingStatus) {
        let now = dt("2025-06-01 00:00");
        let booking = Booking {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            provider_id: "prov-1".to_string(),
            service_id: "svc-1".to_string(),
            start_time: dt(start),
            end_time: dt(end),
            status,
            cancelled_at: match status {
                BookingStatus::Cancelled => Some(now),
                BookingStatus::Booked => None,
            },
            notes: None,
            created_at: now,
            updated_at: now,
        };
        queries::create_booking(conn, &booking).unwrap();
    }

    fn fmt_slots(slots: &[Slot]) -> Vec<String> {
        slots
            .iter()
            .map(|s| format!("{} {}-{}", s.date, s.start, s.end))
            .collect()
    }

    #[test]
    fn test_no_windows_means_no_slots() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            30,
            365,
            30,
            None,
        )
        .unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_monday_window_yields_two_half_hour_slots() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        // now is the prior Sunday, horizon covers exactly one Monday
        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(
            fmt_slots(&slots),
            vec!["2025-06-16 09:00-09:30", "2025-06-16 09:30-10:00"]
        );
    }

    #[test]
    fn test_now_cutoff_is_strict() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        // a slot starting exactly at now is not offered
        let slots = generate_available_slots(
            &conn,
            utc("2025-06-16 09:30"),
            &provider,
            1,
            365,
            30,
            None,
        )
        .unwrap();
        assert!(slots.is_empty());

        // one minute earlier the 09:30 slot is still on offer
        let slots = generate_available_slots(
            &conn,
            utc("2025-06-16 09:29"),
            &provider,
            1,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 09:30-10:00"]);
    }

    #[test]
    fn test_booked_interval_is_removed() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        seed_service(&conn, "svc-1", &provider.id, 30);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);
        seed_booking(&conn, "b-1", "2025-06-16 09:00", "2025-06-16 09:30", BookingStatus::Booked);

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 09:30-10:00"]);
    }

    #[test]
    fn test_touching_booking_does_not_block() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        seed_service(&conn, "svc-1", &provider.id, 30);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);
        // ends exactly where the window starts
        seed_booking(&conn, "b-1", "2025-06-16 08:30", "2025-06-16 09:00", BookingStatus::Booked);

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_cancelled_booking_frees_its_slot() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        seed_service(&conn, "svc-1", &provider.id, 30);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);
        seed_booking(
            &conn,
            "b-1",
            "2025-06-16 09:00",
            "2025-06-16 09:30",
            BookingStatus::Cancelled,
        );

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_fully_booked_day_yields_nothing() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        seed_service(&conn, "svc-1", &provider.id, 60);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "17:00")]);
        for hour in 9..17 {
            seed_booking(
                &conn,
                &format!("b-{hour}"),
                &format!("2025-06-16 {hour:02}:00"),
                &format!("2025-06-16 {:02}:00", hour + 1),
                BookingStatus::Booked,
            );
        }

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            60,
            None,
        )
        .unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_partial_trailing_slot_is_dropped() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        // 45-minute slots in a 60-minute window: only one fits
        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            45,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 09:00-09:45"]);
    }

    #[test]
    fn test_service_duration_overrides_slot_minutes() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        seed_service(&conn, "svc-60", &provider.id, 60);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            Some("svc-60"),
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 09:00-10:00"]);
    }

    #[test]
    fn test_unknown_service_is_not_found() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        let err = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            Some("missing"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_other_providers_service_is_not_found() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        let other = Provider {
            id: "prov-2".to_string(),
            name: "Dr. Jones".to_string(),
            description: None,
            timezone: "UTC".to_string(),
            created_by: "user-1".to_string(),
            created_at: dt("2025-06-01 00:00"),
        };
        queries::create_provider(&conn, &other).unwrap();
        seed_service(&conn, "svc-other", &other.id, 30);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        let err = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            Some("svc-other"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        let now = utc("2025-06-15 12:00");

        for (days, minutes) in [(0, 30), (-1, 30), (7, 0), (7, -15), (400, 30)] {
            let err = generate_available_slots(&conn, now, &provider, days, 365, minutes, None)
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)), "days={days} minutes={minutes}");
        }
    }

    #[test]
    fn test_oversized_duration_is_rejected() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);
        let now = utc("2025-06-15 12:00");

        for minutes in [1441, i64::MAX] {
            let err = generate_available_slots(&conn, now, &provider, 7, 365, minutes, None)
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)), "minutes={minutes}");
        }

        // a stored service duration out of range is refused the same way
        seed_service(&conn, "svc-big", &provider.id, i64::MAX);
        let err = generate_available_slots(&conn, now, &provider, 7, 365, 30, Some("svc-big"))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_timezone_is_invalid_argument() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "Mars/Olympus_Mons");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        let err = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn test_blank_timezone_falls_back_to_utc() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            60,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 09:00-10:00"]);
    }

    #[test]
    fn test_new_york_slots_are_local_wall_clock() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "America/New_York");
        seed_service(&conn, "svc-1", &provider.id, 30);
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "09:00", "10:00")]);

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(
            fmt_slots(&slots),
            vec!["2025-06-16 09:00-09:30", "2025-06-16 09:30-10:00"]
        );

        // June is EDT (UTC-4): local 09:00 is 13:00 UTC, so a booking
        // stored at 13:00 UTC must knock out the 09:00 local slot
        seed_booking(&conn, "b-1", "2025-06-16 13:00", "2025-06-16 13:30", BookingStatus::Booked);
        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 09:30-10:00"]);
    }

    #[test]
    fn test_spring_forward_gap_window_is_skipped() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "America/New_York");
        // 2025-03-09 has no 02:00 local; clocks jump from 02:00 to 03:00
        set_windows(&conn, &provider.id, &[(DayOfWeek::Sunday, "02:00", "03:00")]);

        let slots = generate_available_slots(
            &conn,
            utc("2025-03-08 12:00"),
            &provider,
            2,
            365,
            60,
            None,
        )
        .unwrap();
        assert!(slots.is_empty());

        // the following Sunday has a real 02:00 again
        let slots = generate_available_slots(
            &conn,
            utc("2025-03-08 12:00"),
            &provider,
            9,
            365,
            60,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-03-16 02:00-03:00"]);
    }

    #[test]
    fn test_fall_back_fold_second_pass_not_advertised() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "America/New_York");
        // 2025-11-02: clocks fall back at 02:00 EDT, so 01:00-01:59 repeats
        set_windows(&conn, &provider.id, &[(DayOfWeek::Sunday, "01:00", "03:00")]);

        let slots = generate_available_slots(
            &conn,
            utc("2025-11-01 12:00"),
            &provider,
            7,
            365,
            30,
            None,
        )
        .unwrap();

        // the window covers three UTC hours, but only labels that resolve
        // back to their own instants are offered; the repeated hour's second
        // pass and the slot straddling the fold are not
        assert_eq!(
            fmt_slots(&slots),
            vec![
                "2025-11-02 01:00-01:30",
                "2025-11-02 02:00-02:30",
                "2025-11-02 02:30-03:00",
            ]
        );
    }

    #[test]
    fn test_output_is_ordered_and_deterministic() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        // inserted out of order on purpose
        set_windows(
            &conn,
            &provider.id,
            &[
                (DayOfWeek::Tuesday, "08:00", "09:00"),
                (DayOfWeek::Monday, "14:00", "15:00"),
                (DayOfWeek::Monday, "09:00", "10:00"),
            ],
        );

        let now = utc("2025-06-15 12:00");
        let slots = generate_available_slots(&conn, now, &provider, 7, 365, 30, None).unwrap();
        assert_eq!(
            fmt_slots(&slots),
            vec![
                "2025-06-16 09:00-09:30",
                "2025-06-16 09:30-10:00",
                "2025-06-16 14:00-14:30",
                "2025-06-16 14:30-15:00",
                "2025-06-17 08:00-08:30",
                "2025-06-17 08:30-09:00",
            ]
        );

        let again = generate_available_slots(&conn, now, &provider, 7, 365, 30, None).unwrap();
        assert_eq!(slots, again);
    }

    #[test]
    fn test_window_reaching_midnight_renders_24_00() {
        let conn = setup_db();
        let provider = seed_provider(&conn, "UTC");
        set_windows(&conn, &provider.id, &[(DayOfWeek::Monday, "23:00", "24:00")]);

        let slots = generate_available_slots(
            &conn,
            utc("2025-06-15 12:00"),
            &provider,
            7,
            365,
            60,
            None,
        )
        .unwrap();
        assert_eq!(fmt_slots(&slots), vec!["2025-06-16 23:00-24:00"]);
    }
}
