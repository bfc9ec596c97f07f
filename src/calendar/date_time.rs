//! Epoch-millisecond timestamp construction in the host's default zone.
//!
//! Months are zero-based to match the calendar provider's conventions.
//! Seconds and sub-second fields are always zero.

use chrono::{DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DateTimeError {
    #[error("Invalid date/time {year}-{month}-{day} {hour}:{minute} (month is zero-based)")]
    InvalidFields {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    },
    #[error("Day offset {0} is out of range")]
    OffsetOutOfRange(i64),
    #[error("Local time {0} cannot be represented in this zone")]
    Unrepresentable(NaiveDateTime),
    #[error("Unknown time zone: {0}")]
    UnknownZone(String),
}

/// Builds the instant for a zero-based month in `zone`.
pub fn date_time_in<Z: TimeZone>(
    zone: &Z,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
) -> Result<i64, DateTimeError> {
    let invalid = || DateTimeError::InvalidFields { year, month, day, hour, minute };

    let naive = month
        .checked_add(1)
        .and_then(|month| NaiveDate::from_ymd_opt(year, month, day))
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(invalid)?;

    resolve_local(zone, naive).map(|dt| dt.timestamp_millis())
}

/// Builds the instant `days` calendar days after `now`'s local date, at `hour:minute`.
/// Negative offsets move backwards.
pub fn future_date_time_from<Z: TimeZone>(
    now: &DateTime<Z>,
    days: i64,
    hour: u32,
    minute: u32,
) -> Result<i64, DateTimeError> {
    let today = now.date_naive();
    let target = if days >= 0 {
        today.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    }
    .ok_or(DateTimeError::OffsetOutOfRange(days))?;

    let naive = target
        .and_hms_opt(hour, minute, 0)
        .ok_or(DateTimeError::InvalidFields {
            year: target.year(),
            month: target.month0(),
            day: target.day(),
            hour,
            minute,
        })?;

    resolve_local(&now.timezone(), naive).map(|dt| dt.timestamp_millis())
}

// Ambiguous wall times take the earlier instant. Wall times inside a
// forward gap are read with the offset in force before the gap, which
// moves them forward by the gap's length.
fn resolve_local<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> Result<DateTime<Z>, DateTimeError> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => {
            let before = naive
                .checked_sub_signed(Duration::days(1))
                .ok_or(DateTimeError::Unrepresentable(naive))?;
            let offset = zone
                .offset_from_local_datetime(&before)
                .earliest()
                .ok_or(DateTimeError::Unrepresentable(naive))?;
            let utc = naive
                .checked_sub_signed(Duration::seconds(i64::from(offset.fix().local_minus_utc())))
                .ok_or(DateTimeError::Unrepresentable(naive))?;
            Ok(zone.from_utc_datetime(&utc))
        }
    }
}

/// The host's default time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostZone {
    tz: Tz,
}

impl HostZone {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_id(id: &str) -> Result<Self, DateTimeError> {
        id.trim_start_matches(':')
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| DateTimeError::UnknownZone(id.to_string()))
    }

    /// Resolution order: configured id, then `TZ`, then the system zone, then UTC.
    pub fn detect(configured: Option<&str>) -> Self {
        Self::resolve(configured, std::env::var("TZ").ok().as_deref())
    }

    fn resolve(configured: Option<&str>, env_tz: Option<&str>) -> Self {
        if let Some(id) = configured {
            match Self::from_id(id) {
                Ok(zone) => return zone,
                Err(e) => tracing::warn!("Ignoring configured time zone: {}", e),
            }
        }

        env_tz
            .and_then(|id| Self::from_id(id).ok())
            .unwrap_or_else(Self::system)
    }

    /// The operating system's zone, or UTC when it cannot be determined.
    pub fn system() -> Self {
        match iana_time_zone::get_timezone() {
            Ok(id) => Self::from_id(&id).unwrap_or_else(|e| {
                tracing::warn!("Unsupported system time zone: {}", e);
                Self::new(Tz::UTC)
            }),
            Err(e) => {
                tracing::warn!("Could not read system time zone: {}", e);
                Self::new(Tz::UTC)
            }
        }
    }

    pub fn id(&self) -> &'static str {
        self.tz.name()
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn date_time(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    ) -> Result<i64, DateTimeError> {
        date_time_in(&self.tz, year, month, day, hour, minute)
    }

    pub fn future_date_time(&self, days: i64, hour: u32, minute: u32) -> Result<i64, DateTimeError> {
        future_date_time_from(&self.now(), days, hour, minute)
    }

    /// Local calendar fields of an epoch-millisecond instant.
    pub fn decompose(&self, millis: i64) -> Option<DateTime<Tz>> {
        DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&self.tz))
    }
}

impl Default for HostZone {
    fn default() -> Self {
        Self::detect(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn new_york() -> HostZone {
        HostZone::new(chrono_tz::America::New_York)
    }

    fn utc_millis(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap().timestamp_millis()
    }

    #[test]
    fn absolute_date_time_decomposes_to_same_fields() {
        let zone = new_york();

        let millis = zone.date_time(2024, 10, 15, 14, 30).unwrap();
        let dt = zone.decompose(millis).unwrap();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month0(), 10);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 0);
        assert_eq!(millis % 1000, 0);
    }

    #[test]
    fn same_fields_produce_same_instant() {
        let zone = new_york();

        let first = zone.date_time(2024, 10, 15, 14, 0).unwrap();
        let second = zone.date_time(2024, 10, 15, 14, 0).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn month_is_zero_based() {
        let millis = date_time_in(&Utc, 2024, 0, 1, 0, 0).unwrap();

        assert_eq!(millis, utc_millis(2024, 1, 1, 0, 0));
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        assert!(matches!(
            date_time_in(&Utc, 2024, 12, 1, 0, 0),
            Err(DateTimeError::InvalidFields { month: 12, .. })
        ));
        assert!(date_time_in(&Utc, 2024, 1, 30, 0, 0).is_err());
        assert!(date_time_in(&Utc, 2024, 0, 1, 24, 0).is_err());
        assert!(date_time_in(&Utc, 2024, 0, 1, 0, 60).is_err());
        assert!(date_time_in(&Utc, 2024, u32::MAX, 1, 0, 0).is_err());
    }

    #[test]
    fn wall_time_in_spring_gap_moves_forward() {
        // 02:30 does not exist on 2024-03-10 in New York; it reads as 03:30 EDT.
        let millis = new_york().date_time(2024, 2, 10, 2, 30).unwrap();

        assert_eq!(millis, utc_millis(2024, 3, 10, 7, 30));
    }

    #[test]
    fn ambiguous_wall_time_takes_earlier_instant() {
        let millis = new_york().date_time(2024, 10, 3, 1, 30).unwrap();

        assert_eq!(millis, utc_millis(2024, 11, 3, 5, 30));
    }

    #[test]
    fn future_offset_crosses_year_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 12).unwrap();

        let today = future_date_time_from(&now, 0, 10, 0).unwrap();
        let tomorrow = future_date_time_from(&now, 1, 10, 0).unwrap();

        assert_eq!(today, utc_millis(2024, 12, 31, 10, 0));
        assert_eq!(tomorrow, utc_millis(2025, 1, 1, 10, 0));
    }

    #[test]
    fn future_offset_across_dst_stays_within_an_hour_of_whole_days() {
        let now = chrono_tz::America::New_York
            .with_ymd_and_hms(2024, 3, 8, 12, 0, 0)
            .unwrap();

        let before = future_date_time_from(&now, 0, 10, 0).unwrap();
        let after = future_date_time_from(&now, 5, 10, 0).unwrap();

        assert_eq!(after - before, 5 * DAY_MS - HOUR_MS);
        assert!(((after - before) - 5 * DAY_MS).abs() <= HOUR_MS);
    }

    #[test]
    fn zero_offset_falls_on_current_day() {
        let now = chrono_tz::Asia::Shanghai
            .with_ymd_and_hms(2025, 6, 1, 0, 5, 0)
            .unwrap();

        let millis = future_date_time_from(&now, 0, 23, 59).unwrap();
        let dt = DateTime::from_timestamp_millis(millis)
            .unwrap()
            .with_timezone(&chrono_tz::Asia::Shanghai);

        assert_eq!(dt.date_naive(), now.date_naive());
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.minute(), 59);
        assert_eq!(dt.second(), 0);
    }

    #[test]
    fn negative_offset_moves_backwards() {
        let zone = new_york();

        let yesterday = zone.future_date_time(-1, 10, 0).unwrap();
        let today = zone.future_date_time(0, 10, 0).unwrap();

        assert!(yesterday < today);
    }

    #[test]
    fn large_offset_is_about_a_year() {
        let zone = new_york();

        let start = zone.future_date_time(0, 10, 0).unwrap();
        let later = zone.future_date_time(365, 10, 0).unwrap();

        assert!(((later - start) - 365 * DAY_MS).abs() < HOUR_MS);
    }

    #[test]
    fn repeated_calls_agree_within_a_second() {
        let zone = HostZone::new(Tz::UTC);

        let first = zone.future_date_time(5, 14, 30).unwrap();
        let second = zone.future_date_time(5, 14, 30).unwrap();

        assert!((first - second).abs() < 1000);
    }

    #[test]
    fn three_days_ahead_is_roughly_three_days_from_now() {
        let zone = HostZone::new(Tz::UTC);
        let now = Utc::now().timestamp_millis();

        let future = zone.future_date_time(3, 10, 0).unwrap();

        // The target hour may fall anywhere within the day.
        assert!(future > now + 2 * DAY_MS);
        assert!(future < now + 4 * DAY_MS);
    }

    #[test]
    fn invalid_hour_in_future_offset_is_rejected() {
        let zone = HostZone::new(Tz::UTC);

        assert!(matches!(
            zone.future_date_time(1, 25, 0),
            Err(DateTimeError::InvalidFields { hour: 25, .. })
        ));
    }

    #[test]
    fn host_zone_parses_ids_with_leading_colon() {
        let zone = HostZone::from_id(":Asia/Shanghai").unwrap();

        assert_eq!(zone.id(), "Asia/Shanghai");
    }

    #[test]
    fn host_zone_prefers_configured_id() {
        let zone = HostZone::detect(Some("Europe/Paris"));

        assert_eq!(zone.id(), "Europe/Paris");
    }

    #[test]
    fn host_zone_without_config_or_tz_uses_system_zone() {
        let expected = iana_time_zone::get_timezone()
            .ok()
            .and_then(|id| id.parse::<Tz>().ok())
            .unwrap_or(Tz::UTC);

        assert_eq!(HostZone::resolve(None, None).tz(), expected);
        assert_eq!(HostZone::resolve(None, Some("not/a-zone")).tz(), expected);
    }

    #[test]
    fn tz_variable_wins_over_system_zone() {
        let zone = HostZone::resolve(None, Some(":America/New_York"));

        assert_eq!(zone.id(), "America/New_York");
    }

    #[test]
    fn unknown_zone_id_is_an_error() {
        assert_eq!(
            HostZone::from_id("Mars/Olympus_Mons"),
            Err(DateTimeError::UnknownZone("Mars/Olympus_Mons".to_string()))
        );
    }

    proptest! {
        #[test]
        fn absolute_construction_round_trips(
            year in 1992i32..2100,
            month in 0u32..12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let zone = HostZone::new(chrono_tz::Asia::Shanghai);

            let millis = zone.date_time(year, month, day, hour, minute).unwrap();
            let dt = zone.decompose(millis).unwrap();

            prop_assert_eq!(
                (dt.year(), dt.month0(), dt.day(), dt.hour(), dt.minute(), dt.second()),
                (year, month, day, hour, minute, 0)
            );
        }

        #[test]
        fn later_offsets_are_whole_days_apart(
            d1 in 0i64..400,
            gap in 1i64..400,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let now = chrono_tz::Europe::Berlin.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
            let d2 = d1 + gap;

            let first = future_date_time_from(&now, d1, hour, minute).unwrap();
            let second = future_date_time_from(&now, d2, hour, minute).unwrap();

            prop_assert!(((second - first) - (d2 - d1) * DAY_MS).abs() <= HOUR_MS);
        }
    }
}
