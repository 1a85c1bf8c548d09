//! Tests for report periods, windows and clocks

use chrono::{Duration, TimeZone, Utc};
use core_kernel::{Clock, ManualClock, ReportPeriod, ReportWindow, TemporalError, Timezone};

mod report_period {
    use super::*;

    #[test]
    fn test_round_trip_display() {
        assert_eq!(ReportPeriod::parse("1999-01").unwrap().to_string(), "1999-01");
    }

    #[test]
    fn test_next_month() {
        let p = ReportPeriod::parse("2024-01").unwrap().next().unwrap();
        assert_eq!(p.to_string(), "2024-02");
    }

    #[test]
    fn test_invalid_month_message() {
        let err = ReportPeriod::parse("2024-13").unwrap_err();
        assert_eq!(err, TemporalError::InvalidReportPeriod("2024-13".into()));
    }

    #[test]
    fn test_utc_window_bounds() {
        let window = ReportPeriod::parse("2022-11").unwrap().window(&Timezone::default()).unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2022, 11, 1, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2022, 12, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_consecutive_windows_tile() {
        let tz: Timezone = "America/New_York".parse().unwrap();
        let march = ReportPeriod::parse("2024-03").unwrap().window(&tz).unwrap();
        let april = ReportPeriod::parse("2024-04").unwrap().window(&tz).unwrap();
        assert_eq!(march.end, april.start);
    }
}

mod report_window {
    use super::*;

    #[test]
    fn test_empty_window_rejected() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(ReportWindow::new(t, t), Err(TemporalError::InvalidPeriod { .. })));
    }

    #[test]
    fn test_last_instant_included() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let window = ReportWindow::new(start, end).unwrap();
        assert!(window.contains(end - Duration::nanoseconds(1)));
    }
}

mod timezone {
    use super::*;

    #[test]
    fn test_unknown_zone_rejected() {
        assert!("Mars/Olympus".parse::<Timezone>().is_err());
    }

    #[test]
    fn test_serde_uses_iana_name() {
        let tz: Timezone = serde_json::from_str("\"Europe/Berlin\"").unwrap();
        assert_eq!(serde_json::to_string(&tz).unwrap(), "\"Europe/Berlin\"");
    }
}

mod clock {
    use super::*;

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let later = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
