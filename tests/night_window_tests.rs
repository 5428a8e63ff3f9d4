use keylight::monitor::NightWindow;
use keylight::monitor::night_window::parse_time_of_day;
use proptest::prelude::*;

fn minute_strategy() -> impl Strategy<Value = u16> {
    0u16..(24 * 60)
}

#[test]
fn test_overnight_window_truth_table() {
    let window = NightWindow::from_hours(17, 7).unwrap();
    let inside: Vec<u32> = (0..24).filter(|h| window.contains_hour(*h)).collect();
    assert_eq!(
        inside,
        vec![0, 1, 2, 3, 4, 5, 6, 17, 18, 19, 20, 21, 22, 23]
    );
}

#[test]
fn test_same_day_window_truth_table() {
    let window = NightWindow::from_hours(9, 17).unwrap();
    let inside: Vec<u32> = (0..24).filter(|h| window.contains_hour(*h)).collect();
    assert_eq!(inside, (9..17).collect::<Vec<_>>());
}

#[test]
fn test_minute_precision_bounds() {
    let window = NightWindow::parse("22:30", "06:15").unwrap();
    assert!(!window.contains_minute(22 * 60 + 29));
    assert!(window.contains_minute(22 * 60 + 30));
    assert!(window.contains_minute(6 * 60 + 14));
    assert!(!window.contains_minute(6 * 60 + 15));
}

#[test]
fn test_hour_and_time_forms_agree() {
    assert_eq!(
        NightWindow::parse("17", "7").unwrap(),
        NightWindow::parse("17:00", "07:00").unwrap()
    );
    assert_eq!(parse_time_of_day(" 9 "), Some(540));
    assert_eq!(parse_time_of_day("9:5"), Some(545));
    assert_eq!(parse_time_of_day("25"), None);
    assert_eq!(parse_time_of_day("12:60"), None);
    assert_eq!(parse_time_of_day("noon"), None);
    assert_eq!(parse_time_of_day(""), None);
}

proptest! {
    /// A wraparound window is exactly the complement of the same-day window
    /// with swapped bounds.
    #[test]
    fn test_wraparound_is_complement_of_swapped(
        start in minute_strategy(),
        end in minute_strategy(),
        minute in minute_strategy(),
    ) {
        prop_assume!(start != end);
        let window = NightWindow::from_minutes(start, end).unwrap();
        let swapped = NightWindow::from_minutes(end, start).unwrap();
        prop_assert_ne!(window.contains_minute(minute), swapped.contains_minute(minute));
    }

    #[test]
    fn test_start_inclusive_end_exclusive(
        start in minute_strategy(),
        end in minute_strategy(),
    ) {
        prop_assume!(start != end);
        let window = NightWindow::from_minutes(start, end).unwrap();
        prop_assert!(window.contains_minute(start));
        prop_assert!(!window.contains_minute(end));
    }

    #[test]
    fn test_empty_window_contains_nothing(bound in minute_strategy(), minute in minute_strategy()) {
        let window = NightWindow::from_minutes(bound, bound).unwrap();
        prop_assert!(window.is_empty());
        prop_assert!(!window.contains_minute(minute));
    }

    #[test]
    fn test_display_round_trips_through_parse(
        start in minute_strategy(),
        end in minute_strategy(),
    ) {
        let window = NightWindow::from_minutes(start, end).unwrap();
        let text = window.to_string();
        let (s, e) = text.split_once('-').unwrap();
        prop_assert_eq!(NightWindow::parse(s, e).unwrap(), window);
    }
}
