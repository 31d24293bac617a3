//! Calendar-driven event behavior on a richer calendar: intercalary
//! festivals, leap days, season-restricted events, and rolled durations.

mod common;

use almanac::{Calendar, Engine, QueryContext, Trigger};
use common::{chain_def, definition, harptos};

#[test]
fn intercalary_festival_fires_every_year() {
    let calendar = Calendar::new(harptos());
    let mut engine = Engine::new(harptos());
    engine.load_definitions(vec![definition(
        "midwinter-feast",
        Trigger::Fixed {
            month: 0,
            day: 1,
            year: None,
            intercalary: Some("Midwinter".into()),
            duration_days: 1,
        },
    )]);

    for year in [1490, 1491, 1492, 1500] {
        let feast_day = calendar.absolute_day(year, 1, 1);
        assert_eq!(calendar.date(feast_day).intercalary.as_deref(), Some("Midwinter"));
        assert_eq!(engine.active_events(feast_day).len(), 1, "year {year}");
        assert!(engine.active_events(feast_day + 1).is_empty(), "year {year}");
    }
}

#[test]
fn leap_day_extends_the_intercalary_month() {
    let calendar = Calendar::new(harptos());
    // 1492 is on the 4-year cycle: Midwinter runs 2 days.
    assert_eq!(calendar.year_length(1492), 362);
    assert_eq!(calendar.year_length(1493), 361);
    let second_day = calendar.absolute_day(1492, 1, 2);
    let date = calendar.date(second_day);
    assert_eq!((date.month, date.day_of_month), (1, 2));
    assert_eq!(date.intercalary.as_deref(), Some("Midwinter"));

    // The round-trip law holds across the inserted day.
    for offset in -2..=2 {
        let d = calendar.date(second_day + offset);
        assert_eq!(calendar.absolute_day(d.year, d.month, d.day_of_month), second_day + offset);
    }
}

#[test]
fn season_restricted_event_is_filtered_by_the_day() {
    let calendar = Calendar::new(harptos());
    let mut engine = Engine::new(harptos());
    let mut heat_wave = definition(
        "heat-wave",
        Trigger::Interval { interval: 1, offset: 0, use_minutes: false, duration_days: 1 },
    );
    heat_wave.seasons = vec!["Summer".into()];
    engine.load_definitions(vec![heat_wave]);

    let summer_day = calendar.absolute_day(1490, 5, 10);
    let winter_day = calendar.absolute_day(1490, 11, 10);
    assert_eq!(calendar.date(summer_day).season.as_deref(), Some("Summer"));
    assert_eq!(calendar.date(winter_day).season.as_deref(), Some("Winter"));

    let ctx = QueryContext::default();
    assert_eq!(engine.active_events_filtered(summer_day, &ctx).len(), 1);
    assert!(engine.active_events_filtered(winter_day, &ctx).is_empty());
    // The unfiltered view still lists it; seasons only bind scoped queries.
    assert_eq!(engine.active_events(winter_day).len(), 1);
}

#[test]
fn winter_solar_times_come_from_the_season() {
    let calendar = Calendar::new(harptos());
    let winter_day = calendar.absolute_day(1490, 11, 10);
    let season = calendar.season_def_for_day(winter_day).unwrap();
    assert_eq!(season.name, "Winter");
    assert_eq!(season.sunrise_minute, Some(420));
    assert_eq!(season.sunset_minute, Some(1020));
}

#[test]
fn rolled_chain_durations_stay_in_the_expression_range() {
    let mut engine = Engine::new(harptos());
    engine.load_definitions(vec![chain_def(
        "caravan",
        7,
        &[("on the road", 1.0, "2 weeks + 1d4 days"), ("in port", 1.0, "1d6 days")],
    )]);

    for day in 0..2_000 {
        engine.active_events(day);
        let runtime = engine.chain("caravan").unwrap();
        let duration = runtime.duration_days();
        match runtime.state() {
            "on the road" => assert!((15..=18).contains(&duration), "day {day}: {duration}"),
            "in port" => assert!((1..=6).contains(&duration), "day {day}: {duration}"),
            other => panic!("unexpected state {other}"),
        }
    }
}

#[test]
fn year_labels_use_the_configured_suffix() {
    let calendar = Calendar::new(harptos());
    assert_eq!(calendar.display_year(1490), "1490 DR");
    let date = calendar.date(0);
    assert_eq!(format!("{date}"), "Hammer 1, Y1490");
}
