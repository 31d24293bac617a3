use almanac::{
    CalendarDefinition, ChainStateDef, EffectMap, EventDefinition, LeapRule, MonthDef, SeasonDef,
    Trigger,
};

/// A Faerûn-flavored calendar: twelve 30-day months, a one-day intercalary
/// festival month after the first, a leap day added to it every 4 years,
/// tenday weeks, and four seasons.
pub fn harptos() -> CalendarDefinition {
    let names = [
        "Hammer", "Midwinter", "Alturiak", "Ches", "Tarsakh", "Mirtul", "Kythorn", "Flamerule",
        "Eleasis", "Eleint", "Marpenoth", "Uktar", "Nightal",
    ];
    CalendarDefinition {
        id: "harptos".into(),
        months: names
            .iter()
            .map(|&name| MonthDef {
                name: name.into(),
                days: if name == "Midwinter" { 1 } else { 30 },
                intercalary: name == "Midwinter",
            })
            .collect(),
        weekdays: (1..=10).map(|i| format!("Day {i}")).collect(),
        seasons: vec![
            SeasonDef {
                name: "Spring".into(),
                start_month: 2,
                start_day: 1,
                sunrise_minute: Some(360),
                sunset_minute: Some(1080),
            },
            SeasonDef {
                name: "Summer".into(),
                start_month: 5,
                start_day: 1,
                sunrise_minute: Some(300),
                sunset_minute: Some(1140),
            },
            SeasonDef {
                name: "Autumn".into(),
                start_month: 8,
                start_day: 1,
                sunrise_minute: Some(360),
                sunset_minute: Some(1080),
            },
            SeasonDef {
                name: "Winter".into(),
                start_month: 11,
                start_day: 1,
                sunrise_minute: Some(420),
                sunset_minute: Some(1020),
            },
        ],
        leap_rules: vec![LeapRule {
            interval: 4,
            offset: 0,
            target_month: Some(1),
            exclude: vec![],
        }],
        start_year: 1490,
        year_suffix: Some("DR".into()),
    }
}

pub fn definition(id: &str, trigger: Trigger) -> EventDefinition {
    EventDefinition {
        id: id.into(),
        name: id.into(),
        priority: 0,
        effects: EffectMap::new(),
        tags: vec![],
        locations: vec![],
        factions: vec![],
        seasons: vec![],
        regions: vec![],
        trigger,
    }
}

pub fn chain_def(id: &str, seed: u32, states: &[(&str, f64, &str)]) -> EventDefinition {
    definition(
        id,
        Trigger::Chain {
            seed,
            states: states
                .iter()
                .map(|&(name, weight, duration)| ChainStateDef {
                    name: name.into(),
                    weight,
                    duration: duration.into(),
                    effects: EffectMap::new(),
                })
                .collect(),
            initial_state: None,
        },
    )
}
