use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Named historical market episode replayed by the stress test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioEvent {
    BlackMonday1987,
    Ltcm1998,
    DotCom2000,
    Gfc2008,
    DebtCeiling2011,
    China2015,
    Q4Selloff2018,
    Covid2020,
    RateHikes2022,
    BullRally2020To2021,
}

impl ScenarioEvent {
    pub const ALL: [ScenarioEvent; 10] = [
        ScenarioEvent::BlackMonday1987,
        ScenarioEvent::Ltcm1998,
        ScenarioEvent::DotCom2000,
        ScenarioEvent::Gfc2008,
        ScenarioEvent::DebtCeiling2011,
        ScenarioEvent::China2015,
        ScenarioEvent::Q4Selloff2018,
        ScenarioEvent::Covid2020,
        ScenarioEvent::RateHikes2022,
        ScenarioEvent::BullRally2020To2021,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScenarioEvent::BlackMonday1987 => "Black Monday 1987",
            ScenarioEvent::Ltcm1998 => "LTCM Collapse 1998",
            ScenarioEvent::DotCom2000 => "Dot-com Crash 2000",
            ScenarioEvent::Gfc2008 => "Global Financial Crisis 2008",
            ScenarioEvent::DebtCeiling2011 => "US Debt Ceiling 2011",
            ScenarioEvent::China2015 => "China Devaluation 2015",
            ScenarioEvent::Q4Selloff2018 => "Q4 Selloff 2018",
            ScenarioEvent::Covid2020 => "COVID Crash 2020",
            ScenarioEvent::RateHikes2022 => "Rate Hikes 2022",
            ScenarioEvent::BullRally2020To2021 => "Bull Rally 2020-2021",
        }
    }

    /// Inclusive date window of the episode.
    pub fn window(self) -> (NaiveDate, NaiveDate) {
        let (a, b) = match self {
            ScenarioEvent::BlackMonday1987 => ((1987, 10, 1), (1987, 11, 30)),
            ScenarioEvent::Ltcm1998 => ((1998, 7, 1), (1998, 10, 1)),
            ScenarioEvent::DotCom2000 => ((2000, 3, 1), (2001, 4, 30)),
            ScenarioEvent::Gfc2008 => ((2008, 9, 1), (2009, 3, 1)),
            ScenarioEvent::DebtCeiling2011 => ((2011, 7, 1), (2011, 11, 30)),
            ScenarioEvent::China2015 => ((2015, 7, 1), (2016, 3, 1)),
            ScenarioEvent::Q4Selloff2018 => ((2018, 9, 1), (2018, 12, 31)),
            ScenarioEvent::Covid2020 => ((2020, 2, 15), (2020, 4, 15)),
            ScenarioEvent::RateHikes2022 => ((2022, 1, 1), (2022, 10, 15)),
            ScenarioEvent::BullRally2020To2021 => ((2020, 4, 16), (2021, 12, 31)),
        };
        (ymd(a), ymd(b))
    }
}

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    // Every window above is a valid calendar date.
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_are_ordered() {
        for e in ScenarioEvent::ALL {
            let (a, b) = e.window();
            assert!(a < b, "{} window inverted", e.label());
            assert!(a.format("%Y").to_string().parse::<i32>().unwrap() >= 1987);
        }
    }

    #[test]
    fn test_covid_window() {
        let (a, b) = ScenarioEvent::Covid2020.window();
        assert_eq!(a, NaiveDate::from_ymd_opt(2020, 2, 15).unwrap());
        assert_eq!(b, NaiveDate::from_ymd_opt(2020, 4, 15).unwrap());
    }

    #[test]
    fn test_serde_names() {
        let s = serde_json::to_string(&ScenarioEvent::Gfc2008).unwrap();
        assert_eq!(s, "\"gfc2008\"");
        let e: ScenarioEvent = serde_json::from_str("\"covid2020\"").unwrap();
        assert_eq!(e, ScenarioEvent::Covid2020);
    }
}
