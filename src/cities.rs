//! Static city tables for the weather/time agent
//!
//! Keys are lower-case city names; every lookup trims and lower-cases the
//! caller's input before probing the table.

use crate::models::LookupReport;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherDescriptor {
    pub temperature_c: i32,
    pub condition: &'static str,
    pub humidity_pct: u8,
    pub wind_kph: u16,
}

impl WeatherDescriptor {
    pub fn temperature_f(&self) -> f64 {
        self.temperature_c as f64 * 9.0 / 5.0 + 32.0
    }
}

lazy_static! {
    pub static ref CITY_TIMEZONES: HashMap<&'static str, &'static str> = HashMap::from([
        ("new york", "America/New_York"),
        ("tokyo", "Asia/Tokyo"),
        ("london", "Europe/London"),
        ("paris", "Europe/Paris"),
        ("los angeles", "America/Los_Angeles"),
        ("chicago", "America/Chicago"),
        ("sydney", "Australia/Sydney"),
        ("hong kong", "Asia/Hong_Kong"),
        ("singapore", "Asia/Singapore"),
        ("dubai", "Asia/Dubai"),
        ("moscow", "Europe/Moscow"),
        ("berlin", "Europe/Berlin"),
        ("madrid", "Europe/Madrid"),
        ("rome", "Europe/Rome"),
        ("beijing", "Asia/Shanghai"),
        ("seoul", "Asia/Seoul"),
        ("mumbai", "Asia/Kolkata"),
        ("sao paulo", "America/Sao_Paulo"),
        ("mexico city", "America/Mexico_City"),
        ("toronto", "America/Toronto"),
        ("vancouver", "America/Vancouver"),
        ("cairo", "Africa/Cairo"),
        ("johannesburg", "Africa/Johannesburg"),
        ("lagos", "Africa/Lagos"),
        ("bangkok", "Asia/Bangkok"),
        ("manila", "Asia/Manila"),
        ("jakarta", "Asia/Jakarta"),
        ("kuala lumpur", "Asia/Kuala_Lumpur"),
        ("istanbul", "Europe/Istanbul"),
        ("stockholm", "Europe/Stockholm"),
        ("oslo", "Europe/Oslo"),
        ("helsinki", "Europe/Helsinki"),
        ("vienna", "Europe/Vienna"),
        ("zurich", "Europe/Zurich"),
        ("amsterdam", "Europe/Amsterdam"),
        ("brussels", "Europe/Brussels"),
        ("copenhagen", "Europe/Copenhagen"),
        ("prague", "Europe/Prague"),
        ("warsaw", "Europe/Warsaw"),
        ("budapest", "Europe/Budapest"),
        ("athens", "Europe/Athens"),
        ("lisbon", "Europe/Lisbon"),
    ]);

    pub static ref CITY_WEATHER: HashMap<&'static str, WeatherDescriptor> = HashMap::from([
        ("new york", weather(25, "sunny", 55, 12)),
        ("tokyo", weather(22, "partly cloudy", 65, 10)),
        ("london", weather(15, "light rain", 80, 18)),
        ("paris", weather(18, "overcast", 70, 14)),
        ("los angeles", weather(27, "clear", 40, 8)),
        ("sydney", weather(20, "windy", 60, 30)),
        ("singapore", weather(31, "thunderstorms", 85, 9)),
        ("dubai", weather(38, "hot and sunny", 30, 15)),
        ("berlin", weather(14, "cloudy", 72, 16)),
        ("moscow", weather(5, "snow showers", 78, 20)),
        ("mumbai", weather(30, "humid", 88, 11)),
        ("toronto", weather(12, "drizzle", 75, 19)),
    ]);
}

const fn weather(
    temperature_c: i32,
    condition: &'static str,
    humidity_pct: u8,
    wind_kph: u16,
) -> WeatherDescriptor {
    WeatherDescriptor {
        temperature_c,
        condition,
        humidity_pct,
        wind_kph,
    }
}

fn normalize(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Sorted list of cities with timezone information.
pub fn get_city_timezones_candidates() -> Vec<&'static str> {
    let mut cities: Vec<_> = CITY_TIMEZONES.keys().copied().collect();
    cities.sort_unstable();
    cities
}

/// Sorted list of cities with weather information.
pub fn get_city_weather_candidates() -> Vec<&'static str> {
    let mut cities: Vec<_> = CITY_WEATHER.keys().copied().collect();
    cities.sort_unstable();
    cities
}

/// Weather report for a city.
///
/// A city that has a timezone entry but no weather entry is still a known
/// city: the lookup succeeds and says the data is unavailable.
pub fn get_weather(city: &str) -> LookupReport {
    let key = normalize(city);

    if let Some(w) = CITY_WEATHER.get(key.as_str()) {
        debug!(city = %key, "Weather lookup hit");
        return LookupReport::Success {
            report: format!(
                "The weather in {} is {} with a temperature of {} degrees Celsius ({:.0} degrees Fahrenheit), humidity {}% and wind {} km/h.",
                city.trim(),
                w.condition,
                w.temperature_c,
                w.temperature_f(),
                w.humidity_pct,
                w.wind_kph
            ),
        };
    }

    if CITY_TIMEZONES.contains_key(key.as_str()) {
        return LookupReport::Success {
            report: format!(
                "Weather information for {} is currently unavailable.",
                city.trim()
            ),
        };
    }

    LookupReport::Error {
        error_message: format!(
            "Weather information for '{}' is not available. Supported cities include: {}",
            city,
            get_city_weather_candidates().join(", ")
        ),
    }
}

/// Current local time in a city.
pub fn get_current_time(city: &str) -> LookupReport {
    current_time_at(city, Utc::now())
}

/// Same as [`get_current_time`] with an explicit reference instant.
pub fn current_time_at(city: &str, now: DateTime<Utc>) -> LookupReport {
    let key = normalize(city);

    let Some(identifier) = CITY_TIMEZONES.get(key.as_str()) else {
        return LookupReport::Error {
            error_message: format!(
                "Sorry, I don't have timezone information for {}. Supported cities include: {}",
                city,
                get_city_timezones_candidates().join(", ")
            ),
        };
    };

    match identifier.parse::<Tz>() {
        Ok(tz) => {
            let local = now.with_timezone(&tz);
            LookupReport::Success {
                report: format!(
                    "The current time in {} is {}",
                    city.trim(),
                    local.format("%Y-%m-%d %H:%M:%S %Z%z")
                ),
            }
        }
        Err(e) => {
            warn!(city = %key, identifier = %identifier, "Unknown timezone identifier");
            LookupReport::Error {
                error_message: format!("Error getting time for {}: {}", city, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_every_timezone_identifier_parses() {
        for (city, identifier) in CITY_TIMEZONES.iter() {
            assert!(
                identifier.parse::<Tz>().is_ok(),
                "{} has invalid zone {}",
                city,
                identifier
            );
        }
    }

    #[test]
    fn test_candidates_sorted() {
        let tz = get_city_timezones_candidates();
        assert_eq!(tz.len(), 42);
        assert!(tz.windows(2).all(|w| w[0] <= w[1]));
        assert!(tz.contains(&"tokyo"));

        let weather = get_city_weather_candidates();
        assert!(weather.windows(2).all(|w| w[0] <= w[1]));
        assert!(weather.contains(&"tokyo"));
    }

    #[test]
    fn test_weather_known_cities_echo_name() {
        for city in get_city_weather_candidates() {
            let report = get_weather(city);
            assert!(report.is_success());
            assert!(report.message().contains(city));
            assert!(report.message().contains("temperature"));
        }
    }

    #[test]
    fn test_weather_mixed_case() {
        let report = get_weather("LoNdOn");
        assert!(report.is_success());
        let london = CITY_WEATHER["london"];
        assert!(report.message().contains(london.condition));
        assert!(report.message().contains(&london.temperature_c.to_string()));
        assert!(report.message().contains("LoNdOn"));
    }

    #[test]
    fn test_weather_timezone_only_city() {
        assert!(!CITY_WEATHER.contains_key("madrid"));
        let report = get_weather("Madrid");
        assert!(report.is_success());
        assert!(report
            .message()
            .contains("Weather information for Madrid is currently unavailable"));
    }

    #[test]
    fn test_weather_unknown_city() {
        let report = get_weather("Atlantis");
        assert!(!report.is_success());
        assert!(report
            .message()
            .contains("Weather information for 'Atlantis' is not available"));
        assert!(report.message().contains("tokyo"));
    }

    #[test]
    fn test_current_time_known_cities() {
        let now = Utc.with_ymd_and_hms(2024, 7, 24, 12, 0, 0).unwrap();
        for city in get_city_timezones_candidates() {
            let report = current_time_at(city, now);
            assert!(report.is_success(), "{} failed", city);
            assert!(report.message().contains(city));
        }
    }

    #[test]
    fn test_current_time_formats_zone() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let report = current_time_at("Tokyo", now);
        assert_eq!(
            report.message(),
            "The current time in Tokyo is 2024-01-15 21:00:00 JST+0900"
        );

        let report = current_time_at("  new york ", now);
        assert!(report.message().contains("2024-01-15 07:00:00 EST-0500"));
    }

    #[test]
    fn test_current_time_unknown_city() {
        let report = get_current_time("Gotham");
        assert!(!report.is_success());
        assert!(report
            .message()
            .starts_with("Sorry, I don't have timezone information for Gotham."));
        assert!(report.message().contains("new york"));
    }
}
