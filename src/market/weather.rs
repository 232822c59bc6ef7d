//! Cosmetic weather and season report, rerolled at most once per hour.
//!
//! Lives in memory only; nothing here touches the store.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherKind {
    pub name: &'static str,
    pub description: &'static str,
    pub crop_growth: f64,
    pub work_income: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Season {
    pub name: &'static str,
    pub description: &'static str,
    pub crop_growth: f64,
}

const WEATHER: [WeatherKind; 5] = [
    WeatherKind { name: "Sunny", description: "Clear skies, good for a day's work.", crop_growth: 1.1, work_income: 1.1 },
    WeatherKind { name: "Drizzle", description: "Light rain helps the crops along.", crop_growth: 1.25, work_income: 0.95 },
    WeatherKind { name: "Blizzard", description: "Snow everywhere, getting around is hard.", crop_growth: 0.7, work_income: 0.8 },
    WeatherKind { name: "Gale", description: "Strong winds, travel with care.", crop_growth: 0.9, work_income: 1.0 },
    WeatherKind { name: "Heatwave", description: "Sweltering heat slows everyone down.", crop_growth: 0.85, work_income: 0.75 },
];

const SEASONS: [Season; 4] = [
    Season { name: "Spring", description: "Mild and bright, time to sow.", crop_growth: 1.2 },
    Season { name: "Summer", description: "Hot and wet, crops shoot up.", crop_growth: 1.1 },
    Season { name: "Autumn", description: "Harvest season, steady returns.", crop_growth: 1.0 },
    Season { name: "Winter", description: "Cold winds, crops slow down.", crop_growth: 0.8 },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub weather: WeatherKind,
    pub season: Season,
    pub temperature: i32,
    pub generated_at: DateTime<Utc>,
}

impl Forecast {
    pub fn crop_rate(&self) -> f64 {
        self.weather.crop_growth * self.season.crop_growth
    }

    pub fn render(&self) -> String {
        format!(
            "=== Weather ===\n{} {}°C - {}\n{} - {}\nCrop growth x{:.2}, work income x{:.2}",
            self.weather.name,
            self.temperature,
            self.weather.description,
            self.season.name,
            self.season.description,
            self.crop_rate(),
            self.weather.work_income
        )
    }
}

pub struct WeatherService {
    refresh: Duration,
    current: Mutex<Option<Forecast>>,
}

impl Default for WeatherService {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

impl WeatherService {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh, current: Mutex::new(None) }
    }

    fn generate(now: DateTime<Utc>) -> Forecast {
        let mut rng = rand::thread_rng();
        Forecast {
            weather: *WEATHER.choose(&mut rng).unwrap_or(&WEATHER[0]),
            season: *SEASONS.choose(&mut rng).unwrap_or(&SEASONS[0]),
            temperature: rng.gen_range(-10..=38),
            generated_at: now,
        }
    }

    /// Current forecast, rerolled when older than the refresh interval.
    pub fn forecast(&self, now: DateTime<Utc>) -> Forecast {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match current.as_ref() {
            Some(f) if now - f.generated_at <= self.refresh => f.clone(),
            _ => {
                let fresh = Self::generate(now);
                *current = Some(fresh.clone());
                fresh
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_is_stable_within_the_refresh_window() {
        let service = WeatherService::default();
        let start = Utc::now();
        let first = service.forecast(start);
        assert_eq!(service.forecast(start + Duration::minutes(59)), first);
        let later = service.forecast(start + Duration::minutes(61));
        assert_eq!(later.generated_at, start + Duration::minutes(61));
        assert!((-10..=38).contains(&later.temperature));
    }
}
