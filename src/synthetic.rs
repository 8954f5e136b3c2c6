//! Seeded synthetic demand for tests and benchmarks.
//!
//! Two generators with known ground truth:
//!
//! - [`DemandScenario`] places groups of zones in the plane, each busy over
//!   a band of hours, and emits zone-hour intensities plus coordinates.
//!   Well-separated groups should come back as separate clusters.
//! - [`DailyCycle`] replays the same hourly trip profile for several days,
//!   which should score as perfectly stable. Every trip heads to the next
//!   zone in the list, so the trips also form a ring of OD flows.
//!
//! # Example
//!
//! ```rust
//! use zonepulse::synthetic::{DemandGroup, DemandScenario};
//!
//! let scenario = DemandScenario {
//!     groups: vec![DemandGroup {
//!         center: (0.0, 0.0),
//!         spread_meters: 100.0,
//!         zones: 4,
//!         hours: (7, 9),
//!         intensity: 20.0,
//!     }],
//!     intensity_jitter: 0.1,
//!     seed: 42,
//! };
//!
//! let city = scenario.generate();
//! assert_eq!(city.records.len(), 4 * 3);
//! assert_eq!(city.coords.len(), 4);
//! ```

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{ZoneCoordinate, ZoneCoordinates, ZoneHourIntensity};
use crate::timeseries::{FareComponents, TripEvent};

/// Zones around one center, active over an inclusive band of hours.
#[derive(Debug, Clone)]
pub struct DemandGroup {
    /// Center in projected meters.
    pub center: (f64, f64),
    /// Zones are placed uniformly within `±spread_meters` of the center on each axis.
    pub spread_meters: f64,
    pub zones: usize,
    /// First and last active hour, inclusive.
    pub hours: (u8, u8),
    /// Mean intensity of every active zone-hour.
    pub intensity: f64,
}

#[derive(Debug, Clone)]
pub struct DemandScenario {
    pub groups: Vec<DemandGroup>,
    /// Relative uniform jitter applied to each intensity (0.0 - 1.0).
    pub intensity_jitter: f64,
    pub seed: u64,
}

/// Generated intensities and the coordinates of every zone they mention.
#[derive(Debug, Clone)]
pub struct SyntheticCity {
    pub records: Vec<ZoneHourIntensity>,
    pub coords: Vec<ZoneCoordinate>,
    /// Index of the group each zone belongs to, aligned with `coords`.
    pub group_of_zone: Vec<usize>,
}

impl SyntheticCity {
    pub fn coordinates(&self) -> ZoneCoordinates {
        self.coords.iter().copied().collect()
    }
}

impl DemandScenario {
    /// Zone ids are assigned from 1 upwards, group by group.
    pub fn generate(&self) -> SyntheticCity {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let jitter = self.intensity_jitter.clamp(0.0, 1.0);

        let mut records = Vec::new();
        let mut coords = Vec::new();
        let mut group_of_zone = Vec::new();
        let mut next_id = 1i64;

        for (g, group) in self.groups.iter().enumerate() {
            for _ in 0..group.zones {
                let location_id = next_id;
                next_id += 1;

                let dx = (rng.random::<f64>() * 2.0 - 1.0) * group.spread_meters;
                let dy = (rng.random::<f64>() * 2.0 - 1.0) * group.spread_meters;
                coords.push(ZoneCoordinate {
                    location_id,
                    x_meters: group.center.0 + dx,
                    y_meters: group.center.1 + dy,
                });
                group_of_zone.push(g);

                let (first, last) = (group.hours.0.min(23), group.hours.1.min(23));
                for hour in first..=last {
                    let scale = 1.0 + jitter * (rng.random::<f64>() * 2.0 - 1.0);
                    records.push(ZoneHourIntensity {
                        location_id,
                        hour,
                        intensity: (group.intensity * scale).max(f64::MIN_POSITIVE),
                    });
                }
            }
        }

        SyntheticCity {
            records,
            coords,
            group_of_zone,
        }
    }
}

/// Commuter-shaped trips per hour: quiet nights, morning and evening peaks.
pub fn commuter_profile() -> [u32; 24] {
    [
        2, 1, 1, 1, 2, 4, 9, 16, 20, 14, 10, 9, 10, 10, 11, 13, 17, 21, 18, 12, 9, 7, 5, 3,
    ]
}

/// The same hourly profile replayed for consecutive days.
#[derive(Debug, Clone)]
pub struct DailyCycle {
    pub zones: Vec<i64>,
    pub start: NaiveDate,
    pub days: u32,
    /// Trips per zone for each hour of the day.
    pub profile: [u32; 24],
    /// Up to this many extra trips are added at random to each zone-hour.
    pub extra_trips: u32,
    pub base_fare: f64,
    pub seed: u64,
}

impl DailyCycle {
    pub fn generate(&self) -> Vec<TripEvent> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trips = Vec::new();

        for day in 0..self.days {
            let date = self.start + Duration::days(i64::from(day));
            for (hour, &base) in self.profile.iter().enumerate() {
                for (z, &zone) in self.zones.iter().enumerate() {
                    let destination = self.zones[(z + 1) % self.zones.len()];
                    let extra = if self.extra_trips > 0 {
                        rng.random_range(0..=self.extra_trips)
                    } else {
                        0
                    };
                    for _ in 0..base + extra {
                        let minute = rng.random_range(0..60);
                        let Some(pickup_datetime) = date.and_hms_opt(hour as u32, minute, 0)
                        else {
                            continue;
                        };
                        trips.push(TripEvent {
                            pickup_datetime,
                            origin_location_id: zone,
                            destination_location_id: Some(destination),
                            trip_time: Some(600.0 + 30.0 * hour as f64),
                            fares: FareComponents {
                                base_passenger_fare: Some(
                                    self.base_fare * (0.5 + rng.random::<f64>()),
                                ),
                                tips: Some(1.0),
                                ..Default::default()
                            },
                        });
                    }
                }
            }
        }
        trips
    }
}
