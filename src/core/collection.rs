use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};
use geo::{Rect, coord};
use serde::{Deserialize, Serialize};

use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::types::SortOrder;

/// Catalog entry of one acquisition in an image collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    /// Footprint bounding box: [west, south, east, north] in degrees
    pub footprint: [f64; 4],
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

impl Scene {
    pub fn footprint_rect(&self) -> Rect<f64> {
        let [w, s, e, n] = self.footprint;
        Rect::new(coord! { x: w, y: s }, coord! { x: e, y: n })
    }

    pub fn property(&self, key: &str) -> Option<f64> {
        self.properties.get(key).copied().filter(|v| v.is_finite())
    }
}

/// Half-open acquisition window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(Error::config(format!(
                "empty time window: {} .. {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `months` calendar months ending at `end`
    pub fn trailing_months(end: DateTime<Utc>, months: u32) -> Result<Self> {
        if months == 0 {
            return Err(Error::config("trailing window must span at least one month"));
        }
        let start = end
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| Error::config(format!("cannot go back {months} months from {end}")))?;
        Self::new(start, end)
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        self.start <= *t && *t < self.end
    }
}

/// Ordered list of scenes from one collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneCollection {
    pub id: String,
    pub scenes: Vec<Scene>,
}

impl SceneCollection {
    pub fn new(id: impl Into<String>, scenes: Vec<Scene>) -> Self {
        Self {
            id: id.into(),
            scenes,
        }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Keep scenes whose footprint intersects the region
    pub fn filter_bounds(mut self, region: &Region) -> Self {
        self.scenes.retain(|s| region.intersects(&s.footprint_rect()));
        self
    }

    /// Keep scenes acquired inside the window
    pub fn filter_date(mut self, window: &TimeWindow) -> Self {
        self.scenes.retain(|s| window.contains(&s.acquired));
        self
    }

    /// Stable sort by a numeric property; scenes lacking it go last
    pub fn sort(mut self, key: &str, order: SortOrder) -> Self {
        self.scenes
            .sort_by(|a, b| match (a.property(key), b.property(key)) {
                (Some(x), Some(y)) => {
                    let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                    match order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        self
    }

    pub fn first(self) -> Option<Scene> {
        self.scenes.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scene(id: &str, day: u32, cloud: Option<f64>) -> Scene {
        let mut properties = BTreeMap::new();
        if let Some(c) = cloud {
            properties.insert("CLOUD_COVERAGE_ASSESSMENT".to_string(), c);
        }
        Scene {
            id: id.to_string(),
            acquired: Utc.with_ymd_and_hms(2024, 5, day, 10, 30, 0).unwrap(),
            footprint: [2.0, 36.0, 4.0, 37.5],
            properties,
        }
    }

    #[test]
    fn sort_is_stable_and_puts_missing_keys_last() {
        let col = SceneCollection::new(
            "s2",
            vec![
                scene("a", 1, None),
                scene("b", 2, Some(5.0)),
                scene("c", 3, Some(1.0)),
                scene("d", 4, Some(5.0)),
            ],
        )
        .sort("CLOUD_COVERAGE_ASSESSMENT", SortOrder::Ascending);
        let ids: Vec<&str> = col.scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn window_end_is_exclusive() {
        let end = Utc.with_ymd_and_hms(2024, 5, 3, 10, 30, 0).unwrap();
        let window = TimeWindow::trailing_months(end, 6).unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2023, 11, 3, 10, 30, 0).unwrap()
        );
        let col = SceneCollection::new("s2", vec![scene("x", 2, Some(1.0)), scene("y", 3, Some(0.0))])
            .filter_date(&window);
        assert_eq!(col.len(), 1);
        assert_eq!(col.scenes[0].id, "x");
    }

    #[test]
    fn bounds_filter_drops_distant_scenes() {
        let region = Region::new(2.8921599, 36.6802202, 5000.0).unwrap();
        let mut far = scene("far", 1, Some(0.0));
        far.footprint = [20.0, 10.0, 21.0, 11.0];
        let col = SceneCollection::new("s2", vec![far, scene("near", 1, Some(9.0))])
            .filter_bounds(&region);
        assert_eq!(col.len(), 1);
        assert_eq!(col.scenes[0].id, "near");
    }
}
