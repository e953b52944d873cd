//! Tag filtering and tag-driven heuristics
//!
//! Raw map entities carry many attributes that are irrelevant for placement and
//! rendering. These helpers reduce tag maps to the keys worth keeping and decide which
//! ways are interesting enough to index at all.

use std::collections::BTreeMap;

/// Key/value attributes attached to a node or way
pub type Tags = BTreeMap<String, String>;

/// Only these keys survive on nodes
pub const NODE_TAG_WHITELIST: &[&str] = &[
    "crossing", "highway", "amenity", "barrier", "landuse", "surface",
];

/// Only these keys survive on ways, and a way needs one of them to be indexed
pub const WAY_TAG_WHITELIST: &[&str] = &["building", "highway", "amenity"];

/// Kept on ways for the height estimate, but never enough to make a way interesting
pub const WAY_DETAIL_TAGS: &[&str] = &["building:height", "height", "building:levels", "shop"];

/// Ways carrying any of these key/value pairs are dropped
pub const WAY_TAG_VALUE_BLACKLIST: &[(&str, &[&str])] = &[("highway", &["footway"])];

/// Default height of a generic structure in meters
const DEFAULT_HEIGHT_M: f64 = 5.0;

fn filter_tags<I, K, V>(tags: I, keep: impl Fn(&str) -> bool) -> Option<Tags>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let kept: Tags = tags
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(k, _)| keep(k.as_str()))
        .collect();

    (!kept.is_empty()).then_some(kept)
}

/// Reduce raw node tags to the whitelist, `None` when nothing is left
pub fn filter_node_tags<I, K, V>(tags: I) -> Option<Tags>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    filter_tags(tags, |key| NODE_TAG_WHITELIST.contains(&key))
}

/// Reduce raw way tags to the whitelist and height details, `None` when nothing is left
pub fn filter_way_tags<I, K, V>(tags: I) -> Option<Tags>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    filter_tags(tags, |key| {
        WAY_TAG_WHITELIST.contains(&key) || WAY_DETAIL_TAGS.contains(&key)
    })
}

/// Whether any tag carries a blacklisted value
pub fn has_blacklisted_values(tags: &Tags) -> bool {
    WAY_TAG_VALUE_BLACKLIST.iter().any(|(key, values)| {
        tags.get(*key)
            .is_some_and(|value| values.contains(&value.as_str()))
    })
}

/// A way is worth indexing if it carries a whitelisted key and no blacklisted value
pub fn is_interesting_way(tags: Option<&Tags>) -> bool {
    match tags {
        Some(tags) => {
            WAY_TAG_WHITELIST.iter().any(|key| tags.contains_key(*key))
                && !has_blacklisted_values(tags)
        }
        None => false,
    }
}

fn numeric_tag(tags: &Tags, key: &str) -> Option<f64> {
    tags.get(key)?
        .trim()
        .trim_end_matches('m')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Estimate the height of a building in meters from its tags
///
/// Explicit heights win, then the level count, then a guess per building type.
pub fn building_height(tags: &Tags) -> f64 {
    if let Some(height) = numeric_tag(tags, "building:height") {
        return height;
    }
    if let Some(height) = numeric_tag(tags, "height") {
        return height;
    }
    if let Some(levels) = numeric_tag(tags, "building:levels") {
        return levels * level_height(tags);
    }

    if let Some(building) = tags.get("building") {
        match building.as_str() {
            "church" => return 50.0,
            "apartments" => return 20.0,
            "industrial" | "residential" => return 12.0,
            "house" => return 6.5,
            "garage" | "garages" => return 2.2,
            "shed" => return 2.0,
            _ => {}
        }
    }

    if tags.get("shop").map(String::as_str) == Some("kiosk") {
        return 2.4;
    }

    if tags.get("building").map(String::as_str) == Some("yes") {
        return 3.0;
    }

    DEFAULT_HEIGHT_M
}

/// Height of a single floor for the building type
fn level_height(tags: &Tags) -> f64 {
    match tags.get("building").map(String::as_str) {
        Some("retail") => 4.0,
        Some("commercial") => 3.3,
        Some("residential") => 2.4,
        Some("apartments") => 2.8,
        _ => 3.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_node_tags() {
        let kept = filter_node_tags([("highway", "crossing"), ("name", "Main St")]).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get("highway").map(String::as_str), Some("crossing"));

        assert!(filter_node_tags([("name", "Nothing useful")]).is_none());
        assert!(filter_node_tags(Vec::<(String, String)>::new()).is_none());
    }

    #[test]
    fn test_filter_way_tags() {
        let kept = filter_way_tags([("building", "yes"), ("surface", "asphalt")]).unwrap();
        assert_eq!(kept, tags(&[("building", "yes")]));

        let kept = filter_way_tags([
            ("building", "apartments"),
            ("building:levels", "5"),
            ("height", "16"),
            ("shop", "bakery"),
            ("name", "Tower"),
        ])
        .unwrap();
        assert_eq!(kept.len(), 4);
        assert!(kept.get("name").is_none());
        assert_eq!(building_height(&kept), 16.0);
    }

    #[test]
    fn test_is_interesting_way() {
        assert!(is_interesting_way(Some(&tags(&[("highway", "primary")]))));
        assert!(!is_interesting_way(Some(&tags(&[("highway", "footway")]))));
        assert!(!is_interesting_way(Some(&Tags::new())));
        assert!(!is_interesting_way(Some(&tags(&[("height", "10")]))));
        assert!(!is_interesting_way(filter_way_tags([("shop", "kiosk")]).as_ref()));
        assert!(!is_interesting_way(None));
    }

    #[test]
    fn test_building_height_explicit_tags() {
        assert_eq!(building_height(&tags(&[("building:height", "17.5")])), 17.5);
        assert_eq!(building_height(&tags(&[("height", "9 m")])), 9.0);
        assert_eq!(
            building_height(&tags(&[("building", "retail"), ("building:levels", "2")])),
            8.0
        );
        assert_eq!(
            building_height(&tags(&[("building", "yes"), ("building:levels", "4")])),
            12.0
        );
    }

    #[test]
    fn test_building_height_by_type() {
        assert_eq!(building_height(&tags(&[("building", "church")])), 50.0);
        assert_eq!(building_height(&tags(&[("building", "house")])), 6.5);
        assert_eq!(building_height(&tags(&[("building", "garages")])), 2.2);
        assert_eq!(building_height(&tags(&[("shop", "kiosk")])), 2.4);
        assert_eq!(building_height(&tags(&[("building", "yes")])), 3.0);
        assert_eq!(building_height(&tags(&[("building", "hangar")])), 5.0);
        assert_eq!(building_height(&tags(&[("height", "tall")])), 5.0);
    }
}
