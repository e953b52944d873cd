use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Map Sector - Index a map extract and bake the sectors around a coordinate
pub struct Settings {
    /// JSON map extract to load
    #[clap(short, long, value_name = "FILE")]
    pub map: PathBuf,

    /// Latitude of the query point in degrees (defaults to the extract center)
    #[clap(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the query point in degrees (defaults to the extract center)
    #[clap(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Altitude in meters used when projecting nodes into their sector frame
    #[clap(long, default_value = "0.0", allow_hyphen_values = true)]
    pub altitude: f64,

    /// Keep ways without interesting tags instead of filtering them out
    #[clap(long, default_value = "false")]
    pub keep_all_ways: bool,

    /// Print the baked scenes as JSON instead of a summary
    #[clap(long, default_value = "false")]
    pub json: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        Settings::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let settings = Settings::parse_from(["map-sector", "--map", "city.json"]);
        assert_eq!(settings.map, PathBuf::from("city.json"));
        assert_eq!(settings.lat, None);
        assert_eq!(settings.altitude, 0.0);
        assert!(!settings.keep_all_ways);
        assert!(!settings.json);
    }

    #[test]
    fn test_parse_negative_coordinates() {
        let settings = Settings::parse_from([
            "map-sector",
            "-m",
            "city.json",
            "--lat",
            "-33.86",
            "--lon",
            "151.2",
            "--json",
        ]);
        assert_eq!(settings.lat, Some(-33.86));
        assert_eq!(settings.lon, Some(151.2));
        assert!(settings.json);
    }
}
