use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    static ref COORD_NUMBER: Regex = Regex::new(r"-?\d+(?:\.\d+)?").unwrap();
}

/// Google stores integer coordinates scaled by 1e7.
const E7: f64 = 1e7;

/// Parses coordinate strings such as `"35.6812°, 139.7671°"` or
/// `"geo:35.6812,139.7671"`. Exactly two numbers must be present.
pub fn parse_lat_lng(text: &str) -> Option<(f64, f64)> {
    let mut numbers = COORD_NUMBER
        .find_iter(text)
        .map(|m| m.as_str().parse::<f64>());
    let lat = numbers.next()?.ok()?;
    let lng = numbers.next()?.ok()?;
    if numbers.next().is_some() {
        return None;
    }
    Some((lat, lng))
}

/// Reads a pair of E7-scaled integer fields from an object.
pub fn e7_pair(object: &Value, lat_key: &str, lng_key: &str) -> Option<(f64, f64)> {
    let lat = object.get(lat_key)?.as_f64()?;
    let lng = object.get(lng_key)?.as_f64()?;
    Some((lat / E7, lng / E7))
}

/// Reads a coordinate that is either a plain string or an object holding
/// a `latLng` string.
pub fn lat_lng_value(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::String(s) => parse_lat_lng(s),
        Value::Object(_) => value.get("latLng")?.as_str().and_then(parse_lat_lng),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_degree_string() {
        assert_eq!(
            parse_lat_lng("35.6812°, -139.7671°"),
            Some((35.6812, -139.7671))
        );
    }

    #[test]
    fn test_parse_geo_uri() {
        assert_eq!(parse_lat_lng("geo:-23.55,-46.63"), Some((-23.55, -46.63)));
        assert_eq!(parse_lat_lng("geo:10,20"), Some((10.0, 20.0)));
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert_eq!(parse_lat_lng("35.1°"), None);
        assert_eq!(parse_lat_lng("1.0, 2.0, 3.0"), None);
        assert_eq!(parse_lat_lng("nowhere"), None);
    }

    #[test]
    fn test_e7_pair() {
        let object = json!({"latitudeE7": 407_128_000, "longitudeE7": -740_060_000});
        let (lat, lng) = e7_pair(&object, "latitudeE7", "longitudeE7").unwrap();
        assert!((lat - 40.7128).abs() < 1e-9);
        assert!((lng + 74.006).abs() < 1e-9);
        assert_eq!(e7_pair(&object, "latE7", "lngE7"), None);
    }

    #[test]
    fn test_lat_lng_value() {
        assert_eq!(
            lat_lng_value(&json!({"latLng": "1.5°, 2.5°"})),
            Some((1.5, 2.5))
        );
        assert_eq!(lat_lng_value(&json!("geo:1.5,2.5")), Some((1.5, 2.5)));
        assert_eq!(lat_lng_value(&json!(42)), None);
    }
}
