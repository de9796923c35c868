//! `maxspeed` tag parsing for the routing graph builder.

pub const DEFAULT_WALK_SPEED_KMH: f64 = 5.0;
const KMH_PER_MPH: f64 = 1.609344;

/// Parses an OSM `maxspeed` value into km/h.
///
/// Handles the documented forms ("50", "50 km/h", "30 mph"), the walking
/// placeholder ("walk"), and the documented-but-invalid multi-value form
/// ("45;80", taking the minimum). Unrecognized placeholders ("none",
/// "unposted", "variable", ...) resolve to `None` rather than an error,
/// since they carry no numeric speed to report.
pub fn parse_maxspeed(s: &str) -> Result<Option<f64>, String> {
    let entries: Vec<&str> = s.split([',', ';']).map(str::trim).collect();
    if entries.len() > 1 {
        let mut min: Option<f64> = None;
        for entry in &entries {
            if let Some(v) = parse_single_maxspeed(entry)? {
                min = Some(match min {
                    Some(m) => m.min(v),
                    None => v,
                });
            }
        }
        return Ok(min);
    }
    parse_single_maxspeed(entries[0])
}

fn parse_single_maxspeed(s: &str) -> Result<Option<f64>, String> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    match parts.as_slice() {
        [] => Ok(None),
        ["walk"] => Ok(Some(DEFAULT_WALK_SPEED_KMH)),
        ["unposted"] | ["unknown"] | ["default"] | ["variable"] | ["national"] | ["none"] => Ok(None),
        [speed_str] => {
            let v: f64 = speed_str
                .parse()
                .map_err(|e| format!("speed value '{speed_str}' is not a valid number: {e}"))?;
            if v == 0.0 {
                Ok(None)
            } else {
                Ok(Some(v))
            }
        }
        [speed_str, unit_str] => {
            let v: f64 = speed_str
                .parse()
                .map_err(|e| format!("speed value '{speed_str}' is not a valid number: {e}"))?;
            if v == 0.0 {
                return Ok(None);
            }
            match *unit_str {
                "kph" | "km/h" => Ok(Some(v)),
                "mph" => Ok(Some(v * KMH_PER_MPH)),
                other => Err(format!("unknown speed unit '{other}' with value {v}")),
            }
        }
        _ => Err(format!("unexpected maxspeed entry '{s}'")),
    }
}
