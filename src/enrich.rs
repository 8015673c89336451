use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::entrez::{BiosampleAttributes, EntrezClient};
use crate::record::{UNKNOWN, is_unset};

/// The geography/biome slice of a record. Latitude and Longitude are always
/// set or unset together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoFields {
    pub location: String,
    pub biome: String,
    pub latitude: String,
    pub longitude: String,
}

impl GeoFields {
    fn unknown() -> Self {
        Self {
            location: UNKNOWN.to_string(),
            biome: UNKNOWN.to_string(),
            latitude: UNKNOWN.to_string(),
            longitude: UNKNOWN.to_string(),
        }
    }
}

// Any failure (non-numeric id, unresolvable id, transport error) degrades
// to the placeholder.
pub fn lineage_field<E: EntrezClient>(client: &E, tax_id: &str) -> String {
    let Ok(tax_id) = tax_id.trim().parse::<u32>() else {
        return UNKNOWN.to_string();
    };
    match client.fetch_lineage(tax_id) {
        Ok(Some(lineage)) => lineage,
        Ok(None) => UNKNOWN.to_string(),
        Err(err) => {
            warn!(tax_id, error = %err, "lineage lookup failed");
            UNKNOWN.to_string()
        }
    }
}

pub fn biosample_fields<E: EntrezClient>(client: &E, biosample_accession: &str) -> GeoFields {
    if is_unset(biosample_accession) {
        return GeoFields::unknown();
    }
    match client.fetch_biosample(biosample_accession.trim()) {
        Ok(attributes) => geo_fields(attributes.as_ref()),
        Err(err) => {
            warn!(biosample = biosample_accession, error = %err, "biosample lookup failed");
            GeoFields::unknown()
        }
    }
}

pub fn geo_fields(attributes: Option<&BiosampleAttributes>) -> GeoFields {
    let Some(attributes) = attributes else {
        return GeoFields::unknown();
    };

    let location = attributes
        .geo_loc_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    let environmental = attributes
        .environmental_sample
        .as_deref()
        .filter(|flag| flag.trim().eq_ignore_ascii_case("true"))
        .map(|_| "Environmental sample");
    let biome = attributes
        .isolation_source
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(environmental)
        .map(classify_biome)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let (latitude, longitude) = match attributes.lat_lon.as_deref().and_then(parse_lat_lon) {
        Some((lat, lon)) => (format_coord(lat), format_coord(lon)),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };

    GeoFields {
        location,
        biome,
        latitude,
        longitude,
    }
}

/// Coarse biome buckets keyed on common GOLD-like descriptors.
pub fn classify_biome(description: &str) -> String {
    let description = description.to_lowercase();
    let contains_any = |terms: &[&str]| terms.iter().any(|term| description.contains(term));

    let bucket = if contains_any(&["soil", "forest", "desert", "savanna"]) {
        "Terrestrial"
    } else if contains_any(&["marine", "sea", "ocean", "coastal"]) {
        "Marine"
    } else if contains_any(&["lake", "freshwater", "river", "pond"]) {
        "Freshwater"
    } else if contains_any(&["waste", "wastewater", "sewage"]) {
        "Wastewater"
    } else if contains_any(&["host", "symbiont", "root", "nodule"]) {
        "Host-Associated"
    } else if description.contains("hypersaline") {
        "Extreme - Hypersaline"
    } else if description.contains("hot spring") || description.contains("thermal") {
        "Extreme - Thermal"
    } else if description.contains("acidic") || description.contains("alkaline") {
        "Extreme - Acidic/Alkaline"
    } else if contains_any(&["reef", "coral"]) {
        "Reef"
    } else if description.contains("environmental sample") {
        "Environmental Sample"
    } else {
        "Other"
    };
    bucket.to_string()
}

static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d+)?$").unwrap());
static COMMA_DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d),(\d)").unwrap());

/// Parses a biosample `lat_lon` attribute into signed decimal degrees.
/// Accepted shapes, hemisphere letters required: `12.34 N 56.78 W` and
/// `12 20 24 N 56 46.8 W`, with degree symbols and comma decimal separators
/// tolerated. Either component failing to parse yields `None` for both.
pub fn parse_lat_lon(raw: &str) -> Option<(f64, f64)> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|ch| match ch {
            '°' | '′' | '’' | '\'' | '″' | '”' | '"' | ';' => ' ',
            other => other,
        })
        .collect();
    let normalized = COMMA_DECIMAL.replace_all(&normalized, "$1.$2");
    let normalized = normalized.replace(',', " ");

    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let (latitude, rest) = take_component(&tokens, 'N', 'S')?;
    let (longitude, rest) = take_component(rest, 'E', 'W')?;
    if !rest.is_empty() {
        return None;
    }
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }
    Some((latitude, longitude))
}

// One coordinate: 1-3 numeric tokens followed by a hemisphere letter.
// Returns the signed value and the unconsumed tail.
fn take_component<'a>(
    tokens: &'a [&'a str],
    positive: char,
    negative: char,
) -> Option<(f64, &'a [&'a str])> {
    let mut numbers = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        if let Some(hemisphere) = hemisphere_letter(token, positive, negative) {
            let value = combine_dms(&numbers)?;
            let signed = if hemisphere == negative { -value } else { value };
            return Some((signed, &tokens[index + 1..]));
        }
        if numbers.len() == 3 || !NUMBER_TOKEN.is_match(token) {
            return None;
        }
        numbers.push(token.parse::<f64>().ok()?);
    }
    None
}

fn hemisphere_letter(token: &str, positive: char, negative: char) -> Option<char> {
    let trimmed = token.trim_end_matches('.');
    if trimmed.len() != 1 {
        return None;
    }
    let letter = trimmed.chars().next()?.to_ascii_uppercase();
    (letter == positive || letter == negative).then_some(letter)
}

fn combine_dms(numbers: &[f64]) -> Option<f64> {
    match numbers {
        [degrees] => Some(*degrees),
        [degrees, minutes] if *minutes < 60.0 => Some(degrees + minutes / 60.0),
        [degrees, minutes, seconds] if *minutes < 60.0 && *seconds < 60.0 => {
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        _ => None,
    }
}

fn format_coord(value: f64) -> String {
    let mut text = format!("{value:.6}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}
