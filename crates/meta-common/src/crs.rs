//! Coordinate reference system strings.
//!
//! Spatial reference systems are catalogued by the WKT form of the PROJ4
//! string found in a file. The serialization here is deterministic, so two
//! PROJ4 strings that differ only in token order or number formatting map
//! to the same WKT text.

use std::collections::BTreeMap;
use std::fmt;

use crate::{MetaError, MetaResult};

/// PROJ4 string assumed for files that do not declare a CRS (geographic WGS84).
pub const DEFAULT_PROJ4: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// Well-known srid of geographic WGS84.
pub const WGS84_SRID: i64 = 4326;

/// A parsed PROJ4 definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Proj4 {
    proj: String,
    params: BTreeMap<String, Option<String>>,
}

/// Ellipsoid name, semi-major axis (m), inverse flattening.
type Ellipsoid = (&'static str, f64, f64);

const ELLIPSOIDS: &[(&str, Ellipsoid)] = &[
    ("WGS84", ("WGS 84", 6378137.0, 298.257223563)),
    ("GRS80", ("GRS 1980", 6378137.0, 298.257222101)),
    ("clrk66", ("Clarke 1866", 6378206.4, 294.978698213898)),
    ("intl", ("International 1924", 6378388.0, 297.0)),
    ("sphere", ("Normal Sphere", 6370997.0, 0.0)),
];

const DATUMS: &[(&str, &str, &str)] = &[
    ("WGS84", "WGS_1984", "WGS84"),
    ("NAD83", "North_American_Datum_1983", "GRS80"),
    ("NAD27", "North_American_Datum_1927", "clrk66"),
];

impl Proj4 {
    /// Parse a PROJ4 string such as `+proj=lcc +lat_1=49 +lat_2=77 +ellps=GRS80`.
    pub fn parse(input: &str) -> MetaResult<Self> {
        let invalid = |message: &str| MetaError::InvalidProj4 {
            input: input.to_string(),
            message: message.to_string(),
        };

        let mut proj = None;
        let mut params = BTreeMap::new();

        for token in input.split_whitespace() {
            let token = token
                .strip_prefix('+')
                .ok_or_else(|| invalid("every token must start with '+'"))?;
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v.to_string())),
                None => (token, None),
            };
            if key.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            if key == "proj" {
                proj = value;
            } else {
                params.insert(key.to_string(), value);
            }
        }

        let proj = proj.ok_or_else(|| invalid("missing +proj"))?;
        Ok(Self { proj, params })
    }

    /// Projection name (`longlat`, `lcc`, `stere`, ...).
    pub fn proj(&self) -> &str {
        &self.proj
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self.proj.as_str(), "longlat" | "latlong" | "lonlat" | "latlon")
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_deref())
    }

    fn ellipsoid(&self) -> MetaResult<(String, f64, f64)> {
        let datum_ellps = self
            .param("datum")
            .and_then(|d| DATUMS.iter().find(|(name, _, _)| *name == d))
            .map(|(_, _, ellps)| *ellps);

        if let Some(name) = self.param("ellps").or(datum_ellps) {
            if let Some((_, (wkt_name, a, rf))) = ELLIPSOIDS.iter().find(|(n, _)| *n == name) {
                return Ok((wkt_name.to_string(), *a, *rf));
            }
            return Err(MetaError::InvalidProj4 {
                input: self.to_string(),
                message: format!("unknown ellipsoid '{}'", name),
            });
        }

        if let Some(r) = self.number("R")? {
            return Ok(("unknown".to_string(), r, 0.0));
        }

        if let Some(a) = self.number("a")? {
            let rf = match (self.number("rf")?, self.number("b")?) {
                (Some(rf), _) => rf,
                (None, Some(b)) if a != b => a / (a - b),
                _ => 0.0,
            };
            return Ok(("unknown".to_string(), a, rf));
        }

        let (_, (wkt_name, a, rf)) = ELLIPSOIDS[0];
        Ok((wkt_name.to_string(), a, rf))
    }

    fn number(&self, key: &str) -> MetaResult<Option<f64>> {
        match self.param(key) {
            None => Ok(None),
            Some(v) => v.parse::<f64>().map(Some).map_err(|_| MetaError::InvalidProj4 {
                input: self.to_string(),
                message: format!("parameter '{}' is not numeric: {}", key, v),
            }),
        }
    }

    fn datum_name(&self) -> String {
        self.param("datum")
            .and_then(|d| DATUMS.iter().find(|(name, _, _)| *name == d))
            .map(|(_, wkt, _)| wkt.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn geogcs(&self) -> MetaResult<String> {
        let (ellps, a, rf) = self.ellipsoid()?;
        let datum = self.datum_name();
        Ok(format!(
            "GEOGCS[\"{datum}\",DATUM[\"{datum}\",SPHEROID[\"{ellps}\",{a},{rf}]],\
             PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]"
        ))
    }

    fn projection_name(&self) -> String {
        match self.proj.as_str() {
            "lcc" if self.params.contains_key("lat_2") => "Lambert_Conformal_Conic_2SP".into(),
            "lcc" => "Lambert_Conformal_Conic_1SP".into(),
            "stere" => "Polar_Stereographic".into(),
            "tmerc" | "utm" => "Transverse_Mercator".into(),
            "merc" => "Mercator_1SP".into(),
            "aea" => "Albers_Conic_Equal_Area".into(),
            "laea" => "Lambert_Azimuthal_Equal_Area".into(),
            other => other.to_string(),
        }
    }

    fn units(&self) -> (&'static str, f64) {
        match self.param("units") {
            Some("km") => ("kilometre", 1000.0),
            Some("us-ft") => ("US survey foot", 0.304800609601219),
            _ => ("metre", 1.0),
        }
    }

    /// Deterministic WKT serialization.
    pub fn to_wkt(&self) -> MetaResult<String> {
        let geogcs = self.geogcs()?;
        if self.is_geographic() {
            return Ok(geogcs);
        }

        const SKIP: &[&str] = &["ellps", "datum", "a", "b", "rf", "R", "units", "no_defs", "towgs84"];

        let mut parameters: Vec<(String, String)> = Vec::new();
        for (key, value) in &self.params {
            if SKIP.contains(&key.as_str()) {
                continue;
            }
            let name = match key.as_str() {
                "lat_0" | "lat_ts" => "latitude_of_origin",
                "lon_0" => "central_meridian",
                "lat_1" => "standard_parallel_1",
                "lat_2" => "standard_parallel_2",
                "x_0" => "false_easting",
                "y_0" => "false_northing",
                "k" | "k_0" => "scale_factor",
                other => other,
            };
            let value = match value {
                Some(v) => match v.parse::<f64>() {
                    Ok(n) => n.to_string(),
                    Err(_) => format!("\"{}\"", v),
                },
                None => continue,
            };
            parameters.push((name.to_string(), value));
        }
        parameters.sort();

        let mut wkt = format!(
            "PROJCS[\"unknown\",{},PROJECTION[\"{}\"]",
            geogcs,
            self.projection_name()
        );
        for (name, value) in parameters {
            wkt.push_str(&format!(",PARAMETER[\"{}\",{}]", name, value));
        }
        let (unit, factor) = self.units();
        wkt.push_str(&format!(",UNIT[\"{}\",{}]]", unit, factor));
        Ok(wkt)
    }
}

impl fmt::Display for Proj4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+proj={}", self.proj)?;
        for (key, value) in &self.params {
            match value {
                Some(v) => write!(f, " +{}={}", key, v)?,
                None => write!(f, " +{}", key)?,
            }
        }
        Ok(())
    }
}

/// WKT for a PROJ4 string, falling back to [`DEFAULT_PROJ4`] when absent.
pub fn proj4_to_wkt(proj4: Option<&str>) -> MetaResult<String> {
    Proj4::parse(proj4.unwrap_or(DEFAULT_PROJ4))?.to_wkt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_geographic_wgs84() {
        let proj = Proj4::parse(DEFAULT_PROJ4).unwrap();
        assert!(proj.is_geographic());
        let wkt = proj.to_wkt().unwrap();
        assert!(wkt.starts_with("GEOGCS[\"WGS_1984\""));
        assert!(wkt.contains("SPHEROID[\"WGS 84\",6378137,298.257223563]"));
    }

    #[test]
    fn test_token_order_does_not_change_wkt() {
        let a = proj4_to_wkt(Some("+proj=lcc +lat_1=49 +lat_2=77 +lon_0=-95 +ellps=GRS80")).unwrap();
        let b = proj4_to_wkt(Some("+ellps=GRS80 +lon_0=-95.0 +lat_2=77 +proj=lcc +lat_1=49.000")).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("Lambert_Conformal_Conic_2SP"));
        assert!(a.contains("PARAMETER[\"central_meridian\",-95]"));
    }

    #[test]
    fn test_rotated_pole_passes_parameters_through() {
        let wkt = proj4_to_wkt(Some(
            "+proj=ob_tran +o_proj=longlat +o_lon_p=-162 +o_lat_p=39.25 +lon_0=180 +R=6371000",
        ))
        .unwrap();
        assert!(wkt.contains("PROJECTION[\"ob_tran\"]"));
        assert!(wkt.contains("PARAMETER[\"o_lat_p\",39.25]"));
        assert!(wkt.contains("PARAMETER[\"o_proj\",\"longlat\"]"));
        assert!(wkt.contains("SPHEROID[\"unknown\",6371000,0]"));
    }

    #[test]
    fn test_missing_proj_is_rejected() {
        assert!(matches!(
            Proj4::parse("+ellps=WGS84"),
            Err(MetaError::InvalidProj4 { .. })
        ));
        assert!(Proj4::parse("proj=longlat").is_err());
    }

    #[test]
    fn test_absent_crs_uses_default() {
        assert_eq!(
            proj4_to_wkt(None).unwrap(),
            Proj4::parse(DEFAULT_PROJ4).unwrap().to_wkt().unwrap()
        );
    }
}
