//! Coordinate reference descriptors attached to decoded rasters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The coordinate reference a raster declares.
///
/// The pipeline never reprojects; the descriptor is carried through so callers
/// know which units a bbox or sample coordinate is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum CrsDescriptor {
    /// An EPSG registry code, e.g. 4326 or 32643.
    Epsg(u32),
    /// A user-defined or otherwise unrecognized reference.
    Custom(String),
    #[default]
    Unknown,
}

impl CrsDescriptor {
    pub fn epsg(code: u32) -> Self {
        CrsDescriptor::Epsg(code)
    }

    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            CrsDescriptor::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    /// Geographic (lat/lon degrees) CRS codes live in the 4000 block of the
    /// EPSG registry.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsDescriptor::Epsg(code) if (4000..5000).contains(code))
    }
}

impl fmt::Display for CrsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsDescriptor::Epsg(code) => write!(f, "EPSG:{}", code),
            CrsDescriptor::Custom(name) => write!(f, "{}", name),
            CrsDescriptor::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for CrsDescriptor {
    type Err = std::convert::Infallible;

    /// Accepts `EPSG:xxxx` (any case) and `CRS:84`; anything else is kept
    /// verbatim as a custom reference.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if normalized.is_empty() {
            return Ok(CrsDescriptor::Unknown);
        }
        if normalized == "CRS:84" {
            return Ok(CrsDescriptor::Epsg(4326));
        }
        if let Some(code) = normalized
            .strip_prefix("EPSG:")
            .and_then(|rest| rest.parse::<u32>().ok())
        {
            return Ok(CrsDescriptor::Epsg(code));
        }
        Ok(CrsDescriptor::Custom(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!("EPSG:4326".parse::<CrsDescriptor>().unwrap(), CrsDescriptor::Epsg(4326));
        assert_eq!("epsg:32643".parse::<CrsDescriptor>().unwrap(), CrsDescriptor::Epsg(32643));
        assert_eq!("CRS:84".parse::<CrsDescriptor>().unwrap(), CrsDescriptor::Epsg(4326));
        assert_eq!("".parse::<CrsDescriptor>().unwrap(), CrsDescriptor::Unknown);
        assert_eq!(
            "LOCAL_CS".parse::<CrsDescriptor>().unwrap(),
            CrsDescriptor::Custom("LOCAL_CS".into())
        );
    }

    #[test]
    fn test_geographic() {
        assert!(CrsDescriptor::Epsg(4326).is_geographic());
        assert!(!CrsDescriptor::Epsg(32643).is_geographic());
        assert!(!CrsDescriptor::Unknown.is_geographic());
        assert_eq!(CrsDescriptor::Epsg(3857).to_string(), "EPSG:3857");
    }
}
