use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::xml::FromXmlAttribute;

/// The unit of a distance value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    NotSpecified,
    Meter,
    Kilometer,
    Feet,
    LandMile,
}

/// The unit of a speed value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[default]
    NotSpecified,
    MetersPerSecond,
    MilesPerHour,
    KilometersPerHour,
}

/// The unit of a mass value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassUnit {
    #[default]
    NotSpecified,
    Kilogram,
    MetricTons,
}

impl FromXmlAttribute for DistanceUnit {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "m" => Ok(DistanceUnit::Meter),
            "km" => Ok(DistanceUnit::Kilometer),
            "ft" => Ok(DistanceUnit::Feet),
            "mile" => Ok(DistanceUnit::LandMile),
            _ => bail!("not a distance unit: '{}'", value),
        }
    }
}

impl FromXmlAttribute for SpeedUnit {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "m/s" => Ok(SpeedUnit::MetersPerSecond),
            "mph" => Ok(SpeedUnit::MilesPerHour),
            "km/h" => Ok(SpeedUnit::KilometersPerHour),
            _ => bail!("not a speed unit: '{}'", value),
        }
    }
}

impl FromXmlAttribute for MassUnit {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "kg" => Ok(MassUnit::Kilogram),
            "t" => Ok(MassUnit::MetricTons),
            _ => bail!("not a mass unit: '{}'", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unit_tokens() {
        assert_eq!(DistanceUnit::from_xml_attribute("km").unwrap(), DistanceUnit::Kilometer);
        assert_eq!(SpeedUnit::from_xml_attribute("mph").unwrap(), SpeedUnit::MilesPerHour);
        assert_eq!(SpeedUnit::from_xml_attribute("km/h").unwrap(), SpeedUnit::KilometersPerHour);
        assert_eq!(MassUnit::from_xml_attribute("t").unwrap(), MassUnit::MetricTons);
        assert!(SpeedUnit::from_xml_attribute("knots").is_err());
    }
}
