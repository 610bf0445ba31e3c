// Business area models - the fixed enumeration the interview covers

use serde::{Deserialize, Serialize};

/// A business area the interview can detect as expertise or scan for risk.
/// Serializes as lowercase strings to match the frontend union type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Technology,
    Sales,
    Marketing,
    Finance,
    Operations,
    People,
    Strategy,
}

impl Area {
    /// All areas in catalog order
    pub fn all() -> &'static [Area] {
        &[
            Area::Technology,
            Area::Sales,
            Area::Marketing,
            Area::Finance,
            Area::Operations,
            Area::People,
            Area::Strategy,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Technology => "technology",
            Area::Sales => "sales",
            Area::Marketing => "marketing",
            Area::Finance => "finance",
            Area::Operations => "operations",
            Area::People => "people",
            Area::Strategy => "strategy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Area::Technology => "Technology",
            Area::Sales => "Sales",
            Area::Marketing => "Marketing",
            Area::Finance => "Finance",
            Area::Operations => "Operations",
            Area::People => "People",
            Area::Strategy => "Strategy",
        }
    }

    /// Icon identifier used by the rendering layer
    pub fn icon(&self) -> &'static str {
        match self {
            Area::Technology => "cpu",
            Area::Sales => "handshake",
            Area::Marketing => "megaphone",
            Area::Finance => "wallet",
            Area::Operations => "settings",
            Area::People => "users",
            Area::Strategy => "compass",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Area::Technology => "Platforms, delivery practices and technical debt",
            Area::Sales => "Pipeline, conversion and customer concentration",
            Area::Marketing => "Demand generation, positioning and channel mix",
            Area::Finance => "Cash, margins, forecasting and runway",
            Area::Operations => "Processes, fulfilment and operational resilience",
            Area::People => "Hiring, retention and team capability",
            Area::Strategy => "Direction, prioritisation and planning cadence",
        }
    }

    /// Position in catalog order (used as a stable tiebreak)
    pub fn index(&self) -> usize {
        match self {
            Area::Technology => 0,
            Area::Sales => 1,
            Area::Marketing => 2,
            Area::Finance => 3,
            Area::Operations => 4,
            Area::People => 5,
            Area::Strategy => 6,
        }
    }

    pub fn metadata(&self) -> AreaMetadata {
        AreaMetadata {
            area: *self,
            name: self.display_name().to_string(),
            icon: self.icon().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "technology" | "tech" | "it" | "engineering" => Ok(Area::Technology),
            "sales" | "revenue" => Ok(Area::Sales),
            "marketing" | "growth" => Ok(Area::Marketing),
            "finance" | "financial" | "finances" => Ok(Area::Finance),
            "operations" | "ops" | "operational" => Ok(Area::Operations),
            "people" | "hr" | "talent" | "team" => Ok(Area::People),
            "strategy" | "strategic" | "leadership" => Ok(Area::Strategy),
            _ => Err(format!(
                "Invalid area: '{}'. Expected one of technology, sales, marketing, finance, operations, people, strategy",
                s
            )),
        }
    }
}

/// Static presentation metadata for an area
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMetadata {
    pub area: Area,
    pub name: String,
    pub icon: String,
    pub description: String,
}
