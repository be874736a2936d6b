//! Business sector catalogue
//!
//! Company profiles carry a sector code from this list; anything else the
//! model invents is discarded.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessSector {
    pub code: &'static str,
    pub label: &'static str,
}

pub const BUSINESS_SECTORS: &[BusinessSector] = &[
    BusinessSector { code: "agriculture", label: "Agriculture" },
    BusinessSector { code: "automotive", label: "Automotive" },
    BusinessSector { code: "banking", label: "Banking" },
    BusinessSector { code: "construction", label: "Construction" },
    BusinessSector { code: "consulting", label: "Consulting" },
    BusinessSector { code: "consumer_goods", label: "Consumer Goods" },
    BusinessSector { code: "education", label: "Education" },
    BusinessSector { code: "energy", label: "Energy" },
    BusinessSector { code: "entertainment", label: "Entertainment" },
    BusinessSector { code: "fintech", label: "Fintech" },
    BusinessSector { code: "food_beverage", label: "Food & Beverage" },
    BusinessSector { code: "government", label: "Government" },
    BusinessSector { code: "healthcare", label: "Healthcare" },
    BusinessSector { code: "hospitality", label: "Hospitality" },
    BusinessSector { code: "insurance", label: "Insurance" },
    BusinessSector { code: "legal", label: "Legal" },
    BusinessSector { code: "logistics", label: "Logistics" },
    BusinessSector { code: "manufacturing", label: "Manufacturing" },
    BusinessSector { code: "media", label: "Media" },
    BusinessSector { code: "nonprofit", label: "Nonprofit" },
    BusinessSector { code: "pharmaceutical", label: "Pharmaceutical" },
    BusinessSector { code: "real_estate", label: "Real Estate" },
    BusinessSector { code: "retail", label: "Retail" },
    BusinessSector { code: "technology", label: "Technology" },
    BusinessSector { code: "telecommunications", label: "Telecommunications" },
    BusinessSector { code: "travel", label: "Travel" },
];

pub fn is_known_sector(code: &str) -> bool {
    BUSINESS_SECTORS.iter().any(|s| s.code == code)
}

/// Comma-separated codes for prompt text
pub fn sector_codes() -> String {
    BUSINESS_SECTORS
        .iter()
        .map(|s| s.code)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sector() {
        assert!(is_known_sector("banking"));
        assert!(!is_known_sector("Banking"));
        assert!(!is_known_sector("space_mining"));
    }

    #[test]
    fn test_codes_listed() {
        let codes = sector_codes();
        assert!(codes.starts_with("agriculture, automotive"));
        assert_eq!(codes.split(", ").count(), BUSINESS_SECTORS.len());
    }
}
