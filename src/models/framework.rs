use serde::{Deserialize, Serialize};

/// Compliance frameworks the control mapper has catalogs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Iso27001,
    Soc2,
    Hipaa,
    Gdpr,
}

impl Framework {
    pub const ALL: [Framework; 4] = [
        Framework::Iso27001,
        Framework::Soc2,
        Framework::Hipaa,
        Framework::Gdpr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iso27001 => "iso27001",
            Self::Soc2 => "soc2",
            Self::Hipaa => "hipaa",
            Self::Gdpr => "gdpr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Iso27001 => "ISO/IEC 27001",
            Self::Soc2 => "SOC 2",
            Self::Hipaa => "HIPAA Security Rule",
            Self::Gdpr => "GDPR",
        }
    }
}

impl std::str::FromStr for Framework {
    type Err = String;

    /// Accepts "iso27001", "ISO 27001", "iso-27001", "SOC2", "soc_2", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_' | '/'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "iso27001" | "isoiec27001" => Ok(Self::Iso27001),
            "soc2" => Ok(Self::Soc2),
            "hipaa" => Ok(Self::Hipaa),
            "gdpr" => Ok(Self::Gdpr),
            _ => Err(format!("unknown framework '{}'", s)),
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_parse_variants() {
        assert_eq!("iso27001".parse::<Framework>().unwrap(), Framework::Iso27001);
        assert_eq!("ISO 27001".parse::<Framework>().unwrap(), Framework::Iso27001);
        assert_eq!("iso-27001".parse::<Framework>().unwrap(), Framework::Iso27001);
        assert_eq!("SOC2".parse::<Framework>().unwrap(), Framework::Soc2);
        assert_eq!("soc_2".parse::<Framework>().unwrap(), Framework::Soc2);
    }

    #[test]
    fn test_framework_unknown() {
        assert!("pci".parse::<Framework>().is_err());
    }

    #[test]
    fn test_framework_serde_matches_as_str() {
        for fw in Framework::ALL {
            let json = serde_json::to_string(&fw).unwrap();
            assert_eq!(json, format!("\"{}\"", fw.as_str()));
        }
    }
}
