use crate::error::{ApiError, Result};
use regex::Regex;
use std::sync::OnceLock;

const MIN_SECTOR_LEN: usize = 2;
const MAX_SECTOR_LEN: usize = 100;

fn sector_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9\s\-]+$").expect("sector pattern is valid"))
}

/// Normalize a sector name: trim whitespace, lowercase.
pub fn normalize_sector(sector: &str) -> String {
    sector.trim().to_lowercase()
}

/// Format check on a normalized sector name: letters, digits, spaces and
/// hyphens only, 2-100 characters. There is no whitelist of known sectors.
pub fn validate_sector(sector: &str) -> Result<()> {
    if sector.len() < MIN_SECTOR_LEN || sector.len() > MAX_SECTOR_LEN {
        return Err(ApiError::InvalidSector(format!(
            "sector must be between {} and {} characters",
            MIN_SECTOR_LEN, MAX_SECTOR_LEN
        )));
    }

    if !sector_pattern().is_match(sector) {
        return Err(ApiError::InvalidSector(
            "sector must contain only letters, numbers, spaces, and hyphens".to_string(),
        ));
    }

    Ok(())
}
