//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that an RFID uid is 8 to 20 uppercase hexadecimal characters
/// of even length, matching 4 to 10 byte tag uids.
///
/// # Examples
///
/// ```ignore
/// validate_rfid_uid("04A3B2C1")           // Ok
/// validate_rfid_uid("04a3b2c1")           // Err - lowercase
/// validate_rfid_uid("04A3B2C")            // Err - odd length
/// ```
pub fn validate_rfid_uid(uid: &str) -> Result<(), ValidationError> {
    if uid.len() < 8 || uid.len() > 20 || uid.len() % 2 != 0 {
        let mut err = ValidationError::new("rfid_uid_length");
        err.message = Some(
            format!(
                "RFID uid must be 8 to 20 hex characters of even length (got {})",
                uid.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !uid
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase())
    {
        let mut err = ValidationError::new("rfid_uid_format");
        err.message = Some("RFID uid must contain only uppercase hexadecimal characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a reader-supplied scan id is non-empty, printable ASCII
/// and short enough to key the replay log.
pub fn validate_scan_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 128 {
        let mut err = ValidationError::new("scan_id_length");
        err.message = Some(format!("scan id must be 1 to 128 characters (got {})", id.len()).into());
        return Err(err);
    }

    if !id.chars().all(|c| c.is_ascii_graphic()) {
        let mut err = ValidationError::new("scan_id_format");
        err.message = Some("scan id must contain only printable ASCII characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a `#RRGGBB` hex color.
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if !valid {
        let mut err = ValidationError::new("color_format");
        err.message = Some("color must be a #RRGGBB hex string".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rfid_uid_valid() {
        assert!(validate_rfid_uid("04A3B2C1").is_ok());
        assert!(validate_rfid_uid("04D9A2B31C80").is_ok());
        assert!(validate_rfid_uid("0123456789ABCDEF0123").is_ok());
    }

    #[test]
    fn test_validate_rfid_uid_invalid_length() {
        assert!(validate_rfid_uid("04A3B2").is_err()); // too short
        assert!(validate_rfid_uid("0123456789ABCDEF012345").is_err()); // too long
        assert!(validate_rfid_uid("04A3B2C").is_err()); // odd length
        assert!(validate_rfid_uid("").is_err()); // empty
    }

    #[test]
    fn test_validate_rfid_uid_invalid_format() {
        assert!(validate_rfid_uid("04a3b2c1").is_err()); // lowercase
        assert!(validate_rfid_uid("04A3B2CG").is_err()); // invalid hex
        assert!(validate_rfid_uid("04A3 2C1").is_err()); // space
    }

    #[test]
    fn test_validate_scan_id() {
        assert!(validate_scan_id("reader-1:42").is_ok());
        assert!(validate_scan_id("a").is_ok());
        assert!(validate_scan_id("").is_err());
        assert!(validate_scan_id(&"x".repeat(129)).is_err());
        assert!(validate_scan_id("with space").is_err());
    }

    #[test]
    fn test_validate_hex_color() {
        assert!(validate_hex_color("#E6194B").is_ok());
        assert!(validate_hex_color("#e6194b").is_ok());
        assert!(validate_hex_color("E6194B").is_err()); // missing hash
        assert!(validate_hex_color("#E6194").is_err()); // too short
        assert!(validate_hex_color("#E6194G").is_err()); // invalid hex
    }
}
