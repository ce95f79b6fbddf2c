use anyhow::{bail, Result};

// Validation constants
const MAX_NAME_LENGTH: usize = 256;
const MAX_TYPE_LENGTH: usize = 128;
const MAX_DESCRIPTION_LENGTH: usize = 4096;
const MAX_CONTEXT_LENGTH: usize = 1 << 20;

/// Validate entity name (any printable text, no control characters)
pub fn validate_name(name: &str, field: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("{} cannot be empty", field);
    }
    if name.len() > MAX_NAME_LENGTH {
        bail!("{} too long (max {} chars)", field, MAX_NAME_LENGTH);
    }
    if name.chars().any(|c| c.is_control()) {
        bail!("{} contains invalid characters", field);
    }
    Ok(())
}

/// Validate entity/relation type (alphanumeric, dashes, underscores)
pub fn validate_type(type_str: &str, field: &str) -> Result<()> {
    if type_str.is_empty() {
        bail!("{} cannot be empty", field);
    }
    if type_str.len() > MAX_TYPE_LENGTH {
        bail!("{} too long (max {} chars)", field, MAX_TYPE_LENGTH);
    }
    // Only allow alphanumeric, dash, underscore, dot, colon (for namespaced types)
    if !type_str.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == ':') {
        bail!("{} contains invalid characters (only alphanumeric, -, _, ., : allowed)", field);
    }
    Ok(())
}

/// Validate free-text description or details
pub fn validate_description(text: &str) -> Result<()> {
    if text.len() > MAX_DESCRIPTION_LENGTH {
        bail!("Description too long (max {} chars)", MAX_DESCRIPTION_LENGTH);
    }
    if text.contains('\0') {
        bail!("Description contains null bytes");
    }
    Ok(())
}

/// Validate a flattened dialogue transcript
pub fn validate_context(context: &str) -> Result<()> {
    if context.len() > MAX_CONTEXT_LENGTH {
        bail!("Context too long (max {} bytes)", MAX_CONTEXT_LENGTH);
    }
    if context.contains('\0') {
        bail!("Context contains null bytes");
    }
    Ok(())
}
