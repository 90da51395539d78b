//! Validation of client-supplied object tag sets.

use shared_types::{Tag, TagSet};

use crate::error::{EngineError, Result};

pub const MAX_TAGS: usize = 10;
pub const MAX_KEY_LENGTH: usize = 128;
pub const MAX_VALUE_LENGTH: usize = 256;

/// Validate `tags` and collect them into a [`TagSet`].
///
/// Checks, in order: the tag count, then each tag's key and value, then
/// key uniqueness. An empty list is valid and clears the tags.
pub fn validate_tag_set(tags: &[Tag]) -> Result<TagSet> {
    if tags.len() > MAX_TAGS {
        return Err(EngineError::BadRequest(format!(
            "Object tags cannot be greater than {MAX_TAGS}"
        )));
    }

    let mut set = TagSet::new();
    for tag in tags {
        validate_tag(tag)?;
        if set.insert(tag.key.clone(), tag.value.clone()).is_some() {
            return Err(EngineError::InvalidTag(
                "Cannot provide multiple Tags with the same key".to_string(),
            ));
        }
    }
    Ok(set)
}

fn validate_tag(tag: &Tag) -> Result<()> {
    let key_length = tag.key.chars().count();
    if key_length == 0 || key_length > MAX_KEY_LENGTH {
        return Err(EngineError::InvalidTag(format!(
            "The TagKey you have provided is invalid: length must be between 1 and {MAX_KEY_LENGTH}"
        )));
    }
    if tag.value.chars().count() > MAX_VALUE_LENGTH {
        return Err(EngineError::InvalidTag(format!(
            "The TagValue you have provided is invalid: length must not exceed {MAX_VALUE_LENGTH}"
        )));
    }
    if !tag.key.chars().all(is_allowed_char) {
        return Err(EngineError::InvalidTag(
            "The TagKey you have provided contains invalid characters".to_string(),
        ));
    }
    if !tag.value.chars().all(is_allowed_char) {
        return Err(EngineError::InvalidTag(
            "The TagValue you have provided contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Letters, digits, non-control whitespace and `_ . : / = + - @`.
fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric()
        || (c.is_whitespace() && !c.is_control())
        || matches!(c, '_' | '.' | ':' | '/' | '=' | '+' | '-' | '@')
}
