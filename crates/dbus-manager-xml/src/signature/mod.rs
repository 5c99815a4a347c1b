//! Validation of D-Bus type signatures.


pub use self::signature_error::SignatureError;
use self::signature_error::SignatureErrorKind;
mod signature_error;

mod validation;

/// The maximum length of a signature.
pub const MAX_SIGNATURE: usize = 255;

/// The maximum individual container depth.
pub const MAX_CONTAINER_DEPTH: usize = 32;

/// Validate a signature made up of any number of complete types.
///
/// # Examples
///
/// ```
/// use dbus_manager_xml::signature;
///
/// assert!(signature::validate("").is_ok());
/// assert!(signature::validate("sa{sv}u").is_ok());
/// assert!(signature::validate("a{vs}").is_err());
/// ```
pub fn validate(signature: &str) -> Result<(), SignatureError> {
    validation::validate(signature.as_bytes())?;
    Ok(())
}

/// Validate a signature which must consist of exactly one complete type, as
/// required for arguments and properties.
///
/// # Examples
///
/// ```
/// use dbus_manager_xml::signature;
///
/// assert!(signature::validate_single("a{sv}").is_ok());
/// assert!(signature::validate_single("ss").is_err());
/// assert!(signature::validate_single("~").is_err());
/// ```
pub fn validate_single(signature: &str) -> Result<(), SignatureError> {
    match validation::validate(signature.as_bytes())? {
        0 => Err(SignatureError::new(SignatureErrorKind::Empty)),
        1 => Ok(()),
        _ => Err(SignatureError::new(SignatureErrorKind::NotSingleCompleteType)),
    }
}
