//! Small helpers shared by the feed pipeline and the registration flow.
//!
//! - **URL validation**: well-formedness and private-host checks for feed URLs
//! - **Text cleaning**: control-character stripping for feed-supplied text

mod text;
mod url_validator;

pub use text::{clean_text, strip_control_chars};
pub use url_validator::{validate_url, validate_url_format, UrlValidationError};
