//! SAML Status types.
//!
//! Status information returned in SAML protocol responses.

use serde::{Deserialize, Serialize};

use super::{status_codes, MAX_STATUS_CODE_DEPTH, SAMLP_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// SAML protocol status.
///
/// Contains the status code and optional message for a SAML response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::success(),
            status_message: None,
        }
    }

    /// Creates a status with the given top-level code.
    #[must_use]
    pub const fn with_code(status_code: StatusCode) -> Self {
        Self {
            status_code,
            status_message: None,
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Returns the code values from the top level down, space separated.
    ///
    /// At most [`MAX_STATUS_CODE_DEPTH`] levels are included.
    #[must_use]
    pub fn code_chain(&self) -> String {
        self.status_code
            .chain()
            .map(|code| code.value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Builds the `samlp:Status` element.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el =
            Element::new("samlp", "Status", SAMLP_NS).with_child(self.status_code.to_element());
        if let Some(message) = &self.status_message {
            el.push_child(
                Element::new("samlp", "StatusMessage", SAMLP_NS).with_text(message.clone()),
            );
        }
        el
    }

    /// Decodes a `samlp:Status` element.
    ///
    /// # Errors
    ///
    /// Returns an error if the `StatusCode` is missing or nested deeper than
    /// [`MAX_STATUS_CODE_DEPTH`].
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        let code = el
            .find_child(SAMLP_NS, "StatusCode")
            .ok_or_else(|| SamlError::MissingElement("StatusCode".to_string()))?;
        Ok(Self {
            status_code: StatusCode::from_element(code, 1)?,
            status_message: el
                .find_child(SAMLP_NS, "StatusMessage")
                .map(Element::text),
        })
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code.
///
/// Status codes can be nested, with a top-level code and optional sub-code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Optional nested status code providing more detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a new status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    /// Creates a success status code.
    #[must_use]
    pub fn success() -> Self {
        Self::new(status_codes::SUCCESS)
    }

    /// Creates a requester error status code.
    #[must_use]
    pub fn requester() -> Self {
        Self::new(status_codes::REQUESTER)
    }

    /// Creates a responder error status code.
    #[must_use]
    pub fn responder() -> Self {
        Self::new(status_codes::RESPONDER)
    }

    /// Adds a sub-status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub: StatusCode) -> Self {
        self.status_code = Some(Box::new(sub));
        self
    }

    /// Returns true if this is a success status code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value == status_codes::SUCCESS
    }

    /// Returns the sub-status code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.status_code.as_ref().map(|s| s.value.as_str())
    }

    /// Iterates over this code and its nested codes, bounded by
    /// [`MAX_STATUS_CODE_DEPTH`].
    pub fn chain(&self) -> impl Iterator<Item = &StatusCode> {
        std::iter::successors(Some(self), |code| code.status_code.as_deref())
            .take(MAX_STATUS_CODE_DEPTH)
    }

    fn to_element(&self) -> Element {
        let mut el =
            Element::new("samlp", "StatusCode", SAMLP_NS).with_attr("Value", self.value.clone());
        if let Some(sub) = &self.status_code {
            el.push_child(sub.to_element());
        }
        el
    }

    fn from_element(el: &Element, depth: usize) -> SamlResult<Self> {
        if depth > MAX_STATUS_CODE_DEPTH {
            return Err(SamlError::InvalidResponse(format!(
                "StatusCode nested deeper than {MAX_STATUS_CODE_DEPTH} levels"
            )));
        }
        let value = el
            .attr("Value")
            .ok_or_else(|| SamlError::MissingElement("StatusCode/@Value".to_string()))?;
        let status_code = el
            .find_child(SAMLP_NS, "StatusCode")
            .map(|sub| Self::from_element(sub, depth + 1).map(Box::new))
            .transpose()?;
        Ok(Self {
            value: value.to_string(),
            status_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sub_status_codes;

    #[test]
    fn status_success() {
        let status = Status::success();
        assert!(status.is_success());
        assert!(status.status_message.is_none());
    }

    #[test]
    fn status_code_with_sub() {
        let code =
            StatusCode::requester().with_sub_status(StatusCode::new("custom:status:SubCode"));
        assert!(!code.is_success());
        assert_eq!(code.sub_status_value(), Some("custom:status:SubCode"));
    }

    #[test]
    fn code_chain_joins_nested_values() {
        let status = Status::with_code(
            StatusCode::requester()
                .with_sub_status(StatusCode::new(sub_status_codes::INVALID_ATTR_NAME_OR_VALUE)),
        );
        assert_eq!(
            status.code_chain(),
            format!(
                "{} {}",
                status_codes::REQUESTER,
                sub_status_codes::INVALID_ATTR_NAME_OR_VALUE
            )
        );
    }

    #[test]
    fn element_roundtrip() {
        let status = Status::with_code(
            StatusCode::responder()
                .with_sub_status(StatusCode::new(sub_status_codes::REQUEST_DENIED)),
        );
        let decoded = Status::from_element(&status.to_element()).unwrap();
        assert_eq!(decoded, status);
    }

    fn nested(depth: usize) -> StatusCode {
        let mut code = StatusCode::new("level-0");
        for level in 1..depth {
            code = StatusCode::new(format!("level-{level}")).with_sub_status(code);
        }
        code
    }

    #[test]
    fn decode_rejects_excessive_nesting() {
        let ok = Status::with_code(nested(MAX_STATUS_CODE_DEPTH)).to_element();
        assert!(Status::from_element(&ok).is_ok());

        let deep = Status::with_code(nested(MAX_STATUS_CODE_DEPTH + 1)).to_element();
        assert!(Status::from_element(&deep).is_err());
    }

    #[test]
    fn chain_walk_is_bounded() {
        let code = nested(MAX_STATUS_CODE_DEPTH * 2);
        assert_eq!(code.chain().count(), MAX_STATUS_CODE_DEPTH);
    }

    #[test]
    fn missing_status_code_is_rejected() {
        let el = Element::new("samlp", "Status", SAMLP_NS);
        assert!(matches!(
            Status::from_element(&el),
            Err(SamlError::MissingElement(_))
        ));
    }
}
