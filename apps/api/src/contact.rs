//! Outbound chat links. Opening one is fire-and-forget on the visitor's side;
//! the API only builds the URL.

use serde::Serialize;

const WHATSAPP_BASE: &str = "https://wa.me";

/// Where visitors are sent when no chat number is configured.
pub const CONTACT_PAGE: &str = "/contact";

pub const GENERAL_ENQUIRY: &str = "Hello, I'm interested in booking a Kerala tour package.";
pub const CUSTOM_PACKAGE_ENQUIRY: &str = "Hello, I'm interested in a custom Kerala tour package.";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactLink {
    Whatsapp { url: String },
    Fallback { url: String },
}

pub fn booking_message(package_title: &str) -> String {
    format!("Hello, I'm interested in booking the {package_title} package from Explore My Kerala.")
}

/// Builds a pre-filled chat link. Anything but digits is stripped from the
/// number; with no usable number the contact page is returned instead.
pub fn whatsapp_link(phone: Option<&str>, message: &str) -> ContactLink {
    let digits: String = phone
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return ContactLink::Fallback {
            url: CONTACT_PAGE.to_string(),
        };
    }

    ContactLink::Whatsapp {
        url: format!(
            "{WHATSAPP_BASE}/{digits}?text={}",
            urlencoding::encode(message)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_link_encodes_message() {
        let link = whatsapp_link(Some("+91 98765 43210"), &booking_message("Munnar & Thekkady"));
        assert_eq!(
            link,
            ContactLink::Whatsapp {
                url: "https://wa.me/919876543210?text=Hello%2C%20I%27m%20interested%20in%20booking%20the%20Munnar%20%26%20Thekkady%20package%20from%20Explore%20My%20Kerala.".to_string()
            }
        );
    }

    #[test]
    fn test_missing_number_falls_back() {
        assert_eq!(
            whatsapp_link(None, GENERAL_ENQUIRY),
            ContactLink::Fallback {
                url: "/contact".to_string()
            }
        );
        assert_eq!(
            whatsapp_link(Some("  "), GENERAL_ENQUIRY),
            ContactLink::Fallback {
                url: "/contact".to_string()
            }
        );
    }

    #[test]
    fn test_link_serializes_with_kind() {
        let json = serde_json::to_value(whatsapp_link(Some("1"), "hi")).unwrap();
        assert_eq!(json["kind"], "whatsapp");
        assert_eq!(json["url"], "https://wa.me/1?text=hi");
    }
}
