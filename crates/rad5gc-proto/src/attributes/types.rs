/// RADIUS Attribute Types consumed or produced by the gateway
///
/// The full IANA registry is deliberately not mirrored here; only the
/// attributes that appear on the Wi-Fi access / 5GC authentication path
/// are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// Vendor-Specific (26) - RFC 2865
    /// Carries the MS-MPPE-Send-Key / MS-MPPE-Recv-Key material (RFC 2548)
    VendorSpecific = 26,
    /// Proxy-State (33) - RFC 2865
    /// Opaque, multi-valued; must be echoed in replies in original order
    ProxyState = 33,
    /// EAP-Message (79) - RFC 3579
    /// Encapsulates EAP packets for transport over RADIUS
    EapMessage = 79,
    /// Message-Authenticator (80) - RFC 2869
    MessageAuthenticator = 80,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeType::UserName),
            18 => Some(AttributeType::ReplyMessage),
            26 => Some(AttributeType::VendorSpecific),
            33 => Some(AttributeType::ProxyState),
            79 => Some(AttributeType::EapMessage),
            80 => Some(AttributeType::MessageAuthenticator),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
