/// A parsed access-log request fact (C4 output). Transient — built per
/// line and consumed immediately by the counter updater (C6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitFact {
    pub app: String,
    pub group: String,
    pub vtype: VisitType,
    pub date: String,
    pub hour: String,
    pub ten_min: String,
    pub minute: String,
    pub response_size: u64,
    pub response_duration: u64,
}

/// Response-class discriminator. `Other` (404) is reserved and only
/// produced when `FilterConfig::enable_404` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitType {
    Ok,    // "1" = 200
    Found, // "2" = 302
    Other, // "3" = 404, reserved, disabled by default
}

impl VisitType {
    pub fn as_str(self) -> &'static str {
        match self {
            VisitType::Ok => "1",
            VisitType::Found => "2",
            VisitType::Other => "3",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1" => Some(VisitType::Ok),
            "2" => Some(VisitType::Found),
            "3" => Some(VisitType::Other),
            _ => None,
        }
    }
}
