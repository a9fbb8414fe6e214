use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Legal form of a client company. Drives which onboarding documents are
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyType {
    Individual,
    Partnership,
    Corporation,
    #[serde(rename = "LLC")]
    Llc,
}

impl CompanyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyType::Individual => "Individual",
            CompanyType::Partnership => "Partnership",
            CompanyType::Corporation => "Corporation",
            CompanyType::Llc => "LLC",
        }
    }
}

/// Onboarding progression for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    New,
    InProgress,
    Completed,
}

impl OnboardingStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(OnboardingStatus::New),
            "in_progress" => Some(OnboardingStatus::InProgress),
            "completed" => Some(OnboardingStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStatus::New => "new",
            OnboardingStatus::InProgress => "in_progress",
            OnboardingStatus::Completed => "completed",
        }
    }
}

/// Verification state of a single checklist document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Pending,
    Uploaded,
    Verified,
    Rejected,
}

impl ChecklistStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ChecklistStatus::Pending),
            "uploaded" => Some(ChecklistStatus::Uploaded),
            "verified" => Some(ChecklistStatus::Verified),
            "rejected" => Some(ChecklistStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "Italy".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub address: Address,
}

/// Required for companies; individuals represent themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalRepresentative {
    pub first_name: String,
    pub last_name: String,
    pub fiscal_code: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConsent {
    #[serde(default)]
    pub marketing: bool,
    #[serde(default)]
    pub third_party: bool,
    pub consent_date: Option<DateTime<Utc>>,
}

/// One required or optional document in the onboarding checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: Uuid,
    pub name: String,
    pub required: bool,
    pub status: ChecklistStatus,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl ChecklistItem {
    fn new(name: &str, required: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            required,
            status: ChecklistStatus::Pending,
            uploaded_at: None,
            verified_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Onboarding {
    pub status: OnboardingStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub checklist: Vec<ChecklistItem>,
}

impl Onboarding {
    pub fn new(assigned_to: Option<Uuid>, checklist: Vec<ChecklistItem>) -> Self {
        Self {
            status: OnboardingStatus::New,
            started_at: Utc::now(),
            completed_at: None,
            assigned_to,
            checklist,
        }
    }

    /// Onboarding counts as complete once every required document has been
    /// verified; a checklist with no required documents is never complete.
    pub fn is_complete(&self) -> bool {
        if self.status == OnboardingStatus::Completed {
            return true;
        }

        let required: Vec<_> = self.checklist.iter().filter(|item| item.required).collect();
        !required.is_empty()
            && required
                .iter()
                .all(|item| item.status == ChecklistStatus::Verified)
    }
}

/// Builds the default document checklist for a company type: three base
/// documents plus the type-specific extras.
pub fn default_checklist(company_type: CompanyType) -> Vec<ChecklistItem> {
    let mut checklist = vec![
        ChecklistItem::new("ID Document", true),
        ChecklistItem::new("Fiscal Code Card", true),
        ChecklistItem::new("Privacy Consent Form", true),
    ];

    match company_type {
        CompanyType::Individual => {
            checklist.push(ChecklistItem::new("VAT Registration", true));
            checklist.push(ChecklistItem::new("Tax Regime Declaration", true));
        }
        CompanyType::Partnership => {
            checklist.push(ChecklistItem::new("Partnership Deed", true));
            checklist.push(ChecklistItem::new("VAT Registration", true));
            checklist.push(ChecklistItem::new("Partner List", true));
        }
        CompanyType::Corporation | CompanyType::Llc => {
            checklist.push(ChecklistItem::new("Certificate of Incorporation", true));
            checklist.push(ChecklistItem::new("Company Statute", true));
            checklist.push(ChecklistItem::new("Chamber of Commerce Registration", true));
            checklist.push(ChecklistItem::new("Director/Administrator ID", true));
        }
    }

    checklist
}
