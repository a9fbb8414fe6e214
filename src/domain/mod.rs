/// Client registry domain model
///
/// Document-shaped data for accounting clients: company identity, contacts,
/// onboarding checklist, and the generated operating procedure.

mod client;
mod procedure;

pub use client::default_checklist;
pub use client::Address;
pub use client::ChecklistItem;
pub use client::ChecklistStatus;
pub use client::CompanyType;
pub use client::ContactInfo;
pub use client::DataConsent;
pub use client::LegalRepresentative;
pub use client::Onboarding;
pub use client::OnboardingStatus;
pub use procedure::OperatingProcedure;
pub use procedure::ProcedureStep;
pub use procedure::ProcedureTask;
