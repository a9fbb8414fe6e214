/// AI-assisted procedure generation.
///
/// The text-generation backend is an injected capability: the rest of the
/// application only sees `TextGenerator`. `ClaudeGenerator` talks to the
/// Anthropic messages API; without an API key the service uses the
/// deterministic built-in generator, which is also what tests exercise.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::configuration::AiSettings;
use crate::domain::{CompanyType, OperatingProcedure, ProcedureStep, ProcedureTask};
use crate::error::AiError;

lazy_static! {
    // First {...} block in a model reply; replies often wrap JSON in prose.
    static ref JSON_BLOCK_REGEX: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Capability seam for "generate text from a prompt".
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// The client facts a procedure is generated from.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub name: String,
    pub company_type: CompanyType,
    pub fiscal_code: Option<String>,
    pub vat_number: Option<String>,
    pub services: Vec<String>,
}

/// Text generator backed by the Anthropic messages API.
pub struct ClaudeGenerator {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ClaudeGenerator {
    pub fn new(settings: &AiSettings, api_key: String) -> Result<Self, AiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .map_err(|e| AiError::RequestFailed(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: settings.api_url.clone(),
            api_key,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4000,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        payload["content"][0]["text"]
            .as_str()
            .map(|text| text.to_string())
            .ok_or_else(|| {
                AiError::InvalidResponse("reply carries no content text".to_string())
            })
    }
}

/// Procedure generation service.
pub struct AiService {
    generator: Option<Box<dyn TextGenerator>>,
}

impl AiService {
    /// Builds the service from configuration. Without an API key the service
    /// runs fallback-only, matching development and test environments.
    pub fn from_settings(settings: &AiSettings) -> Self {
        let generator = match &settings.api_key {
            Some(key) if !key.is_empty() => match ClaudeGenerator::new(settings, key.clone()) {
                Ok(generator) => Some(Box::new(generator) as Box<dyn TextGenerator>),
                Err(e) => {
                    tracing::warn!(error = %e, "Generator unavailable, using fallback procedures");
                    None
                }
            },
            _ => None,
        };

        if generator.is_none() {
            tracing::info!("No generation API key configured, using fallback procedures");
        }

        Self { generator }
    }

    /// Test seam: inject any generator implementation.
    pub fn with_generator(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Generates an operating procedure for a client. Falls back to the
    /// deterministic generator when no backend is configured; a backend reply
    /// without parseable JSON degrades to a manual-review wrapper rather than
    /// failing the request.
    pub async fn generate_procedure(
        &self,
        summary: &ClientSummary,
    ) -> Result<OperatingProcedure, AiError> {
        let Some(generator) = &self.generator else {
            return Ok(fallback_procedure(summary));
        };

        let prompt = build_procedure_prompt(summary);
        let response = generator.generate(&prompt).await?;
        Ok(extract_procedure(&response))
    }
}

fn build_procedure_prompt(summary: &ClientSummary) -> String {
    format!(
        r#"You are an assistant for accounting firms in Italy. Generate a detailed operating procedure for a new client with the following profile:

Name: {name}
Type: {company_type}
VAT number: {vat}
Fiscal code: {fiscal}
Requested services: {services}

Produce a complete procedure with a name, a description, and the activities to carry out in chronological order. For each activity include: name, detailed description, timing in days from start, responsible role (admin, manager, operator), required documents, and the detailed steps to complete it.

The procedure must be specific to the client's company type and requested services. Format the reply as JSON with this structure:

{{
  "name": "Procedure name",
  "description": "Detailed description",
  "tasks": [
    {{
      "name": "Activity name",
      "description": "Description",
      "dueOffset": 7,
      "assignedRole": "operator",
      "requiredDocuments": ["Document 1", "Document 2"],
      "steps": [
        {{ "name": "Step 1", "description": "Description", "order": 1 }},
        {{ "name": "Step 2", "description": "Description", "order": 2 }}
      ]
    }}
  ]
}}"#,
        name = summary.name,
        company_type = summary.company_type.as_str(),
        vat = summary.vat_number.as_deref().unwrap_or("Not available"),
        fiscal = summary.fiscal_code.as_deref().unwrap_or("Not available"),
        services = if summary.services.is_empty() {
            "Standard services".to_string()
        } else {
            summary.services.join(", ")
        },
    )
}

/// Extracts the first JSON object from a model reply and parses it as a
/// procedure. Unparseable replies become a manual-review task carrying the
/// raw text instead of an error.
fn extract_procedure(response: &str) -> OperatingProcedure {
    if let Some(json_match) = JSON_BLOCK_REGEX.find(response) {
        match serde_json::from_str::<OperatingProcedure>(json_match.as_str()) {
            Ok(procedure) => return procedure,
            Err(e) => {
                tracing::warn!(error = %e, "Generated reply carried malformed procedure JSON");
            }
        }
    }

    OperatingProcedure {
        name: "Generated procedure".to_string(),
        description: "Generated reply requires manual review (no parseable JSON)".to_string(),
        tasks: vec![ProcedureTask {
            name: "Manual review required".to_string(),
            description: response.to_string(),
            due_offset: 1,
            assigned_role: "manager".to_string(),
            required_documents: Vec::new(),
            steps: Vec::new(),
        }],
    }
}

/// Deterministic procedure used when no generation backend is configured.
pub fn fallback_procedure(summary: &ClientSummary) -> OperatingProcedure {
    let mut tasks = vec![ProcedureTask {
        name: "Collect registry data".to_string(),
        description: "Collect and verify the client's registry data".to_string(),
        due_offset: 1,
        assigned_role: "operator".to_string(),
        required_documents: vec!["ID Document".to_string(), "Fiscal Code Card".to_string()],
        steps: vec![
            ProcedureStep {
                name: "Verify identity document".to_string(),
                description: "Check the identity document is valid".to_string(),
                order: 1,
            },
            ProcedureStep {
                name: "Verify fiscal code".to_string(),
                description: "Check the fiscal code matches the registry".to_string(),
                order: 2,
            },
        ],
    }];

    match summary.company_type {
        CompanyType::Individual => {
            tasks.push(ProcedureTask {
                name: "Review tax regime".to_string(),
                description: "Determine the applicable tax regime for the professional"
                    .to_string(),
                due_offset: 3,
                assigned_role: "manager".to_string(),
                required_documents: vec![
                    "Previous tax return".to_string(),
                    "VAT Registration".to_string(),
                ],
                steps: vec![
                    ProcedureStep {
                        name: "Analyze prior returns".to_string(),
                        description: "Review the previous tax return".to_string(),
                        order: 1,
                    },
                    ProcedureStep {
                        name: "Advise on regime".to_string(),
                        description: "Propose the most convenient tax regime".to_string(),
                        order: 2,
                    },
                ],
            });
        }
        CompanyType::Corporation | CompanyType::Llc => {
            tasks.push(ProcedureTask {
                name: "Review company statute".to_string(),
                description: "Verify the statute and corporate documents".to_string(),
                due_offset: 3,
                assigned_role: "manager".to_string(),
                required_documents: vec![
                    "Company Statute".to_string(),
                    "Chamber of Commerce Registration".to_string(),
                ],
                steps: vec![
                    ProcedureStep {
                        name: "Check compliance".to_string(),
                        description: "Verify the statute complies with current regulations"
                            .to_string(),
                        order: 1,
                    },
                    ProcedureStep {
                        name: "Flag issues".to_string(),
                        description: "Identify critical points or improvement opportunities"
                            .to_string(),
                        order: 2,
                    },
                ],
            });
            tasks.push(ProcedureTask {
                name: "Set up company accounting".to_string(),
                description: "Configure the accounting system for the company".to_string(),
                due_offset: 5,
                assigned_role: "operator".to_string(),
                required_documents: vec![
                    "Chart of accounts".to_string(),
                    "Previous year balance sheet".to_string(),
                ],
                steps: vec![
                    ProcedureStep {
                        name: "Configure software".to_string(),
                        description: "Configure the management software".to_string(),
                        order: 1,
                    },
                    ProcedureStep {
                        name: "Import records".to_string(),
                        description: "Import existing accounting records".to_string(),
                        order: 2,
                    },
                ],
            });
        }
        CompanyType::Partnership => {
            tasks.push(ProcedureTask {
                name: "Review partner agreements".to_string(),
                description: "Analyze partner agreements and ownership shares".to_string(),
                due_offset: 3,
                assigned_role: "manager".to_string(),
                required_documents: vec![
                    "Partnership Deed".to_string(),
                    "Partner List".to_string(),
                ],
                steps: vec![
                    ProcedureStep {
                        name: "Analyze shares".to_string(),
                        description: "Review the distribution of ownership shares".to_string(),
                        order: 1,
                    },
                    ProcedureStep {
                        name: "Verify governance".to_string(),
                        description: "Verify the governance rules".to_string(),
                        order: 2,
                    },
                ],
            });
        }
    }

    tasks.push(ProcedureTask {
        name: "Annual tax planning".to_string(),
        description: "Prepare a tailored annual tax plan".to_string(),
        due_offset: 10,
        assigned_role: "manager".to_string(),
        required_documents: vec![
            "Accounting records".to_string(),
            "Financial projections".to_string(),
        ],
        steps: vec![
            ProcedureStep {
                name: "Assess current position".to_string(),
                description: "Analyze the current tax position".to_string(),
                order: 1,
            },
            ProcedureStep {
                name: "Develop strategy".to_string(),
                description: "Develop an optimal tax strategy".to_string(),
                order: 2,
            },
            ProcedureStep {
                name: "Present plan".to_string(),
                description: "Present the plan to the client".to_string(),
                order: 3,
            },
        ],
    });

    OperatingProcedure {
        name: format!(
            "Onboarding Procedure - {} ({})",
            summary.name,
            summary.company_type.as_str()
        ),
        description: format!(
            "Standard operating procedure for {} clients.",
            summary.company_type.as_str()
        ),
        tasks,
    }
}
